//! Decide, por escritura, qué registros durables se producen.
//!
//! Regla:
//! - valor transitorio → ningún registro (runtime ni histórico), sea cual sea
//!   el nivel de historial.
//! - valor durable → registro runtime siempre; histórico sólo si el nivel
//!   configurado registra actualizaciones de variables (`Audit` o mayor).
//!
//! La decisión mira el valor de *esta* escritura, no el historial del slot:
//! un slot puede recibir primero un valor transitorio y luego uno durable.
use super::HistoryLevel;
use crate::scope::VariableSlot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PersistenceDecision {
    pub write_runtime: bool,
    pub write_historic: bool,
}

impl PersistenceDecision {
    pub const NONE: PersistenceDecision = PersistenceDecision { write_runtime: false,
                                                                write_historic: false };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistenceSelector {
    history_level: HistoryLevel,
}

impl PersistenceSelector {
    pub fn new(history_level: HistoryLevel) -> Self {
        Self { history_level }
    }

    pub fn history_level(&self) -> HistoryLevel {
        self.history_level
    }

    /// `is_new_slot` no altera la decisión; se conserva para que los
    /// llamadores puedan registrar la diferencia create/update.
    pub fn on_variable_written(&self, slot: &VariableSlot, _is_new_slot: bool) -> PersistenceDecision {
        if slot.value.is_transient() {
            return PersistenceDecision::NONE;
        }
        PersistenceDecision { write_runtime: true,
                              write_historic: self.history_level.records_variable_updates() }
    }
}
