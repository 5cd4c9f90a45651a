use log::debug;

use super::ExecutionContext;
use crate::conditional::TriggeredSubscription;
use crate::errors::VariableError;
use crate::persistence::HistoryLevel;

/// Lógica de orquestación que rodea al subsistema de variables.
///
/// El engine no conoce la forma del proceso: sólo sabe cuándo una rama en
/// espera debe avanzar. Todo lo que el colaborador haga a través del
/// contexto (escrituras, forks, nuevas suscripciones, completar la
/// instancia) forma parte de la misma unidad de trabajo.
pub trait Orchestrator: Send + Sync {
    /// Nivel de historial; se lee una sola vez al construir el engine.
    fn current_history_level(&self) -> HistoryLevel;

    /// Pasos iniciales de la instancia, dentro del comando de arranque.
    fn on_instance_started(&self, ctx: &mut ExecutionContext<'_>) -> Result<(), VariableError> {
        let _ = ctx;
        Ok(())
    }

    /// Avanza la rama que esperaba en `trigger`. Un `Err` aborta la unidad
    /// de trabajo completa.
    fn resolve_waiting_branch(&self,
                              ctx: &mut ExecutionContext<'_>,
                              trigger: &TriggeredSubscription)
                              -> Result<(), VariableError>;
}

/// Orquestador sin lógica propia: las ramas disparadas simplemente avanzan.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassiveOrchestrator {
    pub history_level: HistoryLevel,
}

impl PassiveOrchestrator {
    pub fn new(history_level: HistoryLevel) -> Self {
        Self { history_level }
    }
}

impl Orchestrator for PassiveOrchestrator {
    fn current_history_level(&self) -> HistoryLevel {
        self.history_level
    }

    fn resolve_waiting_branch(&self,
                              ctx: &mut ExecutionContext<'_>,
                              trigger: &TriggeredSubscription)
                              -> Result<(), VariableError> {
        debug!("orchestrator:passive instance_id={} kind={} activity={} scope={}",
               ctx.instance_id(),
               ctx.instance_kind(),
               trigger.activity_id,
               trigger.scope);
        Ok(())
    }
}
