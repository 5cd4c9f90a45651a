//! Registros durables de variables y el batch que los agrupa por unidad de
//! trabajo.
//!
//! - `RuntimeVariableRecord`: proyección del valor *actual* de un slot
//!   durable; una fila por (instancia, scope, nombre), se sobrescribe.
//! - `HistoricVariableRecord`: foto puntual de una escritura durable; append
//!   only, nunca se borra (ni siquiera al terminar la instancia).
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::VariableError;
use crate::scope::ScopeId;
use crate::value::{SerializedValue, TypedValue};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeVariableRecord {
    pub instance_id: Uuid,
    pub scope_id: ScopeId,
    pub name: String,
    pub value: SerializedValue,
    pub revision: u64,
    pub updated_at: DateTime<Utc>,
}

impl RuntimeVariableRecord {
    pub fn typed_value(&self) -> Result<TypedValue, VariableError> {
        self.value.deserialize()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricVariableRecord {
    /// Asignado por el store al hacer commit (orden de append).
    pub seq: u64,
    pub instance_id: Uuid,
    pub scope_id: ScopeId,
    pub name: String,
    pub value: SerializedValue,
    pub revision: u64,
    /// `true` si la escritura creó el slot.
    pub created: bool,
    pub recorded_at: DateTime<Utc>,
}

impl HistoricVariableRecord {
    pub fn typed_value(&self) -> Result<TypedValue, VariableError> {
        self.value.deserialize()
    }
}

/// Operación staged sobre el store.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOp {
    UpsertRuntime(RuntimeVariableRecord),
    DeleteRuntime { scope_id: ScopeId, name: String },
    /// Cascada al destruir un scope.
    DeleteRuntimeScope(ScopeId),
    /// Cascada al terminar la instancia. Los históricos se conservan.
    DeleteRuntimeInstance,
    AppendHistoric(HistoricVariableRecord),
}

/// Operaciones de una unidad de trabajo, aplicadas todas o ninguna.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordBatch {
    pub instance_id: Uuid,
    ops: Vec<RecordOp>,
}

impl RecordBatch {
    pub fn new(instance_id: Uuid) -> Self {
        Self { instance_id,
               ops: Vec::new() }
    }

    pub fn push(&mut self, op: RecordOp) {
        self.ops.push(op);
    }

    pub fn ops(&self) -> &[RecordOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<RecordOp> {
        self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn historic_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, RecordOp::AppendHistoric(_)))
            .count()
    }
}
