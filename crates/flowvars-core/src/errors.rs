//! Errores del subsistema de variables.
//!
//! Un único enum (`VariableError`) cubre lectura/escritura de variables,
//! evaluación de condiciones, avance de ramas y commit de registros. La
//! clasificación (`classify_error`) separa lo recuperable de lo fatal.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::scope::ScopeId;
use crate::value::ValueType;

#[derive(Debug, Error, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum VariableError {
    #[error("variable '{name}' not found in scope chain of {scope}")]
    VariableNotFound { name: String, scope: ScopeId },
    #[error("invalid condition expression '{expression}': {reason}")]
    InvalidConditionExpression { expression: String, reason: String },
    #[error("orchestrator could not advance subscription {subscription_id}: {reason}")]
    AdvanceFailed { subscription_id: u64, reason: String },
    #[error("value of type {value_type} for variable '{name}' has no usable serialization format")]
    SerializationUnsupported { name: String, value_type: ValueType },
    #[error("conditional trigger depth exceeded (max {max_depth})")]
    TriggerDepthExceeded { max_depth: usize },
    #[error("scope {0} has been destroyed")]
    ScopeDestroyed(ScopeId),
    #[error("unknown scope {0}")]
    UnknownScope(ScopeId),
    #[error("unknown instance {0}")]
    UnknownInstance(Uuid),
    #[error("instance {0} has already ended")]
    InstanceEnded(Uuid),
    #[error("persistence: {0}")]
    Persistence(String),
    #[error("internal: {0}")]
    Internal(String),
}

/// Clase de error, usada por llamadores para decidir si reintentar,
/// recuperar localmente o abortar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// El llamador puede tratarlo localmente (p.ej. variable "no asignada").
    Recoverable,
    /// Aborta la unidad de trabajo.
    Fatal,
    /// Error transitorio del backend de registros; reintentable.
    Transient,
    /// Violación de contrato por parte de la lógica de orquestación (bug).
    ContractViolation,
}

pub fn classify_error(err: &VariableError) -> ErrorClass {
    match err {
        VariableError::VariableNotFound { .. } | VariableError::UnknownInstance(_) => ErrorClass::Recoverable,
        VariableError::Persistence(_) => ErrorClass::Transient,
        VariableError::ScopeDestroyed(_) | VariableError::UnknownScope(_) | VariableError::InstanceEnded(_) => {
            ErrorClass::ContractViolation
        }
        VariableError::InvalidConditionExpression { .. }
        | VariableError::AdvanceFailed { .. }
        | VariableError::SerializationUnsupported { .. }
        | VariableError::TriggerDepthExceeded { .. }
        | VariableError::Internal(_) => ErrorClass::Fatal,
    }
}

impl VariableError {
    pub fn class(&self) -> ErrorClass {
        classify_error(self)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, VariableError::VariableNotFound { .. })
    }
}
