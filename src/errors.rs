//! Errores de arranque: configuración inválida o backend inaccesible.

use flowvars_core::VariableError;
use flowvars_persistence::PersistenceError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid FLOWVARS_HISTORY_LEVEL: {0}")]
    InvalidHistoryLevel(String),
    #[error("invalid FLOWVARS_MAX_TRIGGER_DEPTH '{0}': expected a positive integer")]
    InvalidTriggerDepth(String),
    #[error("unsupported FLOWVARS_DEFAULT_SERIALIZATION_FORMAT '{0}'")]
    UnsupportedSerializationFormat(String),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("persistence: {0}")]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Variable(#[from] VariableError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_messages() {
        assert_eq!(ConfigError::InvalidTriggerDepth("0".into()).to_string(),
                   "invalid FLOWVARS_MAX_TRIGGER_DEPTH '0': expected a positive integer");
        let app: AppError = ConfigError::InvalidHistoryLevel("verbose".into()).into();
        assert_eq!(app.to_string(), "configuration: invalid FLOWVARS_HISTORY_LEVEL: verbose");
    }
}
