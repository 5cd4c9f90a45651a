//! Configuración central de la aplicación.
//! Carga variables de entorno (.env) y expone una instancia inmutable
//! (`CONFIG`) evaluada una sola vez.
//!
//! | variable | default |
//! |---|---|
//! | `FLOWVARS_HISTORY_LEVEL` | `audit` |
//! | `FLOWVARS_MAX_TRIGGER_DEPTH` | 32 |
//! | `FLOWVARS_DEFAULT_SERIALIZATION_FORMAT` | sin formato |
//! | `DATABASE_URL` | sin base (store en memoria) |
use std::env;

use flowvars_core::{EngineConfig, HistoryLevel, SerializationFormat};
use once_cell::sync::Lazy;

use crate::errors::ConfigError;

/// Configuración global de la aplicación.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Nivel de historial que reporta el orquestador pasivo.
    pub history_level: HistoryLevel,
    pub engine: EngineConfig,
    /// `Some` selecciona el backend Postgres.
    pub database_url: Option<String>,
}

impl AppConfig {
    /// Carga `.env` (si existe) y lee el entorno del proceso.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Construye la configuración desde una función de búsqueda arbitraria.
    /// Valores vacíos equivalen a ausentes.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
        where F: Fn(&str) -> Option<String>
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let history_level = match get("FLOWVARS_HISTORY_LEVEL") {
            Some(raw) => raw.parse::<HistoryLevel>().map_err(ConfigError::InvalidHistoryLevel)?,
            None => HistoryLevel::default(),
        };

        let mut engine = EngineConfig::default();
        if let Some(raw) = get("FLOWVARS_MAX_TRIGGER_DEPTH") {
            engine.max_trigger_depth = match raw.trim().parse::<usize>() {
                Ok(depth) if depth > 0 => depth,
                _ => return Err(ConfigError::InvalidTriggerDepth(raw)),
            };
        }
        if let Some(raw) = get("FLOWVARS_DEFAULT_SERIALIZATION_FORMAT") {
            let format = SerializationFormat::from(raw.trim());
            if let SerializationFormat::Other(_) = format {
                return Err(ConfigError::UnsupportedSerializationFormat(raw));
            }
            engine.default_serialization_format = Some(format);
        }

        Ok(Self { history_level,
                  engine,
                  database_url: get("DATABASE_URL") })
    }
}

/// Instancia global perezosa de configuración.
pub static CONFIG: Lazy<Result<AppConfig, ConfigError>> = Lazy::new(AppConfig::from_env);

/// Acceso a la configuración global; el error de carga se repite en cada
/// llamada.
pub fn app_config() -> Result<&'static AppConfig, ConfigError> {
    match &*CONFIG {
        Ok(cfg) => Ok(cfg),
        Err(e) => Err(e.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let cfg = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.history_level, HistoryLevel::Audit);
        assert_eq!(cfg.engine, EngineConfig::default());
        assert_eq!(cfg.database_url, None);
    }

    #[test]
    fn reads_every_variable() {
        let cfg = AppConfig::from_lookup(lookup(&[("FLOWVARS_HISTORY_LEVEL", "Full"),
                                                  ("FLOWVARS_MAX_TRIGGER_DEPTH", "8"),
                                                  ("FLOWVARS_DEFAULT_SERIALIZATION_FORMAT", "application/json"),
                                                  ("DATABASE_URL", "postgres://localhost/flowvars")])).unwrap();
        assert_eq!(cfg.history_level, HistoryLevel::Full);
        assert_eq!(cfg.engine.max_trigger_depth, 8);
        assert_eq!(cfg.engine.default_serialization_format, Some(SerializationFormat::Json));
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://localhost/flowvars"));
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(matches!(AppConfig::from_lookup(lookup(&[("FLOWVARS_HISTORY_LEVEL", "verbose")])),
                         Err(ConfigError::InvalidHistoryLevel(_))));
        assert_eq!(AppConfig::from_lookup(lookup(&[("FLOWVARS_MAX_TRIGGER_DEPTH", "0")])),
                   Err(ConfigError::InvalidTriggerDepth("0".into())));
        assert_eq!(AppConfig::from_lookup(lookup(&[("FLOWVARS_DEFAULT_SERIALIZATION_FORMAT", "text/xml")])),
                   Err(ConfigError::UnsupportedSerializationFormat("text/xml".into())));
    }

    #[test]
    fn blank_database_url_means_in_memory() {
        let cfg = AppConfig::from_lookup(lookup(&[("DATABASE_URL", "  ")])).unwrap();
        assert_eq!(cfg.database_url, None);
    }
}
