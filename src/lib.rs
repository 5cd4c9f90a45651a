//! flowvars
//!
//! Punto de entrada de aplicación sobre los crates del workspace:
//! - `config`: configuración global (`.env` + entorno) del engine.
//! - `backend`: selección del store de registros (memoria o Postgres).
//! - `errors`: errores de arranque de la aplicación.
//!
//! El modelo de variables vive en `flowvars-core`; aquí sólo se cablea.

pub mod backend;
pub mod config;
pub mod errors;

pub use backend::{build_engine, build_passive_engine, RecordBackend};
pub use config::{app_config, AppConfig, CONFIG};
pub use errors::{AppError, ConfigError};
