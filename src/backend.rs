//! Selección del store de registros según configuración: Postgres si hay
//! `DATABASE_URL`, memoria en caso contrario.

use flowvars_core::{EngineConfig, HistoricVariableRecord, InMemoryRecordStore, Orchestrator, PassiveOrchestrator,
                    RecordBatch, RuntimeVariableRecord, VariableEngine, VariableError, VariableRecordStore};
use flowvars_persistence::config::{DEFAULT_MAX_CONNECTIONS, DEFAULT_MIN_CONNECTIONS};
use flowvars_persistence::{build_pool, PgVariableStore, PersistenceError, PoolProvider};
use log::info;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::AppError;

pub enum RecordBackend {
    Memory(InMemoryRecordStore),
    Postgres(PgVariableStore<PoolProvider>),
}

impl RecordBackend {
    pub fn in_memory() -> Self {
        RecordBackend::Memory(InMemoryRecordStore::new())
    }

    /// Conecta (y migra) si la configuración trae `database_url`.
    pub fn from_config(config: &AppConfig) -> Result<Self, PersistenceError> {
        match &config.database_url {
            Some(url) => {
                let pool = build_pool(url, DEFAULT_MIN_CONNECTIONS, DEFAULT_MAX_CONNECTIONS)?;
                Ok(RecordBackend::Postgres(PgVariableStore::new(PoolProvider { pool })))
            }
            None => Ok(Self::in_memory()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RecordBackend::Memory(_) => "memory",
            RecordBackend::Postgres(_) => "postgres",
        }
    }
}

impl VariableRecordStore for RecordBackend {
    fn commit(&self, batch: RecordBatch) -> Result<(), VariableError> {
        match self {
            RecordBackend::Memory(s) => s.commit(batch),
            RecordBackend::Postgres(s) => s.commit(batch),
        }
    }

    fn runtime_variables(&self, instance_id: Uuid) -> Result<Vec<RuntimeVariableRecord>, VariableError> {
        match self {
            RecordBackend::Memory(s) => s.runtime_variables(instance_id),
            RecordBackend::Postgres(s) => s.runtime_variables(instance_id),
        }
    }

    fn historic_variables(&self, instance_id: Uuid) -> Result<Vec<HistoricVariableRecord>, VariableError> {
        match self {
            RecordBackend::Memory(s) => s.historic_variables(instance_id),
            RecordBackend::Postgres(s) => s.historic_variables(instance_id),
        }
    }
}

/// Engine con la configuración de aplicación aplicada sobre un orquestador
/// arbitrario.
pub fn build_engine<O>(engine_config: &EngineConfig,
                       backend: RecordBackend,
                       orchestrator: O)
                       -> VariableEngine<RecordBackend, O>
    where O: Orchestrator
{
    info!("backend selected: {}", backend.name());
    VariableEngine::builder(backend, orchestrator).config(engine_config.clone())
                                                  .build()
}

/// Engine sin lógica de orquestación, con el nivel de historial configurado.
pub fn build_passive_engine(config: &AppConfig) -> Result<VariableEngine<RecordBackend, PassiveOrchestrator>, AppError> {
    let backend = RecordBackend::from_config(config)?;
    Ok(build_engine(&config.engine, backend, PassiveOrchestrator::new(config.history_level)))
}
