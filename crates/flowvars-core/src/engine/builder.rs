//! Builder para `VariableEngine`.
//!
//! El nivel de historial se pide al orquestador una única vez, en `build`, y
//! queda fijo en el `PersistenceSelector` del engine.
//!
//! ```ignore
//! let engine = VariableEngine::builder(InMemoryRecordStore::new(), PassiveOrchestrator::default())
//!     .max_trigger_depth(8)
//!     .build();
//! ```
use dashmap::DashMap;
use log::info;

use super::{Orchestrator, VariableEngine};
use crate::config::EngineConfig;
use crate::persistence::PersistenceSelector;
use crate::record::VariableRecordStore;
use crate::value::SerializationFormat;

#[derive(Debug)]
pub struct EngineBuilder<S, O>
    where S: VariableRecordStore,
          O: Orchestrator
{
    store: S,
    orchestrator: O,
    config: EngineConfig,
}

impl<S, O> EngineBuilder<S, O>
    where S: VariableRecordStore,
          O: Orchestrator
{
    pub(crate) fn new(store: S, orchestrator: O) -> Self {
        Self { store,
               orchestrator,
               config: EngineConfig::default() }
    }

    /// Reemplaza la configuración completa.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn max_trigger_depth(mut self, depth: usize) -> Self {
        self.config.max_trigger_depth = depth;
        self
    }

    pub fn default_serialization_format(mut self, format: SerializationFormat) -> Self {
        self.config.default_serialization_format = Some(format);
        self
    }

    pub fn build(self) -> VariableEngine<S, O> {
        let history_level = self.orchestrator.current_history_level();
        info!("engine:build history_level={history_level} max_trigger_depth={}",
              self.config.max_trigger_depth);
        VariableEngine { store: self.store,
                         orchestrator: self.orchestrator,
                         selector: PersistenceSelector::new(history_level),
                         config: self.config,
                         instances: DashMap::new() }
    }
}
