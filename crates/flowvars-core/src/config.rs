//! Configuración del engine de variables.
use serde::{Deserialize, Serialize};

use crate::value::SerializationFormat;

/// Profundidad máxima por defecto de disparos condicionales anidados.
pub const DEFAULT_MAX_TRIGGER_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Cuántos disparos pueden encadenarse dentro de una misma unidad de
    /// trabajo antes de abortarla con `TriggerDepthExceeded`.
    pub max_trigger_depth: usize,
    /// Formato aplicado a objetos durables que no declaran uno.
    pub default_serialization_format: Option<SerializationFormat>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { max_trigger_depth: DEFAULT_MAX_TRIGGER_DEPTH,
               default_serialization_format: None }
    }
}

impl EngineConfig {
    pub fn with_max_trigger_depth(mut self, depth: usize) -> Self {
        self.max_trigger_depth = depth;
        self
    }

    pub fn with_default_serialization_format(mut self, format: SerializationFormat) -> Self {
        self.default_serialization_format = Some(format);
        self
    }
}
