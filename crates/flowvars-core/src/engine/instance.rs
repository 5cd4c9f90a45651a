use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::conditional::SubscriptionRegistry;
use crate::scope::ScopeTree;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceKind {
    Process,
    Case,
}

impl fmt::Display for InstanceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceKind::Process => f.write_str("process"),
            InstanceKind::Case => f.write_str("case"),
        }
    }
}

/// Estado vivo de una instancia: árbol de scopes y suscripciones.
///
/// Cada comando trabaja sobre una copia; sólo si el commit de registros
/// tiene éxito la copia reemplaza al estado publicado.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceState {
    pub id: Uuid,
    pub kind: InstanceKind,
    pub definition_key: String,
    pub tree: ScopeTree,
    pub subscriptions: SubscriptionRegistry,
    pub ended: bool,
    pub started_at: DateTime<Utc>,
}

impl InstanceState {
    pub fn new(id: Uuid, kind: InstanceKind, definition_key: impl Into<String>) -> Self {
        Self { id,
               kind,
               definition_key: definition_key.into(),
               tree: ScopeTree::new(),
               subscriptions: SubscriptionRegistry::new(),
               ended: false,
               started_at: Utc::now() }
    }
}

/// Vista de una instancia devuelta al arrancarla.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInstance {
    pub id: Uuid,
    pub kind: InstanceKind,
    pub definition_key: String,
    /// `true` si la instancia terminó dentro del mismo comando de arranque.
    pub ended: bool,
}

impl ProcessInstance {
    pub fn is_ended(&self) -> bool {
        self.ended
    }
}

impl From<&InstanceState> for ProcessInstance {
    fn from(state: &InstanceState) -> Self {
        Self { id: state.id,
               kind: state.kind,
               definition_key: state.definition_key.clone(),
               ended: state.ended }
    }
}
