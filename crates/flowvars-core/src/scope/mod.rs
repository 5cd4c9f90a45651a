//! Árbol de ejecución por instancia: scopes, slots y resolución de nombres.

mod slot;
mod tree;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use slot::{SlotWrite, VariableSlot};
pub use tree::{DestroyedScopes, ScopeNode, ScopeTree};

/// Identificador estable de un scope dentro de su instancia (índice de arena).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScopeId(pub u32);

impl ScopeId {
    pub const ROOT: ScopeId = ScopeId(0);

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope#{}", self.0)
    }
}
