use serde::{Deserialize, Serialize};

use super::ScopeId;
use crate::value::TypedValue;

/// Binding con nombre dentro de un scope.
///
/// `revision` arranca en 1 al crear el slot y aumenta en cada escritura,
/// sin importar si el valor es transitorio o durable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableSlot {
    pub name: String,
    pub value: TypedValue,
    pub revision: u64,
    pub owner: ScopeId,
}

impl VariableSlot {
    pub(crate) fn new(name: String, value: TypedValue, owner: ScopeId) -> Self {
        Self { name,
               value,
               revision: 1,
               owner }
    }

    /// Reemplaza el valor y devuelve el anterior.
    pub(crate) fn replace(&mut self, value: TypedValue) -> TypedValue {
        self.revision += 1;
        std::mem::replace(&mut self.value, value)
    }
}

/// Resultado de una escritura en el árbol.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotWrite {
    /// Scope que posee el slot escrito (puede ser un ancestro).
    pub owner: ScopeId,
    pub revision: u64,
    pub is_new_slot: bool,
    pub previous: Option<TypedValue>,
}
