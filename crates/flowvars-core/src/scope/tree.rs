//! Árbol de scopes de una instancia (arena + índice).
//!
//! Cada nodo vive en `nodes[id]`. Al destruir un scope su entrada queda como
//! `None` (tombstone) y el id no se reutiliza, de modo que una escritura
//! sobre un scope destruido se detecta como `ScopeDestroyed` y no como un
//! acceso a otro scope.
//!
//! Resolución:
//! - lectura: scope local, luego la cadena de padres hasta la raíz.
//! - escritura: slot local si existe; si no, el ancestro más cercano que
//!   ya define el nombre; sólo si nadie lo define se crea un slot local.
use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use super::{ScopeId, SlotWrite, VariableSlot};
use crate::errors::VariableError;
use crate::value::TypedValue;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeNode {
    pub id: ScopeId,
    pub parent: Option<ScopeId>,
    pub children: BTreeSet<ScopeId>,
    pub variables: HashMap<String, VariableSlot>,
}

/// Resultado de destruir un subárbol.
#[derive(Debug, Clone, Default)]
pub struct DestroyedScopes {
    /// Scopes destruidos en post-orden (hijos antes que padres).
    pub scopes: Vec<ScopeId>,
    /// Slots que vivían en esos scopes.
    pub slots: Vec<VariableSlot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeTree {
    nodes: Vec<Option<ScopeNode>>,
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeTree {
    /// Crea el árbol con su scope raíz (`ScopeId(0)`).
    pub fn new() -> Self {
        let root = ScopeNode { id: ScopeId::ROOT,
                               parent: None,
                               children: BTreeSet::new(),
                               variables: HashMap::new() };
        Self { nodes: vec![Some(root)] }
    }

    /// Scope raíz de la instancia.
    pub fn root(&self) -> ScopeId {
        ScopeId::ROOT
    }

    /// `true` si el scope existe y no fue destruido.
    pub fn contains(&self, id: ScopeId) -> bool {
        matches!(self.nodes.get(id.index()), Some(Some(_)))
    }

    /// Nodo vivo; distingue scopes destruidos de ids desconocidos.
    pub fn node(&self, id: ScopeId) -> Result<&ScopeNode, VariableError> {
        match self.nodes.get(id.index()) {
            Some(Some(node)) => Ok(node),
            Some(None) => Err(VariableError::ScopeDestroyed(id)),
            None => Err(VariableError::UnknownScope(id)),
        }
    }

    fn node_mut(&mut self, id: ScopeId) -> Result<&mut ScopeNode, VariableError> {
        match self.nodes.get_mut(id.index()) {
            Some(Some(node)) => Ok(node),
            Some(None) => Err(VariableError::ScopeDestroyed(id)),
            None => Err(VariableError::UnknownScope(id)),
        }
    }

    /// Padre del scope, `None` para la raíz.
    pub fn parent(&self, id: ScopeId) -> Result<Option<ScopeId>, VariableError> {
        Ok(self.node(id)?.parent)
    }

    /// Hijos vivos en orden de creación.
    pub fn children(&self, id: ScopeId) -> Result<Vec<ScopeId>, VariableError> {
        Ok(self.node(id)?.children.iter().copied().collect())
    }

    /// Cadena `id → … → raíz`, incluyendo `id`.
    pub fn ancestors_inclusive(&self, id: ScopeId) -> Result<Vec<ScopeId>, VariableError> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(scope) = current {
            chain.push(scope);
            current = self.node(scope)?.parent;
        }
        Ok(chain)
    }

    pub fn is_ancestor_or_self(&self, ancestor: ScopeId, scope: ScopeId) -> bool {
        self.ancestors_inclusive(scope)
            .map(|chain| chain.contains(&ancestor))
            .unwrap_or(false)
    }

    /// Crea un scope hijo (rama concurrente) bajo `parent`.
    pub fn create_child(&mut self, parent: ScopeId) -> Result<ScopeId, VariableError> {
        let id = ScopeId(self.nodes.len() as u32);
        self.node_mut(parent)?.children.insert(id);
        self.nodes.push(Some(ScopeNode { id,
                                         parent: Some(parent),
                                         children: BTreeSet::new(),
                                         variables: HashMap::new() }));
        Ok(id)
    }

    /// Destruye `id` y todo su subárbol (hijos primero).
    pub fn destroy(&mut self, id: ScopeId) -> Result<DestroyedScopes, VariableError> {
        let parent = self.node(id)?.parent;
        let mut order = Vec::new();
        self.collect_post_order(id, &mut order)?;

        let mut destroyed = DestroyedScopes::default();
        for scope in order {
            if let Some(node) = self.nodes.get_mut(scope.index()).and_then(Option::take) {
                let mut slots: Vec<VariableSlot> = node.variables.into_values().collect();
                slots.sort_by(|a, b| a.name.cmp(&b.name));
                destroyed.slots.extend(slots);
                destroyed.scopes.push(scope);
            }
        }
        if let Some(p) = parent {
            if let Ok(parent_node) = self.node_mut(p) {
                parent_node.children.remove(&id);
            }
        }
        Ok(destroyed)
    }

    fn collect_post_order(&self, id: ScopeId, out: &mut Vec<ScopeId>) -> Result<(), VariableError> {
        for child in self.node(id)?.children.iter() {
            self.collect_post_order(*child, out)?;
        }
        out.push(id);
        Ok(())
    }

    /// Scope dueño del binding que `get_variable(scope, name)` devolvería.
    pub fn resolve_owner(&self, scope: ScopeId, name: &str) -> Result<Option<ScopeId>, VariableError> {
        for s in self.ancestors_inclusive(scope)? {
            if self.node(s)?.variables.contains_key(name) {
                return Ok(Some(s));
            }
        }
        Ok(None)
    }

    /// Slot que resuelve `name` desde `scope`, subiendo por los ancestros.
    pub fn slot(&self, scope: ScopeId, name: &str) -> Result<&VariableSlot, VariableError> {
        match self.resolve_owner(scope, name)? {
            Some(owner) => self.node(owner)?
                               .variables
                               .get(name)
                               .ok_or_else(|| VariableError::Internal(format!("slot '{name}' vanished from {owner}"))),
            None => Err(VariableError::VariableNotFound { name: name.to_string(),
                                                          scope }),
        }
    }

    pub fn get_variable(&self, scope: ScopeId, name: &str) -> Result<&TypedValue, VariableError> {
        self.slot(scope, name).map(|s| &s.value)
    }

    /// Valor definido en el propio scope, sin mirar ancestros.
    pub fn get_variable_local(&self, scope: ScopeId, name: &str) -> Result<&TypedValue, VariableError> {
        self.node(scope)?
            .variables
            .get(name)
            .map(|s| &s.value)
            .ok_or_else(|| VariableError::VariableNotFound { name: name.to_string(),
                                                             scope })
    }

    /// Escribe en el binding existente más cercano o crea uno local.
    pub fn set_variable(&mut self, scope: ScopeId, name: &str, value: TypedValue) -> Result<SlotWrite, VariableError> {
        let target = self.resolve_owner(scope, name)?.unwrap_or(scope);
        self.write_slot(target, name, value)
    }

    /// Escribe siempre en el scope indicado, aunque un ancestro ya defina el
    /// nombre (el binding local lo oculta).
    pub fn set_variable_local(&mut self,
                              scope: ScopeId,
                              name: &str,
                              value: TypedValue)
                              -> Result<SlotWrite, VariableError> {
        self.write_slot(scope, name, value)
    }

    fn write_slot(&mut self, owner: ScopeId, name: &str, value: TypedValue) -> Result<SlotWrite, VariableError> {
        let node = self.node_mut(owner)?;
        match node.variables.get_mut(name) {
            Some(slot) => {
                let previous = slot.replace(value);
                Ok(SlotWrite { owner,
                               revision: slot.revision,
                               is_new_slot: false,
                               previous: Some(previous) })
            }
            None => {
                let slot = VariableSlot::new(name.to_string(), value, owner);
                let revision = slot.revision;
                node.variables.insert(name.to_string(), slot);
                Ok(SlotWrite { owner,
                               revision,
                               is_new_slot: true,
                               previous: None })
            }
        }
    }

    /// Elimina el binding que resolvería `get_variable(scope, name)`.
    pub fn remove_variable(&mut self, scope: ScopeId, name: &str) -> Result<VariableSlot, VariableError> {
        match self.resolve_owner(scope, name)? {
            Some(owner) => self.remove_variable_local(owner, name),
            None => Err(VariableError::VariableNotFound { name: name.to_string(),
                                                          scope }),
        }
    }

    pub fn remove_variable_local(&mut self, scope: ScopeId, name: &str) -> Result<VariableSlot, VariableError> {
        self.node_mut(scope)?
            .variables
            .remove(name)
            .ok_or_else(|| VariableError::VariableNotFound { name: name.to_string(),
                                                             scope })
    }

    /// Snapshot resuelto visible desde `scope` (el binding más cercano gana).
    pub fn variables(&self, scope: ScopeId) -> Result<BTreeMap<String, TypedValue>, VariableError> {
        let mut out = BTreeMap::new();
        for s in self.ancestors_inclusive(scope)? {
            for (name, slot) in self.node(s)?.variables.iter() {
                out.entry(name.clone()).or_insert_with(|| slot.value.clone());
            }
        }
        Ok(out)
    }

    pub fn variables_local(&self, scope: ScopeId) -> Result<BTreeMap<String, TypedValue>, VariableError> {
        Ok(self.node(scope)?
               .variables
               .iter()
               .map(|(k, s)| (k.clone(), s.value.clone()))
               .collect())
    }
}
