//! Registro de suscripciones condicionales de una instancia.
//!
//! Mantiene las suscripciones activas ordenadas por id (orden de creación)
//! y decide qué suscripciones son candidatas ante una mutación. La
//! evaluación y el avance de ramas viven en el contexto de ejecución, que es
//! quien puede llamar a la lógica de orquestación.
use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use super::{ConditionalEventSubscription, ConditionalSubscriptionSpec, SubscriptionId, SubscriptionState, VariableEvent,
            VariableMutation};
use crate::errors::VariableError;
use crate::expression::ConditionExpression;
use crate::scope::{ScopeId, ScopeTree};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscriptionRegistry {
    active: BTreeMap<SubscriptionId, ConditionalEventSubscription>,
    next_id: u64,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserva el siguiente id sin registrar nada (suscripciones que se
    /// disparan al crearse).
    pub(crate) fn allocate_id(&mut self) -> SubscriptionId {
        self.next_id += 1;
        SubscriptionId(self.next_id)
    }

    pub(crate) fn register(&mut self,
                           id: SubscriptionId,
                           owner: ScopeId,
                           condition: ConditionExpression,
                           spec: ConditionalSubscriptionSpec) {
        debug!("conditional:subscribe id={id} owner={owner} activity={} condition={}",
               spec.activity_id,
               condition.source());
        self.active.insert(id,
                           ConditionalEventSubscription { id,
                                                          owner,
                                                          activity_id: spec.activity_id,
                                                          condition,
                                                          variable_name: spec.variable_name,
                                                          variable_events: spec.variable_events,
                                                          state: SubscriptionState::Active });
    }

    /// Suscripción activa con ese id.
    pub fn get(&self, id: SubscriptionId) -> Option<&ConditionalEventSubscription> {
        self.active.get(&id)
    }

    pub fn is_active(&self, id: SubscriptionId) -> bool {
        self.active.get(&id).is_some_and(ConditionalEventSubscription::is_active)
    }

    /// Suscripciones activas en orden de creación.
    pub fn active(&self) -> impl Iterator<Item = &ConditionalEventSubscription> {
        self.active.values()
    }

    /// Número de suscripciones activas.
    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Candidatas para una mutación, en orden de creación.
    ///
    /// Una suscripción es visible si su scope es `mutation.scope` o un
    /// ancestro, o si desde su scope el nombre resuelve al mismo slot que
    /// se escribió (ramas hermanas que comparten la variable de un ancestro).
    /// Para borrados basta con que el dueño del slot sea ancestro del scope
    /// de la suscripción.
    pub(crate) fn candidates(&self,
                             tree: &ScopeTree,
                             mutation: &VariableMutation)
                             -> Result<Vec<SubscriptionId>, VariableError> {
        let chain = tree.ancestors_inclusive(mutation.scope)?;
        let mut out = Vec::new();
        for sub in self.active.values() {
            if !sub.is_active() || !sub.listens_to(&mutation.name, mutation.event) {
                continue;
            }
            let visible = chain.contains(&sub.owner)
                          || match mutation.event {
                              VariableEvent::Delete => tree.is_ancestor_or_self(mutation.owner, sub.owner),
                              _ => tree.resolve_owner(sub.owner, &mutation.name)? == Some(mutation.owner),
                          };
            if visible {
                out.push(sub.id);
            }
        }
        Ok(out)
    }

    fn retire(&mut self, id: SubscriptionId, state: SubscriptionState) -> Option<ConditionalEventSubscription> {
        let mut sub = self.active.remove(&id)?;
        sub.state = state;
        Some(sub)
    }

    /// Active → Triggered. La suscripción sale del registro y se devuelve en
    /// su estado final.
    pub(crate) fn trigger(&mut self, id: SubscriptionId) -> Option<ConditionalEventSubscription> {
        let sub = self.retire(id, SubscriptionState::Triggered)?;
        debug!("conditional:triggered id={id} owner={} activity={}", sub.owner, sub.activity_id);
        Some(sub)
    }

    /// Active → Removed para todas las suscripciones de los scopes dados.
    pub(crate) fn remove_for_scopes(&mut self, scopes: &[ScopeId]) -> Vec<ConditionalEventSubscription> {
        let ids: Vec<SubscriptionId> = self.active
                                           .values()
                                           .filter(|s| scopes.contains(&s.owner))
                                           .map(|s| s.id)
                                           .collect();
        let removed: Vec<_> = ids.into_iter()
                                 .filter_map(|id| self.retire(id, SubscriptionState::Removed))
                                 .collect();
        if !removed.is_empty() {
            debug!("conditional:removed count={} scopes={scopes:?}", removed.len());
        }
        removed
    }

    /// Active → Removed para todo el registro.
    pub(crate) fn clear(&mut self) -> Vec<ConditionalEventSubscription> {
        std::mem::take(&mut self.active).into_values()
                                        .map(|mut sub| {
                                            sub.state = SubscriptionState::Removed;
                                            sub
                                        })
                                        .collect()
    }
}
