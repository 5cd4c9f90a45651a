use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::expression::ConditionExpression;
use crate::scope::ScopeId;

/// Identificador de suscripción. Se asigna en orden creciente por instancia,
/// de modo que ordenar por id es ordenar por creación.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// Active → Triggered, o Active → Removed. No hay otras transiciones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionState {
    Active,
    Triggered,
    Removed,
}

/// Tipo de mutación de variable que puede despertar una suscripción.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableEvent {
    Create,
    Update,
    Delete,
}

impl VariableEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariableEvent::Create => "create",
            VariableEvent::Update => "update",
            VariableEvent::Delete => "delete",
        }
    }
}

impl fmt::Display for VariableEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VariableEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "create" => Ok(VariableEvent::Create),
            "update" => Ok(VariableEvent::Update),
            "delete" => Ok(VariableEvent::Delete),
            other => Err(format!("unknown variable event '{other}'")),
        }
    }
}

/// Mutación que provocó la evaluación de condiciones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableMutation {
    /// Scope desde el que se escribió.
    pub scope: ScopeId,
    /// Scope dueño del slot escrito.
    pub owner: ScopeId,
    pub name: String,
    pub event: VariableEvent,
}

/// Lo que la lógica de orquestación declara al alcanzar un evento
/// condicional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionalSubscriptionSpec {
    pub activity_id: String,
    pub condition: String,
    /// Si está presente, sólo mutaciones de esta variable despiertan la
    /// suscripción.
    pub variable_name: Option<String>,
    /// Vacío = cualquier tipo de mutación.
    pub variable_events: BTreeSet<VariableEvent>,
}

impl ConditionalSubscriptionSpec {
    pub fn new(activity_id: impl Into<String>, condition: impl Into<String>) -> Self {
        Self { activity_id: activity_id.into(),
               condition: condition.into(),
               variable_name: None,
               variable_events: BTreeSet::new() }
    }

    pub fn variable_name(mut self, name: impl Into<String>) -> Self {
        self.variable_name = Some(name.into());
        self
    }

    pub fn variable_events(mut self, events: impl IntoIterator<Item = VariableEvent>) -> Self {
        self.variable_events = events.into_iter().collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalEventSubscription {
    pub id: SubscriptionId,
    /// Scope de la rama en espera.
    pub owner: ScopeId,
    pub activity_id: String,
    pub condition: ConditionExpression,
    pub variable_name: Option<String>,
    pub variable_events: BTreeSet<VariableEvent>,
    pub state: SubscriptionState,
}

impl ConditionalEventSubscription {
    pub fn is_active(&self) -> bool {
        self.state == SubscriptionState::Active
    }

    /// Filtro previo a la evaluación: nombre, tipo de evento y variables
    /// referenciadas por la condición.
    pub fn listens_to(&self, name: &str, event: VariableEvent) -> bool {
        if !self.variable_events.is_empty() && !self.variable_events.contains(&event) {
            return false;
        }
        match &self.variable_name {
            Some(filter) => filter == name,
            None => {
                let referenced = self.condition.referenced_variables();
                referenced.is_empty() || referenced.contains(name)
            }
        }
    }
}

/// Datos entregados a la lógica de orquestación cuando una suscripción se
/// dispara.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggeredSubscription {
    pub subscription_id: SubscriptionId,
    pub scope: ScopeId,
    pub activity_id: String,
    pub condition: String,
    /// `None` cuando la condición ya era verdadera al suscribirse.
    pub cause: Option<VariableMutation>,
}

impl TriggeredSubscription {
    pub(crate) fn new(sub: ConditionalEventSubscription, cause: Option<VariableMutation>) -> Self {
        Self { subscription_id: sub.id,
               scope: sub.owner,
               activity_id: sub.activity_id,
               condition: sub.condition.source().to_string(),
               cause }
    }
}

/// Resultado de `subscribe_conditional`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    /// La condición era falsa: la rama queda esperando.
    Waiting(SubscriptionId),
    /// La condición ya era verdadera: la rama avanzó sin esperar.
    Triggered(SubscriptionId),
}

impl SubscribeOutcome {
    pub fn id(&self) -> SubscriptionId {
        match self {
            SubscribeOutcome::Waiting(id) | SubscribeOutcome::Triggered(id) => *id,
        }
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self, SubscribeOutcome::Waiting(_))
    }
}
