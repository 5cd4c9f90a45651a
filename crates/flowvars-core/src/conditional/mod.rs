//! Suscripciones de eventos condicionales.
//!
//! Una rama que alcanza un evento condicional queda esperando hasta que su
//! condición sea verdadera. Cada mutación de variable reevalúa las
//! suscripciones visibles desde el scope mutado.

mod registry;
mod subscription;

pub use registry::SubscriptionRegistry;
pub use subscription::{ConditionalEventSubscription, ConditionalSubscriptionSpec, SubscribeOutcome, SubscriptionId,
                       SubscriptionState, TriggeredSubscription, VariableEvent, VariableMutation};
