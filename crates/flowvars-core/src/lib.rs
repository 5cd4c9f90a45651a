//! flowvars-core: variables de ejecución con scopes, valores transitorios y
//! eventos condicionales.
pub mod conditional;
pub mod config;
pub mod engine;
pub mod errors;
pub mod expression;
pub mod persistence;
pub mod record;
pub mod scope;
pub mod value;

pub use conditional::{ConditionalEventSubscription, ConditionalSubscriptionSpec, SubscribeOutcome, SubscriptionId,
                      SubscriptionState, TriggeredSubscription, VariableEvent, VariableMutation};
pub use config::EngineConfig;
pub use engine::{ExecutionContext, InstanceKind, Orchestrator, PassiveOrchestrator, ProcessInstance, VariableEngine};
pub use errors::{classify_error, ErrorClass, VariableError};
pub use expression::{parse_condition, ConditionExpression, ExpressionError};
pub use persistence::{HistoryLevel, PersistenceDecision, PersistenceSelector};
pub use record::{HistoricVariableRecord, InMemoryRecordStore, RecordBatch, RecordOp, RuntimeVariableRecord,
                 VariableRecordStore};
pub use scope::{ScopeId, ScopeTree, VariableSlot};
pub use value::{SerializationFormat, SerializedValue, TypedValue, ValueType, VariableMap};
