//! Engine de variables: instancias, unidades de trabajo y la fachada
//! `ExecutionContext`.

pub mod builder;
pub mod context;
pub mod core;
pub mod instance;
pub mod orchestrator;

pub use builder::EngineBuilder;
pub use context::ExecutionContext;
pub use self::core::VariableEngine;
pub use instance::{InstanceKind, InstanceState, ProcessInstance};
pub use orchestrator::{Orchestrator, PassiveOrchestrator};
