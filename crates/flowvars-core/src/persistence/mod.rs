//! Selector de persistencia y niveles de historial.

mod history;
mod selector;

pub use history::HistoryLevel;
pub use selector::{PersistenceDecision, PersistenceSelector};
