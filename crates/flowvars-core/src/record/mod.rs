//! Registros durables de variables y trait `VariableRecordStore`.

mod store;
mod types;

pub use store::{InMemoryRecordStore, VariableRecordStore};
pub use types::{HistoricVariableRecord, RecordBatch, RecordOp, RuntimeVariableRecord};
