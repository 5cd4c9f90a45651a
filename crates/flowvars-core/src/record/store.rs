use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use log::debug;
use uuid::Uuid;

use super::{HistoricVariableRecord, RecordBatch, RecordOp, RuntimeVariableRecord};
use crate::errors::VariableError;
use crate::scope::ScopeId;

/// Almacenamiento de registros runtime/históricos.
///
/// Contrato:
/// - `commit` aplica el batch completo o nada.
/// - `runtime_variables` ordena por (scope, nombre).
/// - `historic_variables` ordena por `seq` ascendente (orden de append).
pub trait VariableRecordStore: Send + Sync {
    fn commit(&self, batch: RecordBatch) -> Result<(), VariableError>;
    fn runtime_variables(&self, instance_id: Uuid) -> Result<Vec<RuntimeVariableRecord>, VariableError>;
    fn historic_variables(&self, instance_id: Uuid) -> Result<Vec<HistoricVariableRecord>, VariableError>;
}

#[derive(Debug, Clone, Default)]
struct InstanceRecords {
    runtime: BTreeMap<(ScopeId, String), RuntimeVariableRecord>,
    historic: Vec<HistoricVariableRecord>,
}

impl InstanceRecords {
    fn apply(&mut self, op: RecordOp, next_seq: &AtomicU64) {
        match op {
            RecordOp::UpsertRuntime(rec) => {
                self.runtime.insert((rec.scope_id, rec.name.clone()), rec);
            }
            RecordOp::DeleteRuntime { scope_id, name } => {
                self.runtime.remove(&(scope_id, name));
            }
            RecordOp::DeleteRuntimeScope(scope_id) => self.runtime.retain(|(s, _), _| *s != scope_id),
            RecordOp::DeleteRuntimeInstance => self.runtime.clear(),
            RecordOp::AppendHistoric(mut rec) => {
                rec.seq = next_seq.fetch_add(1, Ordering::SeqCst);
                self.historic.push(rec);
            }
        }
    }
}

/// Store en memoria, seguro para instancias en paralelo.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    inner: DashMap<Uuid, InstanceRecords>,
    next_seq: AtomicU64,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VariableRecordStore for InMemoryRecordStore {
    fn commit(&self, batch: RecordBatch) -> Result<(), VariableError> {
        if batch.is_empty() {
            return Ok(());
        }
        let instance_id = batch.instance_id;
        let count = batch.len();
        // El entry mantiene el lock del shard hasta terminar: los lectores
        // ven el batch entero o nada.
        let mut entry = self.inner.entry(instance_id).or_default();
        for op in batch.into_ops() {
            entry.apply(op, &self.next_seq);
        }
        debug!("commit:done instance_id={instance_id} ops={count}");
        Ok(())
    }

    fn runtime_variables(&self, instance_id: Uuid) -> Result<Vec<RuntimeVariableRecord>, VariableError> {
        Ok(self.inner
               .get(&instance_id)
               .map(|r| r.runtime.values().cloned().collect())
               .unwrap_or_default())
    }

    fn historic_variables(&self, instance_id: Uuid) -> Result<Vec<HistoricVariableRecord>, VariableError> {
        Ok(self.inner
               .get(&instance_id)
               .map(|r| r.historic.clone())
               .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::TypedValue;
    use chrono::Utc;

    fn runtime(instance_id: Uuid, scope: u32, name: &str, v: &str) -> RuntimeVariableRecord {
        RuntimeVariableRecord { instance_id,
                                scope_id: ScopeId(scope),
                                name: name.into(),
                                value: TypedValue::string(v).serialize(name).unwrap(),
                                revision: 1,
                                updated_at: Utc::now() }
    }

    fn historic(instance_id: Uuid, name: &str, v: &str) -> HistoricVariableRecord {
        HistoricVariableRecord { seq: 0,
                                 instance_id,
                                 scope_id: ScopeId::ROOT,
                                 name: name.into(),
                                 value: TypedValue::string(v).serialize(name).unwrap(),
                                 revision: 1,
                                 created: true,
                                 recorded_at: Utc::now() }
    }

    #[test]
    fn runtime_upsert_overwrites_and_historic_accumulates() {
        let store = InMemoryRecordStore::new();
        let id = Uuid::new_v4();
        for v in ["a", "b"] {
            let mut batch = RecordBatch::new(id);
            batch.push(RecordOp::UpsertRuntime(runtime(id, 0, "foo", v)));
            batch.push(RecordOp::AppendHistoric(historic(id, "foo", v)));
            store.commit(batch).unwrap();
        }
        let rt = store.runtime_variables(id).unwrap();
        assert_eq!(rt.len(), 1);
        assert_eq!(rt[0].typed_value().unwrap(), TypedValue::string("b"));
        let hist = store.historic_variables(id).unwrap();
        assert_eq!(hist.len(), 2);
        assert!(hist[0].seq < hist[1].seq);
    }

    #[test]
    fn deleting_instance_keeps_history() {
        let store = InMemoryRecordStore::new();
        let id = Uuid::new_v4();
        let mut batch = RecordBatch::new(id);
        batch.push(RecordOp::UpsertRuntime(runtime(id, 0, "a", "1")));
        batch.push(RecordOp::UpsertRuntime(runtime(id, 1, "b", "2")));
        batch.push(RecordOp::AppendHistoric(historic(id, "a", "1")));
        store.commit(batch).unwrap();

        let mut batch = RecordBatch::new(id);
        batch.push(RecordOp::DeleteRuntimeScope(ScopeId(1)));
        store.commit(batch).unwrap();
        assert_eq!(store.runtime_variables(id).unwrap().len(), 1);

        let mut batch = RecordBatch::new(id);
        batch.push(RecordOp::DeleteRuntimeInstance);
        store.commit(batch).unwrap();
        assert!(store.runtime_variables(id).unwrap().is_empty());
        assert_eq!(store.historic_variables(id).unwrap().len(), 1);
    }

    #[test]
    fn unknown_instance_yields_empty_projections() {
        let store = InMemoryRecordStore::new();
        assert!(store.runtime_variables(Uuid::new_v4()).unwrap().is_empty());
        assert!(store.historic_variables(Uuid::new_v4()).unwrap().is_empty());
    }
}
