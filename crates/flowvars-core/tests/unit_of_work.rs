use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use flowvars_core::{HistoricVariableRecord, HistoryLevel, InMemoryRecordStore, PassiveOrchestrator, RecordBatch,
                    RuntimeVariableRecord, ScopeId, TypedValue, VariableEngine, VariableError, VariableMap,
                    VariableRecordStore};
use rayon::prelude::*;
use uuid::Uuid;

/// Store que falla el commit mientras `fail` esté activo.
#[derive(Default)]
struct FlakyStore {
    inner: InMemoryRecordStore,
    fail: AtomicBool,
}

impl VariableRecordStore for FlakyStore {
    fn commit(&self, batch: RecordBatch) -> Result<(), VariableError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(VariableError::Persistence("connection reset".into()));
        }
        self.inner.commit(batch)
    }

    fn runtime_variables(&self, instance_id: Uuid) -> Result<Vec<RuntimeVariableRecord>, VariableError> {
        self.inner.runtime_variables(instance_id)
    }

    fn historic_variables(&self, instance_id: Uuid) -> Result<Vec<HistoricVariableRecord>, VariableError> {
        self.inner.historic_variables(instance_id)
    }
}

#[test]
fn commit_failure_discards_in_memory_mutations() {
    let engine = VariableEngine::new(FlakyStore::default(), PassiveOrchestrator::new(HistoryLevel::Full));
    let pi = engine.start_process_instance("p", VariableMap::new().put("a", 1)).unwrap();

    engine.store().fail.store(true, Ordering::SeqCst);
    let err = engine.set_variable(pi.id, ScopeId::ROOT, "a", 2).unwrap_err();
    assert_eq!(err, VariableError::Persistence("connection reset".into()));
    assert_eq!(err.class(), flowvars_core::ErrorClass::Transient);

    // ni siquiera una escritura transitoria sobrevive a un commit fallido
    engine.set_variable(pi.id, ScopeId::ROOT, "t", TypedValue::string_transient("x")).unwrap_err();
    engine.store().fail.store(false, Ordering::SeqCst);

    assert_eq!(engine.get_variable(pi.id, ScopeId::ROOT, "a").unwrap(), TypedValue::integer(1));
    assert!(engine.get_variable(pi.id, ScopeId::ROOT, "t").unwrap_err().is_not_found());
    assert_eq!(engine.query_historic_variables(pi.id).unwrap().len(), 1);
}

#[test]
fn failed_start_leaves_no_instance_behind() {
    let store = FlakyStore::default();
    store.fail.store(true, Ordering::SeqCst);
    let engine = VariableEngine::new(store, PassiveOrchestrator::default());
    assert!(engine.start_process_instance("p", VariableMap::new().put("a", 1)).is_err());
    assert!(engine.instance_ids().is_empty());
}

#[test]
fn bulk_write_is_all_or_nothing() {
    let engine = VariableEngine::new(InMemoryRecordStore::new(), PassiveOrchestrator::default());
    let pi = engine.start_process_instance("p", VariableMap::new()).unwrap();
    let batch = VariableMap::new().put("ok", 1)
                                  .put("bad", TypedValue::object(serde_json::json!({"no": "format"})));
    let err = engine.set_variables(pi.id, ScopeId::ROOT, batch).unwrap_err();
    assert!(matches!(err, VariableError::SerializationUnsupported { .. }));
    assert!(engine.get_variable(pi.id, ScopeId::ROOT, "ok").unwrap_err().is_not_found());
    assert!(engine.query_runtime_variables(pi.id).unwrap().is_empty());
}

#[test]
fn independent_instances_run_in_parallel() {
    let engine = Arc::new(VariableEngine::new(InMemoryRecordStore::new(), PassiveOrchestrator::default()));
    let ids: Vec<Uuid> = (0..16).map(|i| {
                                    engine.start_process_instance("p", VariableMap::new().put("seed", i as i64))
                                          .unwrap()
                                          .id
                                })
                                .collect();

    ids.par_iter().for_each(|id| {
                      for n in 0..50i64 {
                          engine.set_variable(*id, ScopeId::ROOT, "n", n).unwrap();
                          engine.set_variable(*id, ScopeId::ROOT, "scratch", TypedValue::long_transient(n))
                                .unwrap();
                      }
                  });

    for id in ids {
        let runtime = engine.query_runtime_variables(id).unwrap();
        assert_eq!(runtime.len(), 2, "seed + n for {id}");
        assert!(runtime.contains(&("n".to_string(), TypedValue::long(49))));
        // 1 (seed) + 50 (n)
        assert_eq!(engine.query_historic_variables(id).unwrap().len(), 51);
    }
}

#[test]
fn commands_on_one_instance_are_serialized() {
    let engine = VariableEngine::new(InMemoryRecordStore::new(), PassiveOrchestrator::default());
    let pi = engine.start_process_instance("p", VariableMap::new().put("counter", 0i64)).unwrap();

    (0..100).into_par_iter().for_each(|_| {
                                engine.execute(pi.id, |ctx| {
                                          let current = ctx.get_variable("counter")?.as_i64().unwrap_or(0);
                                          ctx.set_variable("counter", current + 1)
                                      })
                                      .unwrap();
                            });

    assert_eq!(engine.get_variable(pi.id, ScopeId::ROOT, "counter").unwrap(), TypedValue::long(100));
    let runtime = engine.runtime_records(pi.id).unwrap();
    assert_eq!(runtime[0].revision, 101);
}
