use flowvars_core::{HistoryLevel, InMemoryRecordStore, PassiveOrchestrator, ScopeId, TypedValue, VariableEngine,
                    VariableError, VariableMap};

fn engine() -> VariableEngine<InMemoryRecordStore, PassiveOrchestrator> {
    VariableEngine::new(InMemoryRecordStore::new(), PassiveOrchestrator::new(HistoryLevel::Full))
}

#[test]
fn child_reads_nearest_binding_in_chain() {
    let engine = engine();
    let pi = engine.start_process_instance("p", VariableMap::new().put("x", "root")).unwrap();
    let child = engine.create_child_scope(pi.id, ScopeId::ROOT).unwrap();
    let grandchild = engine.create_child_scope(pi.id, child).unwrap();

    assert_eq!(engine.get_variable(pi.id, grandchild, "x").unwrap(), TypedValue::string("root"));

    engine.set_variable_local(pi.id, child, "x", "child").unwrap();
    assert_eq!(engine.get_variable(pi.id, grandchild, "x").unwrap(), TypedValue::string("child"));
    assert_eq!(engine.get_variable(pi.id, ScopeId::ROOT, "x").unwrap(), TypedValue::string("root"));

    let err = engine.get_variable(pi.id, grandchild, "missing").unwrap_err();
    assert_eq!(err,
               VariableError::VariableNotFound { name: "missing".into(),
                                                 scope: grandchild });
}

#[test]
fn sibling_branches_share_parent_slot() {
    let engine = engine();
    let pi = engine.start_process_instance("p", VariableMap::new().put("counter", 0)).unwrap();
    let left = engine.create_child_scope(pi.id, ScopeId::ROOT).unwrap();
    let right = engine.create_child_scope(pi.id, ScopeId::ROOT).unwrap();

    engine.set_variable(pi.id, left, "counter", 1).unwrap();
    assert_eq!(engine.get_variable(pi.id, right, "counter").unwrap(), TypedValue::integer(1));
    engine.set_variable(pi.id, right, "counter", 2).unwrap();
    assert_eq!(engine.get_variable(pi.id, left, "counter").unwrap(), TypedValue::integer(2));

    // un único slot en la raíz con una sola secuencia de revisiones
    let runtime = engine.runtime_records(pi.id).unwrap();
    assert_eq!(runtime.len(), 1);
    assert_eq!(runtime[0].scope_id, ScopeId::ROOT);
    assert_eq!(runtime[0].revision, 3);
    assert!(engine.get_variable_local(pi.id, left, "counter").unwrap_err().is_not_found());
}

#[test]
fn new_names_are_created_locally() {
    let engine = engine();
    let pi = engine.start_process_instance("p", VariableMap::new()).unwrap();
    let branch = engine.create_child_scope(pi.id, ScopeId::ROOT).unwrap();
    engine.set_variable(pi.id, branch, "local", TypedValue::null()).unwrap();

    assert!(engine.get_variable(pi.id, branch, "local").unwrap().is_null());
    assert!(engine.get_variable(pi.id, ScopeId::ROOT, "local").unwrap_err().is_not_found());
}

#[test]
fn destroying_a_branch_drops_runtime_records_but_keeps_history() {
    let engine = engine();
    let pi = engine.start_process_instance("p", VariableMap::new().put("shared", 1)).unwrap();
    let branch = engine.create_child_scope(pi.id, ScopeId::ROOT).unwrap();
    let nested = engine.create_child_scope(pi.id, branch).unwrap();
    engine.set_variable_local(pi.id, branch, "a", "x").unwrap();
    engine.set_variable_local(pi.id, nested, "b", "y").unwrap();
    assert_eq!(engine.query_runtime_variables(pi.id).unwrap().len(), 3);

    engine.destroy_scope(pi.id, branch).unwrap();
    assert_eq!(engine.query_runtime_variables(pi.id).unwrap(),
               vec![("shared".to_string(), TypedValue::integer(1))]);
    assert_eq!(engine.query_historic_variables(pi.id).unwrap().len(), 3);

    assert_eq!(engine.set_variable(pi.id, nested, "b", "z").unwrap_err(),
               VariableError::ScopeDestroyed(nested));
    assert_eq!(engine.create_child_scope(pi.id, ScopeId(42)).unwrap_err(),
               VariableError::UnknownScope(ScopeId(42)));
}

#[test]
fn removing_a_variable_deletes_runtime_record_only() {
    let engine = engine();
    let pi = engine.start_process_instance("p", VariableMap::new().put("a", 1).put("b", 2)).unwrap();
    let branch = engine.create_child_scope(pi.id, ScopeId::ROOT).unwrap();

    // la eliminación resuelve por la cadena de padres
    engine.remove_variable(pi.id, branch, "a").unwrap();
    assert!(engine.get_variable(pi.id, ScopeId::ROOT, "a").unwrap_err().is_not_found());
    assert_eq!(engine.query_runtime_variables(pi.id).unwrap(),
               vec![("b".to_string(), TypedValue::integer(2))]);
    assert_eq!(engine.query_historic_variables(pi.id).unwrap().len(), 2);

    assert!(engine.remove_variable(pi.id, branch, "a").unwrap_err().is_not_found());
}

#[test]
fn terminating_the_instance_clears_runtime_records() {
    let engine = engine();
    let pi = engine.start_process_instance("p", VariableMap::new().put("a", 1)).unwrap();
    let branch = engine.create_child_scope(pi.id, ScopeId::ROOT).unwrap();
    engine.set_variable_local(pi.id, branch, "b", 2).unwrap();

    engine.terminate_instance(pi.id).unwrap();
    assert!(engine.query_runtime_variables(pi.id).unwrap().is_empty());
    assert_eq!(engine.query_historic_variables(pi.id).unwrap().len(), 2);
    assert_eq!(engine.get_variable(pi.id, ScopeId::ROOT, "a").unwrap_err(),
               VariableError::UnknownInstance(pi.id));
}

#[test]
fn destroying_root_completes_the_instance() {
    let engine = engine();
    let pi = engine.start_process_instance("p", VariableMap::new().put("a", 1)).unwrap();
    engine.destroy_scope(pi.id, ScopeId::ROOT).unwrap();
    assert!(!engine.is_active(pi.id));
    assert!(engine.query_runtime_variables(pi.id).unwrap().is_empty());
}

#[test]
fn snapshot_prefers_nearest_binding() {
    let engine = engine();
    let pi = engine.start_process_instance("p", VariableMap::new().put("a", 1).put("b", 2)).unwrap();
    let branch = engine.create_child_scope(pi.id, ScopeId::ROOT).unwrap();
    engine.set_variable_local(pi.id, branch, "b", 20).unwrap();

    let snapshot = engine.get_variables(pi.id, branch).unwrap();
    assert_eq!(snapshot.get("a"), Some(&TypedValue::integer(1)));
    assert_eq!(snapshot.get("b"), Some(&TypedValue::integer(20)));
}
