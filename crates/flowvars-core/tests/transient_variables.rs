use chrono::Utc;
use flowvars_core::conditional::{ConditionalSubscriptionSpec, TriggeredSubscription};
use flowvars_core::{ExecutionContext, HistoryLevel, InMemoryRecordStore, Orchestrator, PassiveOrchestrator, ScopeId,
                    SerializationFormat, TypedValue, VariableEngine, VariableError, VariableMap};
use serde_json::json;

fn engine(level: HistoryLevel) -> VariableEngine<InMemoryRecordStore, PassiveOrchestrator> {
    VariableEngine::new(InMemoryRecordStore::new(), PassiveOrchestrator::new(level))
}

fn transient_values() -> Vec<(&'static str, TypedValue)> {
    vec![("a", TypedValue::string_transient("bar")),
         ("b", TypedValue::boolean_transient(true)),
         ("c", TypedValue::bytes_transient(b"123".to_vec())),
         ("d", TypedValue::date_transient(Utc::now())),
         ("e", TypedValue::double_transient(20.0)),
         ("f", TypedValue::integer_transient(10)),
         ("g", TypedValue::long_transient(10)),
         ("h", TypedValue::short_transient(3)),
         ("i", TypedValue::object_transient(json!(100))),
         ("j", TypedValue::untyped(json!(null), true)),
         ("k", TypedValue::untyped(json!(50), true)),
         ("l", TypedValue::file_transient("simpleFile.txt", b"123".to_vec())),
         ("m", TypedValue::null_transient())]
}

#[test]
fn transient_start_variables_leave_no_records_for_any_type() {
    let engine = engine(HistoryLevel::Full);
    let vars: VariableMap = transient_values().into_iter().collect();
    let pi = engine.start_process_instance("Process", vars).unwrap();

    assert!(engine.query_runtime_variables(pi.id).unwrap().is_empty());
    assert!(engine.query_historic_variables(pi.id).unwrap().is_empty());
    // siguen siendo legibles mientras la instancia vive
    for (name, value) in transient_values() {
        let read = engine.get_variable(pi.id, ScopeId::ROOT, name).unwrap();
        if name != "d" {
            assert_eq!(read, value, "value mismatch for {name}");
        }
        assert!(read.is_transient(), "{name} lost its transient flag");
    }
}

#[test]
fn transient_then_durable_write_on_same_name() {
    let engine = engine(HistoryLevel::Audit);
    let pi = engine.start_process_instance("Process", VariableMap::new()).unwrap();

    engine.set_variable(pi.id, ScopeId::ROOT, "foo", TypedValue::string_transient("bar")).unwrap();
    assert!(engine.query_runtime_variables(pi.id).unwrap().is_empty());
    assert!(engine.query_historic_variables(pi.id).unwrap().is_empty());

    engine.set_variable(pi.id, ScopeId::ROOT, "foo", TypedValue::string("baz")).unwrap();
    let runtime = engine.query_runtime_variables(pi.id).unwrap();
    assert_eq!(runtime, vec![("foo".to_string(), TypedValue::string("baz"))]);
    let historic = engine.query_historic_variables(pi.id).unwrap();
    assert_eq!(historic.len(), 1);
    assert_eq!(historic[0].1, TypedValue::string("baz"));

    assert_eq!(engine.get_variable(pi.id, ScopeId::ROOT, "foo").unwrap(), TypedValue::string("baz"));
}

#[test]
fn durable_writes_accumulate_history_but_keep_one_runtime_record() {
    let engine = engine(HistoryLevel::Full);
    let pi = engine.start_process_instance("Process", VariableMap::new().put("n", 1)).unwrap();
    engine.set_variable(pi.id, ScopeId::ROOT, "n", 2).unwrap();
    engine.set_variable(pi.id, ScopeId::ROOT, "n", 3).unwrap();

    assert_eq!(engine.query_runtime_variables(pi.id).unwrap(),
               vec![("n".to_string(), TypedValue::integer(3))]);
    let historic: Vec<TypedValue> = engine.query_historic_variables(pi.id)
                                          .unwrap()
                                          .into_iter()
                                          .map(|(_, v, _)| v)
                                          .collect();
    assert_eq!(historic, vec![TypedValue::integer(1), TypedValue::integer(2), TypedValue::integer(3)]);

    let records = engine.historic_records(pi.id).unwrap();
    assert!(records[0].created);
    assert!(!records[1].created);
    assert_eq!(records.iter().map(|r| r.revision).collect::<Vec<_>>(), vec![1, 2, 3]);
}

#[test]
fn history_below_audit_keeps_only_runtime_records() {
    for level in [HistoryLevel::None, HistoryLevel::Activity] {
        let engine = engine(level);
        let pi = engine.start_process_instance("Process", VariableMap::new().put("x", "y")).unwrap();
        assert_eq!(engine.query_runtime_variables(pi.id).unwrap().len(), 1, "level {level}");
        assert!(engine.query_historic_variables(pi.id).unwrap().is_empty(), "level {level}");
    }
}

#[test]
fn overwriting_durable_with_transient_drops_runtime_projection() {
    let engine = engine(HistoryLevel::Audit);
    let pi = engine.start_process_instance("Process", VariableMap::new().put("foo", "durable")).unwrap();
    engine.set_variable(pi.id, ScopeId::ROOT, "foo", TypedValue::string_transient("secret")).unwrap();

    assert!(engine.query_runtime_variables(pi.id).unwrap().is_empty());
    // el histórico de la escritura durable se conserva
    assert_eq!(engine.query_historic_variables(pi.id).unwrap().len(), 1);
    assert_eq!(engine.get_variable(pi.id, ScopeId::ROOT, "foo").unwrap(), TypedValue::string("secret"));
}

#[test]
fn durable_object_without_format_is_rejected_before_mutation() {
    let engine = engine(HistoryLevel::Audit);
    let pi = engine.start_process_instance("Process", VariableMap::new()).unwrap();
    let err = engine.set_variable(pi.id, ScopeId::ROOT, "payload", TypedValue::object(json!({"a": 1})))
                    .unwrap_err();
    assert!(matches!(err, VariableError::SerializationUnsupported { ref name, .. } if name == "payload"));
    assert!(engine.get_variable(pi.id, ScopeId::ROOT, "payload").unwrap_err().is_not_found());

    // con formato declarado o por defecto sí es persistible
    engine.set_variable(pi.id,
                        ScopeId::ROOT,
                        "payload",
                        TypedValue::object(json!({"a": 1})).serialization_format(SerializationFormat::Json))
          .unwrap();
    assert_eq!(engine.query_runtime_variables(pi.id).unwrap().len(), 1);

    let with_default = VariableEngine::builder(InMemoryRecordStore::new(), PassiveOrchestrator::default())
        .default_serialization_format(SerializationFormat::Json)
        .build();
    let pi = with_default.start_process_instance("Process", VariableMap::new().put("o", TypedValue::object(json!([1, 2]))))
                         .unwrap();
    assert_eq!(with_default.query_runtime_variables(pi.id).unwrap()[0].1, TypedValue::object(json!([1, 2])));
}

#[test]
fn durable_file_round_trips_through_runtime_record() {
    let engine = engine(HistoryLevel::Full);
    let file = TypedValue::file("simpleFile.txt", b"123".to_vec()).file_meta(Some("text/plain".into()),
                                                                            Some("UTF-8".into()));
    let pi = engine.start_process_instance("Process", VariableMap::new().put("l", file.clone())).unwrap();
    let runtime = engine.query_runtime_variables(pi.id).unwrap();
    assert_eq!(runtime, vec![("l".to_string(), file)]);
    assert!(!runtime[0].1.is_transient());
}

#[test]
fn transient_case_variables_leave_no_records() {
    let engine = engine(HistoryLevel::Full);
    let ci = engine.start_case_instance("oneTaskCase", VariableMap::new()).unwrap();
    engine.set_variable(ci.id, ScopeId::ROOT, "foo", TypedValue::string_transient("bar")).unwrap();
    engine.set_variable(ci.id, ScopeId::ROOT, "baz", TypedValue::long_transient(7)).unwrap();

    assert!(engine.query_runtime_variables(ci.id).unwrap().is_empty());
    assert!(engine.query_historic_variables(ci.id).unwrap().is_empty());
}

/// Un delegate escribe `variable` transitoria y la rama llega a un evento
/// condicional `${variable == 1}`; al cumplirse, la instancia termina.
struct DelegateThenConditionalCatch;

impl Orchestrator for DelegateThenConditionalCatch {
    fn current_history_level(&self) -> HistoryLevel {
        HistoryLevel::Full
    }

    fn on_instance_started(&self, ctx: &mut ExecutionContext<'_>) -> Result<(), VariableError> {
        ctx.set_variable("variable", TypedValue::integer_transient(1))?;
        ctx.subscribe_conditional(ConditionalSubscriptionSpec::new("conditionalCatch", "${variable == 1}"))?;
        Ok(())
    }

    fn resolve_waiting_branch(&self,
                              ctx: &mut ExecutionContext<'_>,
                              trigger: &TriggeredSubscription)
                              -> Result<(), VariableError> {
        assert_eq!(trigger.activity_id, "conditionalCatch");
        ctx.complete_instance()
    }
}

#[test]
fn transient_variable_satisfies_conditional_catch_in_start_command() {
    let engine = VariableEngine::new(InMemoryRecordStore::new(), DelegateThenConditionalCatch);
    let pi = engine.start_process_instance("process", VariableMap::new()).unwrap();

    assert!(pi.is_ended());
    assert!(!engine.is_active(pi.id));
    assert!(engine.query_runtime_variables(pi.id).unwrap().is_empty());
    assert!(engine.query_historic_variables(pi.id).unwrap().is_empty());
}
