use flowvars::{build_engine, build_passive_engine, AppConfig, RecordBackend};
use flowvars_core::{HistoryLevel, PassiveOrchestrator, ScopeId, SerializationFormat, TypedValue, VariableMap};
use serde_json::json;

fn in_memory_config(pairs: &[(&str, &str)]) -> AppConfig {
    let pairs: Vec<(String, String)> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    AppConfig::from_lookup(move |key| {
        pairs.iter()
             .find(|(k, _)| k == key)
             .map(|(_, v)| v.clone())
    }).unwrap()
}

#[test]
fn passive_engine_uses_configured_history_level() {
    let cfg = in_memory_config(&[("FLOWVARS_HISTORY_LEVEL", "activity")]);
    let engine = build_passive_engine(&cfg).unwrap();
    assert_eq!(engine.store().name(), "memory");
    assert_eq!(engine.history_level(), HistoryLevel::Activity);

    let pi = engine.start_process_instance("p", VariableMap::new().put("a", 1)).unwrap();
    assert_eq!(engine.query_runtime_variables(pi.id).unwrap().len(), 1);
    assert!(engine.query_historic_variables(pi.id).unwrap().is_empty());
}

#[test]
fn configured_default_format_makes_objects_persistable() {
    let cfg = in_memory_config(&[("FLOWVARS_DEFAULT_SERIALIZATION_FORMAT", "json")]);
    assert_eq!(cfg.engine.default_serialization_format, Some(SerializationFormat::Json));
    let engine = build_engine(&cfg.engine,
                              RecordBackend::in_memory(),
                              PassiveOrchestrator::new(HistoryLevel::Full));
    let pi = engine.start_process_instance("p", VariableMap::new()).unwrap();
    engine.set_variable(pi.id, ScopeId::ROOT, "doc", TypedValue::object(json!({"k": [1, 2]})))
          .unwrap();
    assert_eq!(engine.query_historic_variables(pi.id).unwrap().len(), 1);
}
