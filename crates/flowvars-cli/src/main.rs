use flowvars::{app_config, build_passive_engine, AppConfig};
use flowvars_core::{parse_condition, HistoryLevel, ScopeId, SerializationFormat, TypedValue, VariableMap};

const USAGE: &str = "Uso:\n  flowvars-cli eval --expr '<EXPR>' [--var name=value]...\n  flowvars-cli demo [--history \
                     none|activity|audit|full]";

/// Interpreta el lado derecho de `--var name=value`: JSON escalar si parsea
/// (número, bool, null, string entre comillas), texto plano si no.
fn parse_cli_value(raw: &str) -> TypedValue {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Null) => TypedValue::null(),
        Ok(serde_json::Value::Bool(b)) => TypedValue::boolean(b),
        Ok(serde_json::Value::Number(n)) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => match i32::try_from(i) {
                Ok(small) => TypedValue::integer(small),
                Err(_) => TypedValue::long(i),
            },
            (None, Some(f)) => TypedValue::double(f),
            (None, None) => TypedValue::string(raw),
        },
        Ok(serde_json::Value::String(s)) => TypedValue::string(s),
        Ok(other) => TypedValue::object(other).serialization_format(SerializationFormat::Json),
        Err(_) => TypedValue::string(raw),
    }
}

fn run_eval(args: &[String]) -> i32 {
    let mut expr: Option<String> = None;
    let mut vars = VariableMap::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--expr" => {
                i += 1;
                if i < args.len() {
                    expr = Some(args[i].clone());
                }
            }
            "--var" => {
                i += 1;
                match args.get(i).and_then(|kv| kv.split_once('=')) {
                    Some((name, value)) => {
                        vars.insert(name.trim(), parse_cli_value(value));
                    }
                    None => {
                        eprintln!("[flowvars eval] --var espera name=value");
                        return 2;
                    }
                }
            }
            _ => {}
        }
        i += 1;
    }
    let Some(expr) = expr else {
        eprintln!("{USAGE}");
        return 2;
    };
    let condition = match parse_condition(&expr) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("[flowvars eval] {e}");
            return 3;
        }
    };
    match condition.evaluate(&vars) {
        Ok(result) => {
            println!("{result}");
            if result {
                0
            } else {
                1
            }
        }
        Err(e) => {
            eprintln!("[flowvars eval] {e}");
            3
        }
    }
}

fn run_demo(args: &[String]) -> i32 {
    let mut config: AppConfig = match app_config() {
        Ok(cfg) => cfg.clone(),
        Err(e) => {
            eprintln!("[flowvars demo] {e}");
            return 2;
        }
    };
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--history" {
            i += 1;
            match args.get(i).map(|v| v.parse::<HistoryLevel>()) {
                Some(Ok(level)) => config.history_level = level,
                Some(Err(e)) => {
                    eprintln!("[flowvars demo] {e}");
                    return 2;
                }
                None => {
                    eprintln!("{USAGE}");
                    return 2;
                }
            }
        }
        i += 1;
    }

    let engine = match build_passive_engine(&config) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("[flowvars demo] {e}");
            return 5;
        }
    };
    let scenario = || -> Result<(), flowvars_core::VariableError> {
        let vars = VariableMap::new().put("orderId", "A-17")
                                     .put("token", TypedValue::string_transient("s3cr3t"));
        let pi = engine.start_process_instance("demo", vars)?;
        engine.set_variable(pi.id, ScopeId::ROOT, "foo", TypedValue::string_transient("bar"))?;
        engine.set_variable(pi.id, ScopeId::ROOT, "foo", "baz")?;
        let branch = engine.create_child_scope(pi.id, ScopeId::ROOT)?;
        engine.set_variable_local(pi.id, branch, "attempt", 1)?;

        println!("instance: {} (backend={}, history={})",
                 pi.id,
                 engine.store().name(),
                 engine.history_level());
        println!("visible from branch:");
        for (name, value) in engine.get_variables(pi.id, branch)? {
            println!("  {name} = {value:?}");
        }
        println!("runtime records:");
        for (name, value) in engine.query_runtime_variables(pi.id)? {
            println!("  {name} = {value:?}");
        }
        println!("historic records:");
        for (name, value, at) in engine.query_historic_variables(pi.id)? {
            println!("  {at} {name} = {value:?}");
        }
        engine.terminate_instance(pi.id)
    };
    match scenario() {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("[flowvars demo] {e}");
            4
        }
    }
}

fn main() {
    // CLI mínima: `flowvars-cli eval ...` | `flowvars-cli demo ...`
    let args: Vec<String> = std::env::args().collect();
    let code = match args.get(1).map(String::as_str) {
        Some("eval") => run_eval(&args[2..]),
        Some("demo") => run_demo(&args[2..]),
        _ => {
            eprintln!("{USAGE}");
            2
        }
    };
    std::process::exit(code);
}
