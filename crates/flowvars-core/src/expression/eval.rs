//! Evaluación de expresiones contra un conjunto de variables resueltas.
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::Value as Json;

use super::ast::{BinaryOp, Expr, Literal, UnaryOp};
use super::ExpressionError;
use crate::value::{RawValue, TypedValue, VariableMap};

/// Fuente de variables para la evaluación.
pub trait Bindings {
    fn lookup(&self, name: &str) -> Option<&TypedValue>;
}

impl Bindings for BTreeMap<String, TypedValue> {
    fn lookup(&self, name: &str) -> Option<&TypedValue> {
        self.get(name)
    }
}

impl Bindings for HashMap<String, TypedValue> {
    fn lookup(&self, name: &str) -> Option<&TypedValue> {
        self.get(name)
    }
}

impl Bindings for VariableMap {
    fn lookup(&self, name: &str) -> Option<&TypedValue> {
        self.get(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Date(DateTime<Utc>),
    /// Bytes, archivos y objetos no escalares: sólo admiten `==`/`!=`.
    Opaque(TypedValue),
}

impl Value {
    fn from_typed(value: &TypedValue) -> Value {
        match value.raw() {
            RawValue::Null => Value::Null,
            RawValue::Boolean(b) => Value::Bool(*b),
            RawValue::String(s) => Value::Str(s.clone()),
            RawValue::Short(v) => Value::Int(*v as i64),
            RawValue::Integer(v) => Value::Int(*v as i64),
            RawValue::Long(v) => Value::Int(*v),
            RawValue::Double(v) => Value::Float(*v),
            RawValue::Date(d) => Value::Date(*d),
            RawValue::Object(obj) => match &obj.data {
                Json::Null => Value::Null,
                Json::Bool(b) => Value::Bool(*b),
                Json::String(s) => Value::Str(s.clone()),
                Json::Number(n) => match n.as_i64() {
                    Some(i) => Value::Int(i),
                    None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
                },
                _ => Value::Opaque(value.clone()),
            },
            RawValue::Bytes(_) | RawValue::File(_) => Value::Opaque(value.clone()),
        }
    }

    fn type_label(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Date(_) => "date",
            Value::Opaque(v) => v.value_type().as_str(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(s) => write!(f, "'{s}'"),
            Value::Date(d) => write!(f, "{}", d.to_rfc3339()),
            Value::Opaque(v) => write!(f, "<{}>", v.value_type().as_str()),
        }
    }
}

fn mismatch(op: &str, left: &Value, right: &Value) -> ExpressionError {
    ExpressionError::TypeMismatch(format!("cannot apply '{op}' to {} and {}",
                                          left.type_label(),
                                          right.type_label()))
}

pub(crate) fn evaluate(expr: &Expr, bindings: &dyn Bindings) -> Result<Value, ExpressionError> {
    match expr {
        Expr::Literal(lit) => Ok(match lit {
            Literal::Null => Value::Null,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Int(v) => Value::Int(*v),
            Literal::Float(v) => Value::Float(*v),
            Literal::Str(s) => Value::Str(s.clone()),
        }),
        // Un identificador sin binding evalúa a null.
        Expr::Ident(name) => Ok(bindings.lookup(name).map(Value::from_typed).unwrap_or(Value::Null)),
        Expr::Unary { op, operand } => {
            let v = evaluate(operand, bindings)?;
            match (op, v) {
                (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                (UnaryOp::Neg, Value::Int(i)) => i.checked_neg()
                                                  .map(Value::Int)
                                                  .ok_or_else(|| ExpressionError::TypeMismatch("integer overflow".into())),
                (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
                (UnaryOp::Not, other) => {
                    Err(ExpressionError::TypeMismatch(format!("cannot apply '!' to {}", other.type_label())))
                }
                (UnaryOp::Neg, other) => {
                    Err(ExpressionError::TypeMismatch(format!("cannot apply '-' to {}", other.type_label())))
                }
            }
        }
        Expr::Binary { op: BinaryOp::And, left, right } => {
            if !expect_bool("&&", evaluate(left, bindings)?)? {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(expect_bool("&&", evaluate(right, bindings)?)?))
        }
        Expr::Binary { op: BinaryOp::Or, left, right } => {
            if expect_bool("||", evaluate(left, bindings)?)? {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(expect_bool("||", evaluate(right, bindings)?)?))
        }
        Expr::Binary { op, left, right } => {
            let l = evaluate(left, bindings)?;
            let r = evaluate(right, bindings)?;
            binary(*op, l, r)
        }
    }
}

fn expect_bool(op: &str, v: Value) -> Result<bool, ExpressionError> {
    match v {
        Value::Bool(b) => Ok(b),
        other => Err(ExpressionError::TypeMismatch(format!("operand of '{op}' must be boolean, got {}",
                                                          other.type_label()))),
    }
}

fn binary(op: BinaryOp, l: Value, r: Value) -> Result<Value, ExpressionError> {
    match op {
        BinaryOp::Eq => equals(&l, &r).map(Value::Bool),
        BinaryOp::Ne => equals(&l, &r).map(|eq| Value::Bool(!eq)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ord = compare(op, &l, &r)?;
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ord == Ordering::Less,
                BinaryOp::Le => ord != Ordering::Greater,
                BinaryOp::Gt => ord == Ordering::Greater,
                _ => ord != Ordering::Less,
            }))
        }
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => arithmetic(op, l, r),
        BinaryOp::And | BinaryOp::Or => Err(ExpressionError::TypeMismatch(format!("unexpected logical operator '{}'",
                                                                                  op.symbol()))),
    }
}

/// Igualdad con promoción numérica. `null` sólo es igual a `null`; otros
/// pares de tipos distintos son un error.
fn equals(l: &Value, r: &Value) -> Result<bool, ExpressionError> {
    match (l, r) {
        (Value::Null, Value::Null) => Ok(true),
        (Value::Null, _) | (_, Value::Null) => Ok(false),
        (Value::Int(a), Value::Int(b)) => Ok(a == b),
        (Value::Int(a), Value::Float(b)) => Ok((*a as f64) == *b),
        (Value::Float(a), Value::Int(b)) => Ok(*a == (*b as f64)),
        (Value::Float(a), Value::Float(b)) => Ok(a == b),
        (Value::Bool(a), Value::Bool(b)) => Ok(a == b),
        (Value::Str(a), Value::Str(b)) => Ok(a == b),
        (Value::Date(a), Value::Date(b)) => Ok(a == b),
        (Value::Opaque(a), Value::Opaque(b)) => Ok(a == b),
        _ => Err(mismatch("==", l, r)),
    }
}

fn compare(op: BinaryOp, l: &Value, r: &Value) -> Result<Ordering, ExpressionError> {
    let ord = match (l, r) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
        (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
        _ => return Err(mismatch(op.symbol(), l, r)),
    };
    ord.ok_or_else(|| ExpressionError::TypeMismatch("comparison with NaN".into()))
}

fn arithmetic(op: BinaryOp, l: Value, r: Value) -> Result<Value, ExpressionError> {
    match (l, r) {
        (Value::Str(a), Value::Str(b)) if op == BinaryOp::Add => Ok(Value::Str(a + &b)),
        (Value::Int(a), Value::Int(b)) => {
            let out = match op {
                BinaryOp::Add => a.checked_add(b),
                BinaryOp::Sub => a.checked_sub(b),
                BinaryOp::Mul => a.checked_mul(b),
                BinaryOp::Div | BinaryOp::Mod if b == 0 => return Err(ExpressionError::DivisionByZero),
                BinaryOp::Div => a.checked_div(b),
                _ => a.checked_rem(b),
            };
            out.map(Value::Int)
               .ok_or_else(|| ExpressionError::TypeMismatch("integer overflow".into()))
        }
        (l @ (Value::Int(_) | Value::Float(_)), r @ (Value::Int(_) | Value::Float(_))) => {
            let (a, b) = (as_float(&l), as_float(&r));
            if matches!(op, BinaryOp::Div | BinaryOp::Mod) && b == 0.0 {
                return Err(ExpressionError::DivisionByZero);
            }
            Ok(Value::Float(match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                _ => a % b,
            }))
        }
        (l, r) => Err(mismatch(op.symbol(), &l, &r)),
    }
}

fn as_float(v: &Value) -> f64 {
    match v {
        Value::Int(i) => *i as f64,
        Value::Float(f) => *f,
        _ => f64::NAN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::parser::parse;
    use serde_json::json;

    fn eval_with(src: &str, vars: &[(&str, TypedValue)]) -> Result<Value, ExpressionError> {
        let bindings: BTreeMap<String, TypedValue> =
            vars.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
        evaluate(&parse(src).unwrap(), &bindings)
    }

    #[test]
    fn numeric_types_are_promoted() {
        let vars = [("s", TypedValue::short(1)), ("l", TypedValue::long(1)), ("d", TypedValue::double(1.0))];
        assert_eq!(eval_with("s == l && l == d && d == 1", &vars).unwrap(), Value::Bool(true));
        assert_eq!(eval_with("7 / 2", &[]).unwrap(), Value::Int(3));
        assert_eq!(eval_with("7 / 2.0", &[]).unwrap(), Value::Float(3.5));
        assert_eq!(eval_with("-l + 3 % 2", &vars).unwrap(), Value::Int(0));
    }

    #[test]
    fn transient_values_are_visible_like_durable_ones() {
        let vars = [("variable", TypedValue::integer_transient(1))];
        assert_eq!(eval_with("${variable == 1}", &vars).unwrap(), Value::Bool(true));
    }

    #[test]
    fn unknown_identifiers_are_null() {
        assert_eq!(eval_with("missing == null", &[]).unwrap(), Value::Bool(true));
        assert_eq!(eval_with("missing == 1", &[]).unwrap(), Value::Bool(false));
        assert!(matches!(eval_with("missing > 1", &[]), Err(ExpressionError::TypeMismatch(_))));
    }

    #[test]
    fn strings_concatenate_and_compare() {
        let vars = [("a", TypedValue::string("foo"))];
        assert_eq!(eval_with("a + 'bar' == \"foobar\"", &vars).unwrap(), Value::Bool(true));
        assert_eq!(eval_with("a lt 'zzz'", &vars).unwrap(), Value::Bool(true));
    }

    #[test]
    fn logical_operators_short_circuit() {
        // el lado derecho daría error de tipos si se evaluara
        assert_eq!(eval_with("false && (1 + 'x')", &[]).unwrap(), Value::Bool(false));
        assert_eq!(eval_with("true or (1 + 'x')", &[]).unwrap(), Value::Bool(true));
        assert!(matches!(eval_with("1 && true", &[]), Err(ExpressionError::TypeMismatch(_))));
    }

    #[test]
    fn errors_on_mismatch_and_division_by_zero() {
        assert_eq!(eval_with("1 / 0", &[]).unwrap_err(), ExpressionError::DivisionByZero);
        assert_eq!(eval_with("1.0 % 0", &[]).unwrap_err(), ExpressionError::DivisionByZero);
        assert!(matches!(eval_with("'1' == 1", &[]), Err(ExpressionError::TypeMismatch(_))));
        assert!(matches!(eval_with("!1", &[]), Err(ExpressionError::TypeMismatch(_))));
    }

    #[test]
    fn json_scalars_inside_objects_are_comparable() {
        let vars = [("o", TypedValue::object_transient(json!(100))), ("arr", TypedValue::object(json!([1])))];
        assert_eq!(eval_with("o == 100", &vars).unwrap(), Value::Bool(true));
        assert_eq!(eval_with("arr == arr", &vars).unwrap(), Value::Bool(true));
        assert!(matches!(eval_with("arr == 1", &vars), Err(ExpressionError::TypeMismatch(_))));
    }
}
