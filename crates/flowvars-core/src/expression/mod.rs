//! Lenguaje de condiciones de los eventos condicionales.
//!
//! Una `ConditionExpression` se parsea una vez (al registrar la suscripción)
//! y se evalúa muchas veces. Los nombres referenciados se extraen en el
//! parseo para que el evaluador pueda descartar suscripciones que no miran la
//! variable modificada.
mod ast;
mod eval;
mod lexer;
mod parser;

use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

pub use ast::{BinaryOp, Expr, Literal, UnaryOp};
pub use eval::Bindings;
pub use lexer::Token;
pub use parser::MAX_NESTING;

use crate::errors::VariableError;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("unrecognized input at {start}..{end}")]
    Lex { start: usize, end: usize },
    #[error("unexpected {found} at offset {offset}, expected {expected}")]
    UnexpectedToken { found: String, expected: String, offset: usize },
    #[error("unexpected end of expression, expected {expected}")]
    UnexpectedEnd { expected: String },
    #[error("empty expression")]
    Empty,
    #[error("expression nested deeper than {max} levels at offset {offset}")]
    TooDeep { max: usize, offset: usize },
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("condition evaluated to {0}, expected boolean")]
    NotBoolean(String),
}

#[derive(Debug, Clone)]
pub struct ConditionExpression {
    source: String,
    ast: Expr,
    variables: BTreeSet<String>,
}

impl ConditionExpression {
    pub fn parse(source: &str) -> Result<Self, ExpressionError> {
        let ast = parser::parse(source)?;
        let variables = ast.referenced_variables();
        Ok(Self { source: source.to_string(),
                  ast,
                  variables })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn ast(&self) -> &Expr {
        &self.ast
    }

    pub fn referenced_variables(&self) -> &BTreeSet<String> {
        &self.variables
    }

    /// Evalúa la condición; un resultado no booleano es un error.
    pub fn evaluate(&self, bindings: &dyn Bindings) -> Result<bool, ExpressionError> {
        match eval::evaluate(&self.ast, bindings)? {
            eval::Value::Bool(b) => Ok(b),
            other => Err(ExpressionError::NotBoolean(other.to_string())),
        }
    }

    pub(crate) fn invalid(&self, err: ExpressionError) -> VariableError {
        VariableError::InvalidConditionExpression { expression: self.source.clone(),
                                                    reason: err.to_string() }
    }
}

impl PartialEq for ConditionExpression {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Serialize for ConditionExpression {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for ConditionExpression {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        ConditionExpression::parse(&source).map_err(serde::de::Error::custom)
    }
}

/// Parsea una condición reportando el fallo como error del subsistema.
pub fn parse_condition(source: &str) -> Result<ConditionExpression, VariableError> {
    match ConditionExpression::parse(source) {
        Ok(condition) => Ok(condition),
        Err(e) => Err(VariableError::InvalidConditionExpression { expression: source.to_string(),
                                                                  reason: e.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{TypedValue, VariableMap};

    #[test]
    fn referenced_variables_are_extracted_at_parse_time() {
        let c = ConditionExpression::parse("${a > 1 && (b == 'x' || a < 0)}").unwrap();
        let names: Vec<&str> = c.referenced_variables().iter().map(String::as_str).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(ConditionExpression::parse("true").unwrap().referenced_variables().is_empty());
    }

    #[test]
    fn non_boolean_result_is_an_error() {
        let c = ConditionExpression::parse("${x + 1}").unwrap();
        let vars = VariableMap::new().put("x", TypedValue::integer(1));
        assert_eq!(c.evaluate(&vars).unwrap_err(), ExpressionError::NotBoolean("2".into()));
    }

    #[test]
    fn parse_failures_map_to_invalid_condition() {
        let err = parse_condition("${x ==").unwrap_err();
        assert!(matches!(err, VariableError::InvalidConditionExpression { ref expression, .. } if expression == "${x =="));
    }

    #[test]
    fn serde_uses_source_text() {
        let c = ConditionExpression::parse("x == 1").unwrap();
        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(json, "\"x == 1\"");
        let back: ConditionExpression = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
        assert!(serde_json::from_str::<ConditionExpression>("\"x ==\"").is_err());
    }
}
