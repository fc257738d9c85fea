//! The contract with the external expression language.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use value_path::Path;

use crate::value::number_to_json;

/// Result of evaluating an expression.
///
/// Numbers stay `f64` so that NaN and infinities, which have no JSON form,
/// can be reported.
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaValue {
    Undefined,
    Number(f64),
    Json(Value),
}

impl FormulaValue {
    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Json(Value::Null))
    }

    /// JSON rendering; NaN, infinities and `Undefined` become `null`.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Undefined => Value::Null,
            Self::Number(n) => number_to_json(*n),
            Self::Json(value) => value.clone(),
        }
    }
}

impl From<f64> for FormulaValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<Value> for FormulaValue {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<bool> for FormulaValue {
    fn from(b: bool) -> Self {
        Self::Json(Value::Bool(b))
    }
}

impl From<&str> for FormulaValue {
    fn from(s: &str) -> Self {
        Self::Json(Value::String(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvaluationErrorKind {
    Syntax,
    DivisionByZero,
    NullReference,
    Runtime,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct EvaluationError {
    pub kind: EvaluationErrorKind,
    pub message: String,
}

impl EvaluationError {
    pub fn new(kind: EvaluationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn syntax(message: impl Into<String>) -> Self {
        Self::new(EvaluationErrorKind::Syntax, message)
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(EvaluationErrorKind::Runtime, message)
    }

    pub fn division_by_zero(message: impl Into<String>) -> Self {
        Self::new(EvaluationErrorKind::DivisionByZero, message)
    }

    pub fn null_reference(message: impl Into<String>) -> Self {
        Self::new(EvaluationErrorKind::NullReference, message)
    }
}

/// References an expression reads, as written (`price`, `../rate`,
/// `/config.tax`, `items[*].amount`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedExpression {
    pub dependencies: Vec<String>,
}

/// Position of a field inside one enclosing array.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArrayLevel {
    pub index: usize,
    pub length: usize,
    /// Plain value of the previous item, `null` for the first.
    pub prev: Value,
    /// Plain value of the next item, `null` for the last.
    pub next: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ArrayContext {
    /// Innermost array first.
    pub levels: Vec<ArrayLevel>,
}

/// Everything an expression may read.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormulaContext {
    pub root_data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub array_context: Option<ArrayContext>,
    /// Path of the field being computed.
    pub current_path: Path,
}

/// The expression language the engine delegates to.
pub trait ExpressionEvaluator {
    /// Extract the references `expression` reads.
    fn parse_expression(&self, expression: &str) -> Result<ParsedExpression, EvaluationError>;

    fn evaluate_with_context(
        &self,
        expression: &str,
        context: &FormulaContext,
    ) -> Result<FormulaValue, EvaluationError>;
}
