//! Scalar values held by primitive nodes.

use serde_json::Value;

use crate::schema::{TYPE_BOOLEAN, TYPE_NUMBER, TYPE_STRING};

/// The three primitive node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    String,
    Number,
    Boolean,
}

impl PrimitiveKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => TYPE_STRING,
            Self::Number => TYPE_NUMBER,
            Self::Boolean => TYPE_BOOLEAN,
        }
    }

    pub fn from_schema_type(type_: &str) -> Option<Self> {
        match type_ {
            TYPE_STRING => Some(Self::String),
            TYPE_NUMBER => Some(Self::Number),
            TYPE_BOOLEAN => Some(Self::Boolean),
            _ => None,
        }
    }

    /// `""`, `0` or `false`.
    pub fn zero(self) -> PrimitiveValue {
        match self {
            Self::String => PrimitiveValue::String(String::new()),
            Self::Number => PrimitiveValue::Number(0.0),
            Self::Boolean => PrimitiveValue::Boolean(false),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveValue {
    String(String),
    Number(f64),
    Boolean(bool),
}

/// Outcome of fitting a JSON value into a primitive kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Coerced {
    /// The value already had the right kind.
    Exact(PrimitiveValue),
    /// The value was converted from another kind.
    Converted(PrimitiveValue),
}

impl Coerced {
    pub fn into_value(self) -> PrimitiveValue {
        match self {
            Self::Exact(value) | Self::Converted(value) => value,
        }
    }

    pub fn is_converted(&self) -> bool {
        matches!(self, Self::Converted(_))
    }
}

impl PrimitiveValue {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            Self::String(_) => PrimitiveKind::String,
            Self::Number(_) => PrimitiveKind::Number,
            Self::Boolean(_) => PrimitiveKind::Boolean,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::String(s) => Value::String(s.clone()),
            Self::Number(n) => number_to_json(*n),
            Self::Boolean(b) => Value::Bool(*b),
        }
    }

    /// Fit `value` into `kind`.
    ///
    /// Same-kind values pass through. Numbers and booleans render into
    /// strings, numeric strings and booleans convert into numbers, and
    /// `"true"`/`"false"` or numbers convert into booleans. `null`, arrays,
    /// objects and non-finite numbers do not fit.
    ///
    /// ```
    /// use serde_json::json;
    /// use value_tree::value::{Coerced, PrimitiveKind, PrimitiveValue};
    ///
    /// assert_eq!(
    ///     PrimitiveValue::coerce(PrimitiveKind::Number, &json!("42")),
    ///     Some(Coerced::Converted(PrimitiveValue::Number(42.0)))
    /// );
    /// assert_eq!(PrimitiveValue::coerce(PrimitiveKind::Number, &json!([1])), None);
    /// ```
    pub fn coerce(kind: PrimitiveKind, value: &Value) -> Option<Coerced> {
        match (kind, value) {
            (PrimitiveKind::String, Value::String(s)) => {
                Some(Coerced::Exact(Self::String(s.clone())))
            }
            (PrimitiveKind::String, Value::Number(_)) | (PrimitiveKind::String, Value::Bool(_)) => {
                Some(Coerced::Converted(Self::String(value.to_string())))
            }
            (PrimitiveKind::Number, Value::Number(n)) => n
                .as_f64()
                .filter(|n| n.is_finite())
                .map(|n| Coerced::Exact(Self::Number(n))),
            (PrimitiveKind::Number, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(|n| Coerced::Converted(Self::Number(n))),
            (PrimitiveKind::Number, Value::Bool(b)) => {
                Some(Coerced::Converted(Self::Number(if *b { 1.0 } else { 0.0 })))
            }
            (PrimitiveKind::Boolean, Value::Bool(b)) => Some(Coerced::Exact(Self::Boolean(*b))),
            (PrimitiveKind::Boolean, Value::String(s)) => match s.as_str() {
                "true" => Some(Coerced::Converted(Self::Boolean(true))),
                "false" => Some(Coerced::Converted(Self::Boolean(false))),
                _ => None,
            },
            (PrimitiveKind::Boolean, Value::Number(n)) => n
                .as_f64()
                .map(|n| Coerced::Converted(Self::Boolean(n != 0.0))),
            _ => None,
        }
    }

    /// Like [`PrimitiveValue::coerce`] for finite `f64` results.
    pub fn coerce_number(kind: PrimitiveKind, n: f64) -> Option<Coerced> {
        if !n.is_finite() {
            return None;
        }
        Self::coerce(kind, &number_to_json(n))
    }
}

/// Render an `f64` as a JSON number, using an integer representation when
/// the value is integral so that `5.0` compares equal to `json!(5)`.
///
/// Non-finite values have no JSON form and become `null`.
pub fn number_to_json(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        return Value::from(n as i64);
    }
    serde_json::Number::from_f64(n)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Short type name of a JSON value, for error messages.
pub(crate) fn json_type_name(value: &Value) -> String {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
    .to_string()
}
