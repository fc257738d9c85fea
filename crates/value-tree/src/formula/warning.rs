use serde::{Deserialize, Serialize};

use super::context::{EvaluationError, EvaluationErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FormulaWarningType {
    Nan,
    Infinity,
    TypeCoercion,
    DivisionByZero,
    NullReference,
    RuntimeError,
}

impl FormulaWarningType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nan => "nan",
            Self::Infinity => "infinity",
            Self::TypeCoercion => "type-coercion",
            Self::DivisionByZero => "division-by-zero",
            Self::NullReference => "null-reference",
            Self::RuntimeError => "runtime-error",
        }
    }
}

impl From<EvaluationErrorKind> for FormulaWarningType {
    fn from(kind: EvaluationErrorKind) -> Self {
        match kind {
            EvaluationErrorKind::DivisionByZero => Self::DivisionByZero,
            EvaluationErrorKind::NullReference => Self::NullReference,
            EvaluationErrorKind::Syntax | EvaluationErrorKind::Runtime => Self::RuntimeError,
        }
    }
}

/// Why a formula field currently holds its default instead of a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaWarning {
    #[serde(rename = "type")]
    pub warning_type: FormulaWarningType,
    pub message: String,
    pub expression: String,
}

impl FormulaWarning {
    pub fn new(
        warning_type: FormulaWarningType,
        message: impl Into<String>,
        expression: impl Into<String>,
    ) -> Self {
        Self {
            warning_type,
            message: message.into(),
            expression: expression.into(),
        }
    }

    pub fn from_error(error: &EvaluationError, expression: impl Into<String>) -> Self {
        Self::new(error.kind.into(), error.message.clone(), expression)
    }
}
