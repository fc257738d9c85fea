//! Runs one formula and writes its result back.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{trace, warn};

use super::context::{
    ArrayContext, ArrayLevel, EvaluationError, ExpressionEvaluator, FormulaContext, FormulaValue,
};
use super::field::FormulaField;
use super::warning::{FormulaWarning, FormulaWarningType};
use crate::error::{Result, TreeError};
use crate::node::NodeId;
use crate::store::NodeStore;
use crate::value::{Coerced, PrimitiveValue};

/// Called with the field's node whenever its expression fails.
pub type FormulaErrorCallback = Arc<dyn Fn(&NodeId, &EvaluationError) + Send + Sync>;

#[derive(Clone)]
pub struct FormulaEvaluator {
    expressions: Arc<dyn ExpressionEvaluator>,
    on_error: Option<FormulaErrorCallback>,
}

impl fmt::Debug for FormulaEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormulaEvaluator")
            .field("on_error", &self.on_error.is_some())
            .finish_non_exhaustive()
    }
}

impl FormulaEvaluator {
    pub fn new(expressions: Arc<dyn ExpressionEvaluator>) -> Self {
        Self {
            expressions,
            on_error: None,
        }
    }

    pub fn with_error_callback(mut self, on_error: Option<FormulaErrorCallback>) -> Self {
        self.on_error = on_error;
        self
    }

    pub fn expressions(&self) -> &dyn ExpressionEvaluator {
        self.expressions.as_ref()
    }

    /// What `field`'s expression gets to read.
    pub fn build_context(&self, store: &NodeStore, root: &NodeId, field: &FormulaField) -> FormulaContext {
        let levels: Vec<ArrayLevel> = field
            .array_levels
            .iter()
            .rev()
            .filter_map(|level| {
                let items = store.node(&level.array)?.as_array()?.items();
                let sibling = |offset: Option<usize>| {
                    offset
                        .and_then(|i| items.get(i))
                        .map(|id| store.plain_value(id))
                        .unwrap_or(Value::Null)
                };
                Some(ArrayLevel {
                    index: level.index,
                    length: items.len(),
                    prev: sibling(level.index.checked_sub(1)),
                    next: sibling(level.index.checked_add(1)),
                })
            })
            .collect();

        FormulaContext {
            root_data: store.plain_value(root),
            item_data: field.parent.as_ref().map(|parent| store.plain_value(parent)),
            array_context: (!levels.is_empty()).then_some(ArrayContext { levels }),
            current_path: store.path_of(&field.node),
        }
    }

    /// Evaluate `field` and store the outcome on its node.
    ///
    /// Expression failures never propagate: the node falls back to its
    /// default and carries a warning. The only error is a field whose node
    /// is gone. With `rebase`, the written value also becomes the node's
    /// baseline.
    pub fn evaluate(&self, store: &mut NodeStore, root: &NodeId, field: &FormulaField, rebase: bool) -> Result<()> {
        let node = &field.node;
        let kind = store
            .require(node)?
            .as_primitive()
            .map(|p| p.kind())
            .ok_or_else(|| TreeError::NotPrimitive(node.to_string()))?;
        let context = self.build_context(store, root, field);
        let outcome = self.expressions.evaluate_with_context(&field.expression, &context);
        trace!(node = %node, expression = %field.expression, ?outcome, "evaluated formula");

        let warning = match outcome {
            Ok(result) if result.is_nullish() => {
                store.reset_to_default(node)?;
                None
            }
            Ok(FormulaValue::Number(n)) if n.is_nan() => {
                store.reset_to_default(node)?;
                Some(self.warning(FormulaWarningType::Nan, "result is not a number", field))
            }
            Ok(FormulaValue::Number(n)) if n.is_infinite() => {
                store.reset_to_default(node)?;
                Some(self.warning(FormulaWarningType::Infinity, "result is infinite", field))
            }
            Ok(result) => {
                let coerced = match &result {
                    FormulaValue::Number(n) => PrimitiveValue::coerce_number(kind, *n),
                    other => PrimitiveValue::coerce(kind, &other.to_json()),
                };
                match coerced {
                    Some(Coerced::Exact(value)) => {
                        store.write_primitive(node, value)?;
                        None
                    }
                    Some(Coerced::Converted(value)) => {
                        store.write_primitive(node, value)?;
                        Some(self.warning(
                            FormulaWarningType::TypeCoercion,
                            format!("result converted to {}", kind.as_str()),
                            field,
                        ))
                    }
                    None => {
                        store.reset_to_default(node)?;
                        Some(self.warning(
                            FormulaWarningType::TypeCoercion,
                            format!("result `{}` cannot be stored as {}", result.to_json(), kind.as_str()),
                            field,
                        ))
                    }
                }
            }
            Err(error) => {
                warn!(node = %node, expression = %field.expression, %error, "formula evaluation failed");
                store.reset_to_default(node)?;
                if let Some(on_error) = &self.on_error {
                    on_error(node, &error);
                }
                Some(FormulaWarning::from_error(&error, field.expression.clone()))
            }
        };

        store.set_formula_warning(node, warning);
        if rebase {
            store.rebase(node);
        }
        Ok(())
    }

    fn warning(&self, warning_type: FormulaWarningType, message: impl Into<String>, field: &FormulaField) -> FormulaWarning {
        FormulaWarning::new(warning_type, message, field.expression.clone())
    }
}
