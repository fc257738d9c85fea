//! Reactive computed fields.
//!
//! A primitive whose schema carries `x-formula` is computed from other
//! nodes. [`FormulaCollector`] finds such fields and resolves the nodes
//! they read, [`DependencyGraph`] orders them, [`FormulaEvaluator`] runs
//! one field through the external [`ExpressionEvaluator`], and
//! [`FormulaEngine`] ties it together with change subscriptions.

mod collector;
mod context;
mod engine;
mod evaluator;
mod field;
mod graph;
mod warning;

pub use collector::FormulaCollector;
pub use context::{
    ArrayContext, ArrayLevel, EvaluationError, EvaluationErrorKind, ExpressionEvaluator, FormulaContext,
    FormulaValue, ParsedExpression,
};
pub use engine::{EngineState, FormulaEngine, FormulaEngineOptions};
pub use evaluator::{FormulaErrorCallback, FormulaEvaluator};
pub use field::{ArrayLevelRef, FormulaField};
pub use graph::{affected_formulas, build_dependency_map, build_evaluation_order, DependencyGraph, DependencyMap};
pub use warning::{FormulaWarning, FormulaWarningType};
