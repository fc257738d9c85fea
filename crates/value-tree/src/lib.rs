//! value-tree — schema-typed mutable documents with change tracking and
//! reactive formulas.
//!
//! A document is a tree of object, array and primitive nodes built from a
//! JSON-Schema-like [`SchemaDefinition`]. Every node remembers its committed
//! baseline, so a tree can report whether it is dirty, be committed, or be
//! reverted. The [`ValueTree`] façade records edits as [`Change`]s that
//! render to RFC 6902 JSON Patch, and can drive a [`FormulaEngine`] that
//! keeps `x-formula` fields up to date.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use serde_json::json;
//! use value_tree::{NodeFactory, NodeStore, SchemaDefinition};
//!
//! let schema = Arc::new(SchemaDefinition::object([
//!     ("sku", SchemaDefinition::string()),
//!     ("qty", SchemaDefinition::number().with_default(1)),
//! ]));
//! let mut store = NodeStore::new();
//! let root = NodeFactory::shared()
//!     .create_tree(&mut store, &schema, Some(&json!({"sku": "A-1"})))
//!     .unwrap();
//!
//! assert_eq!(store.plain_value(&root), json!({"sku": "A-1", "qty": 1}));
//! assert!(!store.is_dirty(&root));
//! ```
//!
//! Crate layout:
//!
//! - [`node`], [`store`]: the node arena and its edit, dirty-tracking and
//!   traversal operations
//! - [`factory`]: schema-driven node construction
//! - [`index`]: id lookup and path cache
//! - [`change`]: change log and JSON Patch rendering
//! - [`registry`]: default value, serializer and change handler rules
//! - [`formula`]: computed fields
//! - [`tree`]: the [`ValueTree`] façade

pub mod change;
pub mod error;
pub mod factory;
pub mod formula;
pub mod index;
pub mod node;
pub mod registry;
pub mod schema;
pub mod store;
pub mod tree;
pub mod validation;
pub mod value;
pub mod watch;

pub use change::{to_json_patch, Change, ChangeTracker, JsonPatch, PatchOp};
pub use error::{Result, TreeError};
pub use factory::{BuildFn, BuildRequest, NodeFactory};
pub use formula::{
    EvaluationError, EvaluationErrorKind, ExpressionEvaluator, FormulaContext, FormulaEngine,
    FormulaEngineOptions, FormulaValue, FormulaWarning, FormulaWarningType, ParsedExpression,
};
pub use index::TreeIndex;
pub use node::{next_node_id, reset_node_ids, IdGenerator, NodeId, NodeKind, ValueNode};
pub use registry::{ChangeHandlerRegistry, DefaultValueRegistry, SerializerRegistry};
pub use schema::{AdditionalProperties, FormulaDefinition, SchemaDefinition};
pub use store::{NodeStore, WriteMode};
pub use tree::ValueTree;
pub use validation::{Diagnostic, Severity};
pub use value::{PrimitiveKind, PrimitiveValue};
pub use watch::{NodeEvent, Subscription, WatchKind, Watchers};

pub use value_path::{parse_simple_path, Path, PathError, PathSegment};
