use thiserror::Error;
use value_path::PathError;

use crate::node::NodeId;

/// Caller-misuse errors.
///
/// Data problems (failing formulas, schema rule violations) never surface
/// here; they are recorded on the nodes as warnings and diagnostics.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TreeError {
    #[error("unknown schema type `{0}`")]
    UnknownSchemaType(String),
    #[error("array `{0}` has no node factory attached")]
    MissingFactory(NodeId),
    #[error("array `{0}` has no items schema")]
    MissingItemsSchema(NodeId),
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: usize, len: usize },
    #[error("node `{0}` is read-only")]
    ReadOnly(NodeId),
    #[error("path not found: `{0}`")]
    PathNotFound(String),
    #[error("node at `{0}` is not a primitive")]
    NotPrimitive(String),
    #[error("node `{0}` is not an array")]
    NotAnArray(NodeId),
    #[error("node `{0}` is not an object")]
    NotAnObject(NodeId),
    #[error("property `{0}` already exists")]
    PropertyExists(String),
    #[error("property `{0}` not found")]
    PropertyNotFound(String),
    #[error("no schema for property `{0}`")]
    MissingPropertySchema(String),
    #[error("node id `{0}` is already in use")]
    DuplicateNodeId(NodeId),
    #[error("node `{0}` not found")]
    NodeNotFound(NodeId),
    #[error("cannot attach node `{0}` beneath itself")]
    CyclicAttach(NodeId),
    #[error("cannot store {found} in a {expected} node")]
    TypeMismatch {
        expected: &'static str,
        found: String,
    },
    #[error("a formula engine is already attached")]
    EngineAlreadyAttached,
    #[error(transparent)]
    InvalidPath(#[from] PathError),
}

impl TreeError {
    /// Whether the error means "the thing asked for does not exist".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::PathNotFound(_) | Self::PropertyNotFound(_) | Self::NodeNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, TreeError>;
