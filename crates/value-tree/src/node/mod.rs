//! Value node types.
//!
//! Nodes live in a [`NodeStore`](crate::store::NodeStore) keyed by
//! [`NodeId`]. Containers refer to their members by id and every node keeps
//! the id of its parent, so the parent link is a plain relation and never an
//! owning edge.
//!
//! | Kind        | Holds                                   | Dirty when                          |
//! |-------------|-----------------------------------------|-------------------------------------|
//! | `Object`    | name -> child id, insertion ordered     | membership changed or a child dirty |
//! | `Array`     | ordered item ids, optional factory      | length/order changed or item dirty  |
//! | `Primitive` | string/number/boolean value + baseline  | value differs from baseline         |

mod array;
mod object;
mod primitive;

pub use array::ArrayNode;
pub use object::ObjectNode;
pub use primitive::PrimitiveNode;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::schema::SchemaDefinition;
use crate::value::PrimitiveValue;

// ── NodeId ────────────────────────────────────────────────────────────────

/// Process-unique node identity (`node-N` when generated).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(Arc<str>);

impl NodeId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

// ── IdGenerator ───────────────────────────────────────────────────────────

static GLOBAL_NODE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Monotonic `node-N` id source.
///
/// The default generator shares one process-wide counter. Tests that need
/// reproducible ids use [`IdGenerator::isolated`], which owns its counter.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    local: Option<Arc<AtomicU64>>,
}

impl IdGenerator {
    /// The process-wide generator.
    pub fn global() -> Self {
        Self { local: None }
    }

    /// A generator with its own counter, starting at `node-1`.
    pub fn isolated() -> Self {
        Self {
            local: Some(Arc::new(AtomicU64::new(0))),
        }
    }

    fn counter(&self) -> &AtomicU64 {
        match &self.local {
            Some(counter) => counter,
            None => &GLOBAL_NODE_COUNTER,
        }
    }

    pub fn next_id(&self) -> NodeId {
        let n = self.counter().fetch_add(1, Ordering::Relaxed) + 1;
        NodeId::from(format!("node-{n}"))
    }

    /// Restart numbering at `node-1`.
    pub fn reset(&self) {
        self.counter().store(0, Ordering::Relaxed);
    }
}

/// Next id from the process-wide generator.
pub fn next_node_id() -> NodeId {
    IdGenerator::global().next_id()
}

/// Restart the process-wide generator. Only safe while no other thread is
/// building trees.
pub fn reset_node_ids() {
    IdGenerator::global().reset();
}

// ── ValueNode ─────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum NodeKind {
    Object(ObjectNode),
    Array(ArrayNode),
    Primitive(PrimitiveNode),
}

/// One node of the tree.
#[derive(Debug)]
pub struct ValueNode {
    pub(crate) id: NodeId,
    pub(crate) name: String,
    pub(crate) schema: Arc<SchemaDefinition>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) kind: NodeKind,
}

impl ValueNode {
    pub fn object(id: NodeId, name: impl Into<String>, schema: Arc<SchemaDefinition>) -> Self {
        Self {
            id,
            name: name.into(),
            schema,
            parent: None,
            kind: NodeKind::Object(ObjectNode::default()),
        }
    }

    pub fn array(id: NodeId, name: impl Into<String>, schema: Arc<SchemaDefinition>) -> Self {
        Self {
            id,
            name: name.into(),
            schema,
            parent: None,
            kind: NodeKind::Array(ArrayNode::default()),
        }
    }

    /// A primitive node; its formula comes from the schema's `x-formula`.
    pub fn primitive(
        id: NodeId,
        name: impl Into<String>,
        schema: Arc<SchemaDefinition>,
        value: PrimitiveValue,
    ) -> Self {
        let formula = schema.formula.clone();
        Self {
            id,
            name: name.into(),
            schema,
            parent: None,
            kind: NodeKind::Primitive(PrimitiveNode::new(value, formula)),
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// Property name, array index at creation, or `""` for the root.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Arc<SchemaDefinition> {
        &self.schema
    }

    pub fn parent(&self) -> Option<&NodeId> {
        self.parent.as_ref()
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn is_object(&self) -> bool {
        matches!(self.kind, NodeKind::Object(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, NodeKind::Array(_))
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self.kind, NodeKind::Primitive(_))
    }

    pub fn as_object(&self) -> Option<&ObjectNode> {
        match &self.kind {
            NodeKind::Object(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayNode> {
        match &self.kind {
            NodeKind::Array(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_primitive(&self) -> Option<&PrimitiveNode> {
        match &self.kind {
            NodeKind::Primitive(node) => Some(node),
            _ => None,
        }
    }

    pub(crate) fn as_object_mut(&mut self) -> Option<&mut ObjectNode> {
        match &mut self.kind {
            NodeKind::Object(node) => Some(node),
            _ => None,
        }
    }

    pub(crate) fn as_array_mut(&mut self) -> Option<&mut ArrayNode> {
        match &mut self.kind {
            NodeKind::Array(node) => Some(node),
            _ => None,
        }
    }

    pub(crate) fn as_primitive_mut(&mut self) -> Option<&mut PrimitiveNode> {
        match &mut self.kind {
            NodeKind::Primitive(node) => Some(node),
            _ => None,
        }
    }

    /// Schema `readOnly`, or any formula-backed primitive.
    pub fn is_read_only(&self) -> bool {
        self.schema.read_only || self.as_primitive().is_some_and(PrimitiveNode::has_formula)
    }

    /// Member ids in order (empty for primitives).
    pub fn child_ids(&self) -> Vec<NodeId> {
        match &self.kind {
            NodeKind::Object(node) => node.children().map(|(_, id)| id.clone()).collect(),
            NodeKind::Array(node) => node.items().to_vec(),
            NodeKind::Primitive(_) => Vec::new(),
        }
    }
}
