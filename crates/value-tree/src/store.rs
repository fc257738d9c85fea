//! Arena of value nodes.
//!
//! Every node of every tree built against a store lives in one map keyed by
//! [`NodeId`]. Containers hold member ids and members hold their parent's
//! id. Detached nodes stay in the arena until pruned so that `revert` can
//! bring removed members back.
//!
//! The structural operations here are the raw node-level API. They keep
//! parent links and change notifications consistent but know nothing about
//! path caches or change logs; [`ValueTree`](crate::ValueTree) layers those
//! on top.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;
use value_path::{Path, PathSegment};

use crate::error::{Result, TreeError};
use crate::formula::FormulaWarning;
use crate::node::{ArrayNode, NodeId, NodeKind, ObjectNode, ValueNode};
use crate::registry::DefaultValueRegistry;
use crate::schema::SchemaDefinition;
use crate::validation::{self, Diagnostic, Severity};
use crate::value::{json_type_name, Coerced, PrimitiveKind, PrimitiveValue};
use crate::watch::{NodeEvent, Watchers};

/// Who is writing a primitive value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// A caller edit; rejected on read-only nodes.
    External,
    /// A formula result; bypasses read-only checks.
    Internal,
}

#[derive(Debug, Default)]
pub struct NodeStore {
    nodes: HashMap<NodeId, ValueNode>,
    watchers: Watchers,
    defaults: Option<Arc<DefaultValueRegistry>>,
}

impl NodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve primitive resets through `defaults` instead of the bare
    /// schema default.
    pub fn with_defaults(mut self, defaults: Arc<DefaultValueRegistry>) -> Self {
        self.defaults = Some(defaults);
        self
    }

    pub fn watchers(&self) -> &Watchers {
        &self.watchers
    }

    // ------------------------------------------------------------------
    // Node access

    pub fn insert(&mut self, node: ValueNode) -> Result<()> {
        if self.nodes.contains_key(&node.id) {
            return Err(TreeError::DuplicateNodeId(node.id.clone()));
        }
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    pub fn node(&self, id: &NodeId) -> Option<&ValueNode> {
        self.nodes.get(id)
    }

    pub fn require(&self, id: &NodeId) -> Result<&ValueNode> {
        self.nodes
            .get(id)
            .ok_or_else(|| TreeError::NodeNotFound(id.clone()))
    }

    fn require_mut(&mut self, id: &NodeId) -> Result<&mut ValueNode> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| TreeError::NodeNotFound(id.clone()))
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // ------------------------------------------------------------------
    // Traversal

    /// `id` and everything beneath it, depth-first pre-order.
    pub fn subtree(&self, id: &NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id.clone()];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(&current) else {
                continue;
            };
            let children = node.child_ids();
            stack.extend(children.into_iter().rev());
            out.push(current);
        }
        out
    }

    /// Whether `ancestor` is `id` or lies above it.
    pub fn is_ancestor_or_self(&self, ancestor: &NodeId, id: &NodeId) -> bool {
        let mut current = Some(id.clone());
        while let Some(node_id) = current {
            if &node_id == ancestor {
                return true;
            }
            current = self.nodes.get(&node_id).and_then(|n| n.parent.clone());
        }
        false
    }

    pub fn has_array_ancestor(&self, id: &NodeId) -> bool {
        let mut current = self.nodes.get(id).and_then(|n| n.parent.clone());
        while let Some(parent_id) = current {
            let Some(parent) = self.nodes.get(&parent_id) else {
                return false;
            };
            if parent.is_array() {
                return true;
            }
            current = parent.parent.clone();
        }
        false
    }

    /// Topmost ancestor of `id` (itself when detached).
    pub fn top_of(&self, id: &NodeId) -> NodeId {
        let mut current = id.clone();
        while let Some(parent) = self.nodes.get(&current).and_then(|n| n.parent.clone()) {
            current = parent;
        }
        current
    }

    /// Path from the topmost ancestor down to `id`, recomputed from the
    /// parents' current membership.
    pub fn path_of(&self, id: &NodeId) -> Path {
        let mut segments = Vec::new();
        let mut current = id.clone();
        while let Some(parent_id) = self.nodes.get(&current).and_then(|n| n.parent.clone()) {
            let Some(parent) = self.nodes.get(&parent_id) else {
                break;
            };
            match &parent.kind {
                NodeKind::Object(object) => {
                    if let Some(name) = object.name_of(&current) {
                        segments.push(PathSegment::Property(name.to_string()));
                    }
                }
                NodeKind::Array(array) => {
                    if let Some(index) = array.position_of(&current) {
                        segments.push(PathSegment::Index(index));
                    }
                }
                NodeKind::Primitive(_) => {}
            }
            current = parent_id;
        }
        segments.reverse();
        Path::from_segments(segments)
    }

    /// Follow `path` from `from`. Wildcards and kind mismatches resolve to
    /// nothing.
    pub fn resolve(&self, from: &NodeId, path: &Path) -> Option<NodeId> {
        let mut current = from.clone();
        for segment in path {
            let node = self.nodes.get(&current)?;
            current = match (segment, &node.kind) {
                (PathSegment::Property(name), NodeKind::Object(object)) => {
                    object.child(name)?.clone()
                }
                (PathSegment::Index(index), NodeKind::Array(array)) => {
                    array.items().get(*index)?.clone()
                }
                _ => return None,
            };
        }
        Some(current)
    }

    /// Plain JSON rendering of `id`'s subtree.
    pub fn plain_value(&self, id: &NodeId) -> Value {
        let Some(node) = self.nodes.get(id) else {
            return Value::Null;
        };
        match &node.kind {
            NodeKind::Object(object) => Value::Object(
                object
                    .children()
                    .map(|(name, child)| (name.to_string(), self.plain_value(child)))
                    .collect::<Map<String, Value>>(),
            ),
            NodeKind::Array(array) => {
                Value::Array(array.items().iter().map(|item| self.plain_value(item)).collect())
            }
            NodeKind::Primitive(primitive) => primitive.value().to_json(),
        }
    }

    // ------------------------------------------------------------------
    // Primitive writes

    /// Write a JSON value into a primitive node.
    ///
    /// `null` resets the node to its schema default. Other values are
    /// coerced into the node's kind; values that do not fit are rejected.
    /// Returns whether the stored value changed.
    pub fn set_value(&mut self, id: &NodeId, value: &Value, mode: WriteMode) -> Result<bool> {
        let node = self.require(id)?;
        let NodeKind::Primitive(primitive) = &node.kind else {
            return Err(TreeError::NotPrimitive(id.to_string()));
        };
        if mode == WriteMode::External && node.is_read_only() {
            return Err(TreeError::ReadOnly(id.clone()));
        }
        let kind = primitive.kind();
        if value.is_null() {
            return self.reset_to_default(id);
        }
        let coerced = PrimitiveValue::coerce(kind, value).ok_or_else(|| TreeError::TypeMismatch {
            expected: kind.as_str(),
            found: json_type_name(value),
        })?;
        self.write_primitive(id, coerced.into_value())
    }

    /// Store `value` as-is, bypassing read-only checks.
    pub(crate) fn write_primitive(&mut self, id: &NodeId, value: PrimitiveValue) -> Result<bool> {
        let node = self.require_mut(id)?;
        let primitive = node
            .as_primitive_mut()
            .ok_or_else(|| TreeError::NotPrimitive(id.to_string()))?;
        let changed = primitive.set(value);
        if changed {
            self.watchers.emit(NodeEvent::ValueChanged(id.clone()));
        }
        Ok(changed)
    }

    /// Default of a primitive node, coerced into its kind. Uses the
    /// default registry when one is set, else the schema default.
    pub fn default_of(&self, id: &NodeId) -> Result<PrimitiveValue> {
        let node = self.require(id)?;
        let kind = node
            .as_primitive()
            .map(|p| p.kind())
            .ok_or_else(|| TreeError::NotPrimitive(id.to_string()))?;
        Ok(match &self.defaults {
            Some(defaults) => PrimitiveValue::coerce(kind, &defaults.default_for(&node.schema))
                .map(Coerced::into_value)
                .unwrap_or_else(|| kind.zero()),
            None => default_primitive(&node.schema, kind),
        })
    }

    pub(crate) fn reset_to_default(&mut self, id: &NodeId) -> Result<bool> {
        let default = self.default_of(id)?;
        self.write_primitive(id, default)
    }

    pub(crate) fn rebase(&mut self, id: &NodeId) {
        if let Some(primitive) = self.nodes.get_mut(id).and_then(ValueNode::as_primitive_mut) {
            primitive.rebase();
        }
    }

    pub(crate) fn set_formula_warning(&mut self, id: &NodeId, warning: Option<FormulaWarning>) {
        if let Some(primitive) = self.nodes.get_mut(id).and_then(ValueNode::as_primitive_mut) {
            primitive.set_formula_warning(warning);
        }
    }

    // ------------------------------------------------------------------
    // Membership

    /// Point `child` at `parent`, first removing it from any previous
    /// container.
    fn adopt(&mut self, parent: &NodeId, child: &NodeId) -> Result<()> {
        self.require(child)?;
        if self.is_ancestor_or_self(child, parent) {
            return Err(TreeError::CyclicAttach(child.clone()));
        }
        self.release(child);
        self.require_mut(child)?.parent = Some(parent.clone());
        Ok(())
    }

    /// Remove `child` from its current container, if any.
    fn release(&mut self, child: &NodeId) {
        let Some(old_parent) = self.nodes.get_mut(child).and_then(|n| n.parent.take()) else {
            return;
        };
        let Some(parent) = self.nodes.get_mut(&old_parent) else {
            return;
        };
        match &mut parent.kind {
            NodeKind::Object(object) => {
                object.remove_id(child);
            }
            NodeKind::Array(array) => {
                let before = array.len();
                array.items_mut().retain(|item| item != child);
                if array.len() != before {
                    self.watchers.emit(NodeEvent::LengthChanged(old_parent));
                }
            }
            NodeKind::Primitive(_) => {}
        }
    }

    fn clear_parent_if(&mut self, child: &NodeId, parent: &NodeId) {
        if let Some(node) = self.nodes.get_mut(child) {
            if node.parent.as_ref() == Some(parent) {
                node.parent = None;
            }
        }
    }

    fn require_array(&self, id: &NodeId) -> Result<&ArrayNode> {
        self.require(id)?
            .as_array()
            .ok_or_else(|| TreeError::NotAnArray(id.clone()))
    }

    fn array_mut(&mut self, id: &NodeId) -> Result<&mut ArrayNode> {
        self.require_mut(id)?
            .as_array_mut()
            .ok_or_else(|| TreeError::NotAnArray(id.clone()))
    }

    fn object_mut(&mut self, id: &NodeId) -> Result<&mut ObjectNode> {
        self.require_mut(id)?
            .as_object_mut()
            .ok_or_else(|| TreeError::NotAnObject(id.clone()))
    }

    // ------------------------------------------------------------------
    // Object operations

    pub fn object_add_child(&mut self, object: &NodeId, name: &str, child: &NodeId) -> Result<()> {
        let target = self
            .require(object)?
            .as_object()
            .ok_or_else(|| TreeError::NotAnObject(object.clone()))?;
        if target.has_child(name) {
            return Err(TreeError::PropertyExists(name.to_string()));
        }
        self.adopt(object, child)?;
        self.object_mut(object)?.insert(name.to_string(), child.clone());
        Ok(())
    }

    /// Detach the member `name`; returns its id.
    pub fn object_remove_child(&mut self, object: &NodeId, name: &str) -> Result<NodeId> {
        let removed = self
            .object_mut(object)?
            .remove(name)
            .ok_or_else(|| TreeError::PropertyNotFound(name.to_string()))?;
        self.clear_parent_if(&removed, object);
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Array operations

    pub fn array_push(&mut self, array: &NodeId, item: &NodeId) -> Result<()> {
        let len = self.require_array(array)?.len();
        self.array_insert_at(array, len, item)
    }

    /// Insert `item` at `index`, where `index <= len`.
    pub fn array_insert_at(&mut self, array: &NodeId, index: usize, item: &NodeId) -> Result<()> {
        let len = self.require_array(array)?.len();
        if index > len {
            return Err(TreeError::IndexOutOfBounds { index, len });
        }
        self.adopt(array, item)?;
        // Adopting may have pulled the item out of this same array.
        let items = self.array_mut(array)?.items_mut();
        let index = index.min(items.len());
        items.insert(index, item.clone());
        self.watchers.emit(NodeEvent::LengthChanged(array.clone()));
        Ok(())
    }

    /// Detach the item at `index`; returns its id.
    pub fn array_remove_at(&mut self, array: &NodeId, index: usize) -> Result<NodeId> {
        let items = self.array_mut(array)?.items_mut();
        let len = items.len();
        if index >= len {
            return Err(TreeError::IndexOutOfBounds { index, len });
        }
        let removed = items.remove(index);
        self.clear_parent_if(&removed, array);
        self.watchers.emit(NodeEvent::LengthChanged(array.clone()));
        Ok(removed)
    }

    /// Move the item at `from` so that it ends up at `to`.
    pub fn array_move(&mut self, array: &NodeId, from: usize, to: usize) -> Result<()> {
        let items = self.array_mut(array)?.items_mut();
        let len = items.len();
        if from >= len {
            return Err(TreeError::IndexOutOfBounds { index: from, len });
        }
        if to >= len {
            return Err(TreeError::IndexOutOfBounds { index: to, len });
        }
        let item = items.remove(from);
        items.insert(to, item);
        Ok(())
    }

    /// Put `item` in place of the item at `index`; returns the replaced id.
    pub fn array_replace_at(&mut self, array: &NodeId, index: usize, item: &NodeId) -> Result<NodeId> {
        let items = self.require_array(array)?.items();
        let len = items.len();
        let replaced = items
            .get(index)
            .cloned()
            .ok_or(TreeError::IndexOutOfBounds { index, len })?;
        if replaced == *item {
            return Ok(replaced);
        }
        // Adopting may pull the item out of this same array and shift indices.
        self.adopt(array, item)?;
        let items = self.array_mut(array)?.items_mut();
        let Some(position) = items.iter().position(|i| *i == replaced) else {
            return Err(TreeError::NodeNotFound(replaced));
        };
        items[position] = item.clone();
        self.clear_parent_if(&replaced, array);
        Ok(replaced)
    }

    /// Detach every item; returns their ids in order.
    pub fn array_clear(&mut self, array: &NodeId) -> Result<Vec<NodeId>> {
        let removed = std::mem::take(self.array_mut(array)?.items_mut());
        for item in &removed {
            self.clear_parent_if(item, array);
        }
        if !removed.is_empty() {
            self.watchers.emit(NodeEvent::LengthChanged(array.clone()));
        }
        Ok(removed)
    }

    /// Build a new item from the items schema through the array's factory
    /// and append it.
    pub fn array_push_value(&mut self, array: &NodeId, value: Option<&Value>) -> Result<NodeId> {
        let len = self.require_array(array)?.len();
        self.array_insert_value_at(array, len, value)
    }

    /// Build a new item through the array's factory and insert it at `index`.
    pub fn array_insert_value_at(
        &mut self,
        array: &NodeId,
        index: usize,
        value: Option<&Value>,
    ) -> Result<NodeId> {
        let len = self.require_array(array)?.len();
        if index > len {
            return Err(TreeError::IndexOutOfBounds { index, len });
        }
        let item = self.build_item(array, index, value)?;
        self.array_insert_at(array, index, &item)?;
        Ok(item)
    }

    /// Build a new item through the array's factory and put it in place of
    /// the item at `index`; returns `(new, replaced)`.
    pub fn array_replace_value_at(
        &mut self,
        array: &NodeId,
        index: usize,
        value: Option<&Value>,
    ) -> Result<(NodeId, NodeId)> {
        let len = self.require_array(array)?.len();
        if index >= len {
            return Err(TreeError::IndexOutOfBounds { index, len });
        }
        let item = self.build_item(array, index, value)?;
        let replaced = self.array_replace_at(array, index, &item)?;
        Ok((item, replaced))
    }

    fn build_item(&mut self, array: &NodeId, index: usize, value: Option<&Value>) -> Result<NodeId> {
        let node = self.require(array)?;
        let factory = node
            .as_array()
            .and_then(|a| a.factory().cloned())
            .ok_or_else(|| TreeError::MissingFactory(array.clone()))?;
        let items_schema: Arc<SchemaDefinition> = node
            .schema
            .items
            .clone()
            .ok_or_else(|| TreeError::MissingItemsSchema(array.clone()))?;
        factory.create(self, &index.to_string(), &items_schema, value, None)
    }

    // ------------------------------------------------------------------
    // Dirty tracking

    /// Whether `id` or anything beneath it differs from its baseline.
    pub fn is_dirty(&self, id: &NodeId) -> bool {
        let Some(node) = self.nodes.get(id) else {
            return false;
        };
        match &node.kind {
            NodeKind::Primitive(primitive) => primitive.is_dirty(),
            NodeKind::Object(object) => {
                object.membership_changed() || object.children().any(|(_, c)| self.is_dirty(c))
            }
            NodeKind::Array(array) => {
                array.membership_changed() || array.items().iter().any(|c| self.is_dirty(c))
            }
        }
    }

    /// Make the current state of `id`'s subtree its baseline.
    pub fn commit(&mut self, id: &NodeId) {
        for node_id in self.subtree(id) {
            let Some(node) = self.nodes.get_mut(&node_id) else {
                continue;
            };
            match &mut node.kind {
                NodeKind::Primitive(primitive) => primitive.commit(),
                NodeKind::Object(object) => object.commit(),
                NodeKind::Array(array) => array.commit(),
            }
        }
    }

    /// Restore `id`'s subtree to its baseline values and membership.
    pub fn revert(&mut self, id: &NodeId) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        let (previous, restored, length_changed) = match &mut node.kind {
            NodeKind::Primitive(primitive) => {
                if primitive.revert() {
                    self.watchers.emit(NodeEvent::ValueChanged(id.clone()));
                }
                return;
            }
            NodeKind::Object(object) => {
                let previous = object.revert();
                let restored: Vec<NodeId> = object.children().map(|(_, c)| c.clone()).collect();
                (previous, restored, false)
            }
            NodeKind::Array(array) => {
                let previous = array.revert();
                let length_changed = previous.len() != array.len();
                (previous, array.items().to_vec(), length_changed)
            }
        };
        if length_changed {
            self.watchers.emit(NodeEvent::LengthChanged(id.clone()));
        }

        let kept: HashSet<&NodeId> = restored.iter().collect();
        for dropped in previous.iter().filter(|p| !kept.contains(p)) {
            self.clear_parent_if(dropped, id);
        }
        for member in &restored {
            if let Some(child) = self.nodes.get_mut(member) {
                child.parent = Some(id.clone());
            }
            self.revert(member);
        }
    }

    /// Drop every node not reachable from one of `roots`.
    pub fn retain_reachable<'a>(&mut self, roots: impl IntoIterator<Item = &'a NodeId>) -> usize {
        let mut reachable = HashSet::new();
        for root in roots {
            reachable.extend(self.subtree(root));
        }
        let before = self.nodes.len();
        self.nodes.retain(|id, _| reachable.contains(id));
        let pruned = before - self.nodes.len();
        if pruned > 0 {
            debug!(count = pruned, "pruned detached nodes");
        }
        pruned
    }

    // ------------------------------------------------------------------
    // Diagnostics

    /// Diagnostics of `id` and its descendants.
    pub fn diagnostics(&self, id: &NodeId) -> Vec<Diagnostic> {
        self.subtree(id)
            .iter()
            .flat_map(|node_id| validation::node_diagnostics(self, node_id))
            .collect()
    }

    pub fn errors(&self, id: &NodeId) -> Vec<Diagnostic> {
        self.diagnostics_of(id, Severity::Error)
    }

    pub fn warnings(&self, id: &NodeId) -> Vec<Diagnostic> {
        self.diagnostics_of(id, Severity::Warning)
    }

    fn diagnostics_of(&self, id: &NodeId, severity: Severity) -> Vec<Diagnostic> {
        self.diagnostics(id)
            .into_iter()
            .filter(|d| d.severity == severity)
            .collect()
    }

    pub fn is_valid(&self, id: &NodeId) -> bool {
        self.errors(id).is_empty()
    }

    pub fn has_warnings(&self, id: &NodeId) -> bool {
        !self.warnings(id).is_empty()
    }
}

/// Declared default of `schema` coerced into `kind`, or the kind's zero.
pub(crate) fn default_primitive(schema: &SchemaDefinition, kind: PrimitiveKind) -> PrimitiveValue {
    PrimitiveValue::coerce(kind, &schema.default_value())
        .map(Coerced::into_value)
        .unwrap_or_else(|| kind.zero())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::IdGenerator;
    use crate::watch::WatchKind;
    use serde_json::json;

    fn primitive(store: &mut NodeStore, ids: &IdGenerator, value: f64) -> NodeId {
        let id = ids.next_id();
        store
            .insert(ValueNode::primitive(
                id.clone(),
                "",
                Arc::new(SchemaDefinition::number().with_default(7)),
                PrimitiveValue::Number(value),
            ))
            .unwrap();
        id
    }

    fn array(store: &mut NodeStore, ids: &IdGenerator) -> NodeId {
        let id = ids.next_id();
        store
            .insert(ValueNode::array(
                id.clone(),
                "",
                Arc::new(SchemaDefinition::array(SchemaDefinition::number())),
            ))
            .unwrap();
        id
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut store = NodeStore::new();
        let ids = IdGenerator::isolated();
        let id = primitive(&mut store, &ids, 1.0);
        let again = ValueNode::primitive(
            id.clone(),
            "",
            Arc::new(SchemaDefinition::number()),
            PrimitiveValue::Number(0.0),
        );
        assert_eq!(store.insert(again), Err(TreeError::DuplicateNodeId(id)));
    }

    #[test]
    fn test_array_bounds_are_checked() {
        let mut store = NodeStore::new();
        let ids = IdGenerator::isolated();
        let arr = array(&mut store, &ids);
        let item = primitive(&mut store, &ids, 1.0);
        assert_eq!(
            store.array_insert_at(&arr, 1, &item),
            Err(TreeError::IndexOutOfBounds { index: 1, len: 0 })
        );
        assert_eq!(
            store.array_remove_at(&arr, 0),
            Err(TreeError::IndexOutOfBounds { index: 0, len: 0 })
        );
        store.array_push(&arr, &item).unwrap();
        assert_eq!(
            store.array_move(&arr, 0, 1),
            Err(TreeError::IndexOutOfBounds { index: 1, len: 1 })
        );
    }

    #[test]
    fn test_reparent_clears_old_parent() {
        let mut store = NodeStore::new();
        let ids = IdGenerator::isolated();
        let first = array(&mut store, &ids);
        let second = array(&mut store, &ids);
        let item = primitive(&mut store, &ids, 1.0);
        store.array_push(&first, &item).unwrap();
        store.array_push(&second, &item).unwrap();
        assert!(store.node(&first).unwrap().as_array().unwrap().is_empty());
        assert_eq!(store.node(&item).unwrap().parent(), Some(&second));
    }

    #[test]
    fn test_cyclic_attach_rejected() {
        let mut store = NodeStore::new();
        let ids = IdGenerator::isolated();
        let outer = array(&mut store, &ids);
        let inner = array(&mut store, &ids);
        store.array_push(&outer, &inner).unwrap();
        assert_eq!(
            store.array_push(&inner, &outer),
            Err(TreeError::CyclicAttach(outer.clone()))
        );
        assert_eq!(
            store.array_push(&outer, &outer),
            Err(TreeError::CyclicAttach(outer))
        );
    }

    #[test]
    fn test_external_write_rules() {
        let mut store = NodeStore::new();
        let ids = IdGenerator::isolated();
        let id = primitive(&mut store, &ids, 1.0);
        assert!(store.set_value(&id, &json!("12"), WriteMode::External).unwrap());
        assert_eq!(store.plain_value(&id), json!(12));
        assert!(matches!(
            store.set_value(&id, &json!([1]), WriteMode::External),
            Err(TreeError::TypeMismatch { expected: "number", .. })
        ));
        store.set_value(&id, &Value::Null, WriteMode::External).unwrap();
        assert_eq!(store.plain_value(&id), json!(7));

        let computed = ids.next_id();
        store
            .insert(ValueNode::primitive(
                computed.clone(),
                "",
                Arc::new(SchemaDefinition::number().with_formula("1")),
                PrimitiveValue::Number(0.0),
            ))
            .unwrap();
        assert_eq!(
            store.set_value(&computed, &json!(3), WriteMode::External),
            Err(TreeError::ReadOnly(computed.clone()))
        );
        assert!(store.set_value(&computed, &json!(3), WriteMode::Internal).unwrap());
    }

    #[test]
    fn test_revert_restores_membership_and_parents() {
        let mut store = NodeStore::new();
        let ids = IdGenerator::isolated();
        let arr = array(&mut store, &ids);
        let a = primitive(&mut store, &ids, 1.0);
        let b = primitive(&mut store, &ids, 2.0);
        store.array_push(&arr, &a).unwrap();
        store.commit(&arr);
        assert!(!store.is_dirty(&arr));

        store.array_remove_at(&arr, 0).unwrap();
        store.array_push(&arr, &b).unwrap();
        assert!(store.is_dirty(&arr));
        assert_eq!(store.node(&a).unwrap().parent(), None);

        store.revert(&arr);
        assert!(!store.is_dirty(&arr));
        assert_eq!(store.plain_value(&arr), json!([1]));
        assert_eq!(store.node(&a).unwrap().parent(), Some(&arr));
        assert_eq!(store.node(&b).unwrap().parent(), None);
        assert_eq!(store.retain_reachable([&arr]), 1);
        assert!(!store.contains(&b));
    }

    #[test]
    fn test_events_only_for_watched_changes() {
        let mut store = NodeStore::new();
        let ids = IdGenerator::isolated();
        let arr = array(&mut store, &ids);
        let item = primitive(&mut store, &ids, 1.0);
        let _value = store.watchers().watch(item.clone(), WatchKind::Value);
        let _length = store.watchers().watch(arr.clone(), WatchKind::Length);

        store.set_value(&item, &json!(1), WriteMode::External).unwrap();
        assert!(!store.watchers().has_pending());

        store.array_push(&arr, &item).unwrap();
        store.set_value(&item, &json!(5), WriteMode::External).unwrap();
        assert_eq!(
            store.watchers().take_pending(),
            vec![
                NodeEvent::LengthChanged(arr.clone()),
                NodeEvent::ValueChanged(item.clone()),
            ]
        );

        store.array_move(&arr, 0, 0).unwrap();
        assert!(!store.watchers().has_pending());
    }

    #[test]
    fn test_path_of_follows_current_order() {
        let mut store = NodeStore::new();
        let ids = IdGenerator::isolated();
        let arr = array(&mut store, &ids);
        let a = primitive(&mut store, &ids, 1.0);
        let b = primitive(&mut store, &ids, 2.0);
        store.array_push(&arr, &a).unwrap();
        store.array_push(&arr, &b).unwrap();
        assert_eq!(store.path_of(&b).as_simple_string(), "[1]");
        store.array_move(&arr, 1, 0).unwrap();
        assert_eq!(store.path_of(&b).as_simple_string(), "[0]");
        assert!(store.has_array_ancestor(&b));
        assert!(!store.has_array_ancestor(&arr));
        assert_eq!(store.resolve(&arr, &"[1]".parse().unwrap()), Some(a));
    }
}
