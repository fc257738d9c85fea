//! The document façade.
//!
//! [`ValueTree`] owns a node store and the root of one tree, keeps the id
//! index and path cache in step with structural edits, records every edit
//! in a change log, and drives an optional [`FormulaEngine`].
//!
//! ```
//! use serde_json::json;
//! use value_tree::{SchemaDefinition, ValueTree};
//!
//! let schema = SchemaDefinition::object([
//!     ("title", SchemaDefinition::string()),
//!     ("tags", SchemaDefinition::array(SchemaDefinition::string())),
//! ]);
//! let mut tree = ValueTree::from_schema(schema, &json!({"title": "draft"})).unwrap();
//!
//! tree.set_value("title", json!("final")).unwrap();
//! tree.push_value("tags", json!("news")).unwrap();
//! assert!(tree.is_dirty());
//! assert_eq!(
//!     tree.patches_json(),
//!     json!([
//!         {"op": "replace", "path": "/title", "value": "final"},
//!         {"op": "add", "path": "/tags/-", "value": "news"},
//!     ])
//! );
//!
//! tree.revert();
//! assert_eq!(tree.plain_value(), json!({"title": "draft", "tags": []}));
//! ```

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use value_path::{parse_simple_path, Path};

use crate::change::{to_json_patch, Change, ChangeTracker, JsonPatch};
use crate::error::{Result, TreeError};
use crate::factory::NodeFactory;
use crate::formula::FormulaEngine;
use crate::index::TreeIndex;
use crate::node::{NodeId, NodeKind, ValueNode};
use crate::registry::{ChangeHandlerRegistry, SerializerRegistry};
use crate::schema::SchemaDefinition;
use crate::store::{NodeStore, WriteMode};
use crate::validation::Diagnostic;

/// Upper bound on notification rounds per flush.
const MAX_REACTION_ROUNDS: usize = 16;

#[derive(Debug)]
pub struct ValueTree {
    store: NodeStore,
    root: NodeId,
    index: TreeIndex,
    changes: ChangeTracker,
    change_handlers: ChangeHandlerRegistry,
    formula_engine: Option<FormulaEngine>,
    factory: Arc<NodeFactory>,
}

impl ValueTree {
    /// Wrap an existing tree. `root` must be in `store`.
    pub fn new(store: NodeStore, root: NodeId) -> Result<Self> {
        store.require(&root)?;
        let index = TreeIndex::build(&store, root.clone());
        Ok(Self {
            store,
            root,
            index,
            changes: ChangeTracker::new(),
            change_handlers: ChangeHandlerRegistry::new(),
            formula_engine: None,
            factory: NodeFactory::shared(),
        })
    }

    /// Build a tree for `schema` from `value` with a default factory.
    pub fn from_schema(schema: SchemaDefinition, value: &Value) -> Result<Self> {
        Self::from_factory(&NodeFactory::shared(), &Arc::new(schema), value)
    }

    /// Build a tree for `schema` from `value` through `factory`, which is
    /// also used for nodes created later by [`ValueTree::add_property`].
    pub fn from_factory(factory: &Arc<NodeFactory>, schema: &Arc<SchemaDefinition>, value: &Value) -> Result<Self> {
        let mut store = NodeStore::new().with_defaults(Arc::clone(factory.defaults()));
        let root = factory.create_tree(&mut store, schema, Some(value))?;
        let mut tree = Self::new(store, root)?;
        tree.factory = Arc::clone(factory);
        Ok(tree)
    }

    pub fn with_change_handlers(mut self, handlers: ChangeHandlerRegistry) -> Self {
        self.change_handlers = handlers;
        self
    }

    /// Attach and initialize a formula engine, evaluating every formula.
    pub fn attach_formula_engine(&mut self, mut engine: FormulaEngine) -> Result<()> {
        if self.formula_engine.is_some() {
            return Err(TreeError::EngineAlreadyAttached);
        }
        engine.initialize(&mut self.store, &self.root)?;
        self.formula_engine = Some(engine);
        Ok(())
    }

    pub fn with_formula_engine(mut self, engine: FormulaEngine) -> Result<Self> {
        self.attach_formula_engine(engine)?;
        Ok(self)
    }

    /// Dispose and hand back the attached engine.
    pub fn detach_formula_engine(&mut self) -> Option<FormulaEngine> {
        let mut engine = self.formula_engine.take()?;
        engine.dispose();
        Some(engine)
    }

    pub fn formula_engine(&self) -> Option<&FormulaEngine> {
        self.formula_engine.as_ref()
    }

    // ── Access ───────────────────────────────────────────────────────────────

    pub fn root_id(&self) -> &NodeId {
        &self.root
    }

    pub fn root(&self) -> &ValueNode {
        // The root is checked at construction and never pruned.
        match self.store.node(&self.root) {
            Some(node) => node,
            None => unreachable!("root node missing from store"),
        }
    }

    pub fn store(&self) -> &NodeStore {
        &self.store
    }

    /// Raw node-level access. Structural edits made here bypass the change
    /// log; call [`ValueTree::rebuild_index`] (or
    /// [`ValueTree::invalidate_paths_under`]) and
    /// [`ValueTree::run_pending_reactions`] afterwards.
    pub fn store_mut(&mut self) -> &mut NodeStore {
        &mut self.store
    }

    pub fn index(&self) -> &TreeIndex {
        &self.index
    }

    pub fn factory(&self) -> &Arc<NodeFactory> {
        &self.factory
    }

    /// Node at a simple-form path; `""` is the root.
    pub fn get(&self, path: &str) -> Option<&ValueNode> {
        let path = parse_simple_path(path).ok()?;
        self.get_by_path(&path)
    }

    pub fn get_by_path(&self, path: &Path) -> Option<&ValueNode> {
        let id = self.store.resolve(&self.root, path)?;
        self.store.node(&id)
    }

    /// Plain value at a simple-form path.
    pub fn value_at(&self, path: &str) -> Option<Value> {
        self.get(path).map(|node| self.store.plain_value(node.id()))
    }

    pub fn node_by_id(&self, id: &NodeId) -> Option<&ValueNode> {
        self.index.node_by_id(&self.store, id)
    }

    pub fn path_of(&self, id: &NodeId) -> Path {
        self.index.path_of(&self.store, id)
    }

    pub fn plain_value(&self) -> Value {
        self.store.plain_value(&self.root)
    }

    /// Plain value with matching serializers applied bottom-up.
    pub fn serialize(&self, serializers: &SerializerRegistry) -> Value {
        self.serialize_node(&self.root, serializers)
    }

    fn serialize_node(&self, id: &NodeId, serializers: &SerializerRegistry) -> Value {
        let Some(node) = self.store.node(id) else {
            return Value::Null;
        };
        let value = match node.kind() {
            NodeKind::Object(object) => Value::Object(
                object
                    .children()
                    .map(|(name, child)| (name.to_string(), self.serialize_node(child, serializers)))
                    .collect::<Map<String, Value>>(),
            ),
            NodeKind::Array(array) => Value::Array(
                array
                    .items()
                    .iter()
                    .map(|item| self.serialize_node(item, serializers))
                    .collect(),
            ),
            NodeKind::Primitive(primitive) => primitive.value().to_json(),
        };
        serializers.serialize(value, node.schema())
    }

    // ── Validation ───────────────────────────────────────────────────────────

    pub fn all_errors(&self) -> Vec<Diagnostic> {
        self.store.errors(&self.root)
    }

    pub fn all_warnings(&self) -> Vec<Diagnostic> {
        self.store.warnings(&self.root)
    }

    /// No errors; warnings do not count.
    pub fn is_valid(&self) -> bool {
        self.all_errors().is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.all_warnings().is_empty()
    }

    pub fn errors_by_path(&self) -> IndexMap<String, Vec<Diagnostic>> {
        let mut grouped: IndexMap<String, Vec<Diagnostic>> = IndexMap::new();
        for diagnostic in self.all_errors() {
            grouped.entry(diagnostic.path.clone()).or_default().push(diagnostic);
        }
        grouped
    }

    // ── Dirty tracking ───────────────────────────────────────────────────────

    pub fn is_dirty(&self) -> bool {
        self.store.is_dirty(&self.root)
    }

    /// Make the current state the baseline and clear the change log.
    pub fn commit(&mut self) {
        self.store.commit(&self.root);
        self.changes.clear();
        self.store.retain_reachable([&self.root]);
        self.index.rebuild(&self.store);
    }

    /// Return to the baseline and clear the change log.
    ///
    /// Restored membership may reorder arrays without changing their
    /// length, so an attached engine is rebuilt rather than notified.
    pub fn revert(&mut self) {
        self.store.revert(&self.root);
        self.changes.clear();
        self.store.retain_reachable([&self.root]);
        self.index.rebuild(&self.store);
        self.store.watchers().take_pending();
        if let Some(engine) = self.formula_engine.as_mut() {
            if let Err(error) = engine.reinitialize_baseline(&mut self.store, &self.root) {
                warn!(%error, "formula engine rebuild after revert failed");
            }
        }
    }

    pub fn changes(&self) -> &[Change] {
        self.changes.changes()
    }

    pub fn patches(&self) -> Vec<JsonPatch> {
        self.changes.patches()
    }

    pub fn patches_json(&self) -> Value {
        to_json_patch(&self.patches())
    }

    // ── Edits ────────────────────────────────────────────────────────────────

    /// Write a primitive at a simple-form path. `null` resets the node to
    /// the default the factory would build it with.
    pub fn set_value(&mut self, path: &str, value: impl Into<Value>) -> Result<()> {
        let id = self.resolve(path)?;
        if !self.store.require(&id)?.is_primitive() {
            return Err(TreeError::NotPrimitive(path.to_string()));
        }
        let old_value = self.store.plain_value(&id);
        self.store.set_value(&id, &value.into(), WriteMode::External)?;
        let change = Change::SetValue {
            path: self.path_of(&id),
            value: self.store.plain_value(&id),
            old_value,
        };
        self.track(change, &id);
        self.flush_reactions();
        Ok(())
    }

    /// Append an item built from the items schema.
    pub fn push_value(&mut self, path: &str, value: impl Into<Value>) -> Result<NodeId> {
        let array = self.resolve_array(path)?;
        let item = self.store.array_push_value(&array, Some(&value.into()))?;
        self.index.register(&self.store, &item);
        let change = Change::ArrayPush {
            path: self.path_of(&array),
            value: self.store.plain_value(&item),
        };
        self.track(change, &array);
        self.flush_reactions();
        Ok(item)
    }

    /// Insert an item built from the items schema at `index`.
    pub fn insert_value_at(&mut self, path: &str, index: usize, value: impl Into<Value>) -> Result<NodeId> {
        let array = self.resolve_array(path)?;
        let item = self
            .store
            .array_insert_value_at(&array, index, Some(&value.into()))?;
        self.index.register(&self.store, &item);
        let change = Change::ArrayInsert {
            path: self.path_of(&array),
            index,
            value: self.store.plain_value(&item),
        };
        self.track(change, &array);
        self.flush_reactions();
        Ok(item)
    }

    pub fn remove_at(&mut self, path: &str, index: usize) -> Result<()> {
        let array = self.resolve_array(path)?;
        let removed = self.store.array_remove_at(&array, index)?;
        self.index.unregister(&self.store, &removed);
        let change = Change::ArrayRemove {
            path: self.path_of(&array),
            index,
            old_value: self.store.plain_value(&removed),
        };
        self.track(change, &array);
        self.flush_reactions();
        Ok(())
    }

    pub fn move_item(&mut self, path: &str, from: usize, to: usize) -> Result<()> {
        let array = self.resolve_array(path)?;
        self.store.array_move(&array, from, to)?;
        let change = Change::ArrayMove {
            path: self.path_of(&array),
            from,
            to,
        };
        self.track(change, &array);
        self.structure_changed()
    }

    /// Replace the item at `index` with one built from the items schema.
    pub fn replace_value_at(&mut self, path: &str, index: usize, value: impl Into<Value>) -> Result<NodeId> {
        let array = self.resolve_array(path)?;
        let (item, replaced) = self
            .store
            .array_replace_value_at(&array, index, Some(&value.into()))?;
        self.index.unregister(&self.store, &replaced);
        self.index.register(&self.store, &item);
        let change = Change::ArrayReplace {
            path: self.path_of(&array),
            index,
            value: self.store.plain_value(&item),
            old_value: self.store.plain_value(&replaced),
        };
        self.track(change, &array);
        self.structure_changed()?;
        Ok(item)
    }

    pub fn clear_array(&mut self, path: &str) -> Result<()> {
        let array = self.resolve_array(path)?;
        let old_value = self.store.plain_value(&array);
        let removed = self.store.array_clear(&array)?;
        for item in &removed {
            self.index.unregister(&self.store, item);
        }
        let change = Change::ArrayClear {
            path: self.path_of(&array),
            old_value,
        };
        self.track(change, &array);
        self.flush_reactions();
        Ok(())
    }

    /// Add a member to the object at `path`.
    ///
    /// The member's schema is `schema` when given, else the object's
    /// declared property schema, else its `additionalProperties` schema.
    pub fn add_property(
        &mut self,
        path: &str,
        name: &str,
        schema: Option<SchemaDefinition>,
        value: impl Into<Value>,
    ) -> Result<NodeId> {
        let object = self.resolve(path)?;
        let object_node = self.store.require(&object)?;
        let object_schema = match object_node.kind() {
            NodeKind::Object(members) if members.has_child(name) => {
                return Err(TreeError::PropertyExists(name.to_string()))
            }
            NodeKind::Object(_) => object_node.schema(),
            _ => return Err(TreeError::NotAnObject(object)),
        };
        let child_schema = match schema {
            Some(schema) => Arc::new(schema),
            None => object_schema
                .property(name)
                .or_else(|| object_schema.additional_property_schema())
                .cloned()
                .ok_or_else(|| TreeError::MissingPropertySchema(name.to_string()))?,
        };

        let child = self
            .factory
            .create(&mut self.store, name, &child_schema, Some(&value.into()), None)?;
        self.store.object_add_child(&object, name, &child)?;
        self.index.register(&self.store, &child);
        let change = Change::AddProperty {
            path: self.path_of(&child),
            value: self.store.plain_value(&child),
        };
        self.track(change, &child);
        self.structure_changed()?;
        Ok(child)
    }

    pub fn remove_property(&mut self, path: &str, name: &str) -> Result<()> {
        let object = self.resolve(path)?;
        let member_path = self.path_of(&object).child(name);
        let removed = self.store.object_remove_child(&object, name)?;
        self.index.unregister(&self.store, &removed);
        let change = Change::RemoveProperty {
            path: member_path,
            old_value: self.store.plain_value(&removed),
        };
        self.track(change, &removed);
        self.structure_changed()
    }

    // ── Index and reactions ──────────────────────────────────────────────────

    pub fn invalidate_paths_under(&self, id: &NodeId) {
        self.index.invalidate_paths_under(&self.store, id);
    }

    pub fn rebuild_index(&self) {
        self.index.rebuild(&self.store);
    }

    /// Dispatch queued node notifications to the formula engine.
    pub fn run_pending_reactions(&mut self) -> Result<()> {
        for _ in 0..MAX_REACTION_ROUNDS {
            let events = self.store.watchers().take_pending();
            if events.is_empty() {
                return Ok(());
            }
            let Some(engine) = self.formula_engine.as_mut() else {
                return Ok(());
            };
            engine.handle_events(&mut self.store, &self.root, &events)?;
        }
        debug!("notification rounds exhausted, dropping remaining events");
        self.store.watchers().take_pending();
        Ok(())
    }

    fn flush_reactions(&mut self) {
        if let Err(error) = self.run_pending_reactions() {
            warn!(%error, "formula reaction failed");
        }
    }

    /// Membership changed without an array length change; rebuild formula
    /// wiring explicitly.
    fn structure_changed(&mut self) -> Result<()> {
        self.flush_reactions();
        if let Some(engine) = self.formula_engine.as_mut() {
            engine.reinitialize(&mut self.store, &self.root)?;
        }
        Ok(())
    }

    fn resolve(&self, path: &str) -> Result<NodeId> {
        parse_simple_path(path)
            .ok()
            .and_then(|parsed| self.store.resolve(&self.root, &parsed))
            .ok_or_else(|| TreeError::PathNotFound(path.to_string()))
    }

    fn resolve_array(&self, path: &str) -> Result<NodeId> {
        let id = self.resolve(path)?;
        if !self.store.require(&id)?.is_array() {
            return Err(TreeError::NotAnArray(id));
        }
        Ok(id)
    }

    fn track(&mut self, change: Change, target: &NodeId) {
        debug!(change = change.kind(), path = %change.path(), "tracked change");
        if let Some(node) = self.store.node(target) {
            self.change_handlers.handle(&change, node.schema());
        }
        self.changes.track(change);
    }
}
