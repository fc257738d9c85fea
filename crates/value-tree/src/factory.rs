//! Schema-driven node construction.
//!
//! [`NodeFactory`] dispatches on the schema through an ordered rule list.
//! The built-in rules cover the five schema types; custom rules registered
//! with [`NodeFactory::register`] are consulted before them.
//!
//! ```
//! use std::sync::Arc;
//! use serde_json::json;
//! use value_tree::{NodeFactory, NodeStore, SchemaDefinition};
//!
//! let factory = Arc::new(NodeFactory::new());
//! let mut store = NodeStore::new();
//! let schema = Arc::new(SchemaDefinition::object([
//!     ("name", SchemaDefinition::string()),
//!     ("tags", SchemaDefinition::array(SchemaDefinition::string())),
//! ]));
//! let root = factory
//!     .create_tree(&mut store, &schema, Some(&json!({"tags": ["a"]})))
//!     .unwrap();
//! assert_eq!(store.plain_value(&root), json!({"name": "", "tags": ["a"]}));
//! ```

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{Result, TreeError};
use crate::node::{IdGenerator, NodeId, ValueNode};
use crate::registry::{DefaultValueRegistry, RuleRegistry};
use crate::schema::{SchemaDefinition, TYPE_ARRAY, TYPE_BOOLEAN, TYPE_NUMBER, TYPE_OBJECT, TYPE_STRING};
use crate::store::NodeStore;
use crate::value::{Coerced, PrimitiveKind, PrimitiveValue};

/// `$ref` chains longer than this are treated as unresolved.
const MAX_REF_DEPTH: usize = 32;

/// Everything a build rule needs to create one node.
#[derive(Debug)]
pub struct BuildRequest<'a> {
    pub id: NodeId,
    pub name: String,
    pub schema: Arc<SchemaDefinition>,
    /// The raw input; `None` when the caller supplied nothing.
    pub value: Option<&'a Value>,
}

pub type BuildFn =
    dyn for<'a> Fn(&Arc<NodeFactory>, &mut NodeStore, BuildRequest<'a>) -> Result<NodeId> + Send + Sync;

pub struct NodeFactory {
    rules: RuleRegistry<Box<BuildFn>>,
    custom_rules: usize,
    defaults: Arc<DefaultValueRegistry>,
    refs: HashMap<String, Arc<SchemaDefinition>>,
    ids: IdGenerator,
}

impl fmt::Debug for NodeFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeFactory")
            .field("rules", &self.rules)
            .field("defaults", &self.defaults)
            .field("refs", &self.refs.keys().collect::<Vec<_>>())
            .field("ids", &self.ids)
            .finish()
    }
}

impl Default for NodeFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeFactory {
    pub fn new() -> Self {
        let mut rules: RuleRegistry<Box<BuildFn>> = RuleRegistry::new();
        rules.register(TYPE_STRING, |s| s.schema_type() == TYPE_STRING, primitive_rule(PrimitiveKind::String));
        rules.register(TYPE_NUMBER, |s| s.schema_type() == TYPE_NUMBER, primitive_rule(PrimitiveKind::Number));
        rules.register(TYPE_BOOLEAN, |s| s.schema_type() == TYPE_BOOLEAN, primitive_rule(PrimitiveKind::Boolean));
        rules.register(TYPE_OBJECT, |s| s.schema_type() == TYPE_OBJECT, boxed_rule(build_object));
        rules.register(TYPE_ARRAY, |s| s.schema_type() == TYPE_ARRAY, boxed_rule(build_array));
        Self {
            rules,
            custom_rules: 0,
            defaults: Arc::new(DefaultValueRegistry::new()),
            refs: HashMap::new(),
            ids: IdGenerator::global(),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn with_id_generator(mut self, ids: IdGenerator) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_defaults(mut self, defaults: DefaultValueRegistry) -> Self {
        self.defaults = Arc::new(defaults);
        self
    }

    /// Make `schema` the target of `{"$ref": name}`.
    pub fn with_ref_schema(mut self, name: impl Into<String>, schema: SchemaDefinition) -> Self {
        self.refs.insert(name.into(), Arc::new(schema));
        self
    }

    /// Add a custom build rule, consulted after earlier custom rules and
    /// before the built-in type rules.
    pub fn register<M, F>(mut self, name: impl Into<String>, matcher: M, build: F) -> Self
    where
        M: Fn(&SchemaDefinition) -> bool + Send + Sync + 'static,
        F: for<'a> Fn(&Arc<NodeFactory>, &mut NodeStore, BuildRequest<'a>) -> Result<NodeId>
            + Send
            + Sync
            + 'static,
    {
        self.rules.insert(self.custom_rules, name, matcher, boxed_rule(build));
        self.custom_rules += 1;
        self
    }

    pub fn id_generator(&self) -> &IdGenerator {
        &self.ids
    }

    /// Default for a node of `schema` (explicit default, registry, zero).
    pub fn default_value(&self, schema: &SchemaDefinition) -> Value {
        self.defaults.default_for(schema)
    }

    pub fn defaults(&self) -> &Arc<DefaultValueRegistry> {
        &self.defaults
    }

    /// Follow `$ref` through the reference table. Unknown references leave
    /// the schema as it is.
    pub fn resolve_ref(&self, schema: &Arc<SchemaDefinition>) -> Arc<SchemaDefinition> {
        let mut current = Arc::clone(schema);
        for _ in 0..MAX_REF_DEPTH {
            let Some(target) = current.ref_.as_deref().and_then(|name| self.refs.get(name)) else {
                return current;
            };
            current = Arc::clone(target);
        }
        warn!(reference = ?schema.ref_, "schema reference chain too deep");
        Arc::clone(schema)
    }

    /// Build a node (and its subtree) for `schema` from `value`.
    ///
    /// `id` is generated when not given.
    pub fn create(
        self: &Arc<Self>,
        store: &mut NodeStore,
        name: &str,
        schema: &Arc<SchemaDefinition>,
        value: Option<&Value>,
        id: Option<NodeId>,
    ) -> Result<NodeId> {
        let schema = self.resolve_ref(schema);
        let rule = self
            .rules
            .find(&schema)
            .ok_or_else(|| TreeError::UnknownSchemaType(schema.schema_type().to_string()))?;
        let id = id.unwrap_or_else(|| self.ids.next_id());
        rule(
            self,
            store,
            BuildRequest {
                id,
                name: name.to_string(),
                schema,
                value,
            },
        )
    }

    /// `create("", schema, value)`.
    pub fn create_tree(
        self: &Arc<Self>,
        store: &mut NodeStore,
        schema: &Arc<SchemaDefinition>,
        value: Option<&Value>,
    ) -> Result<NodeId> {
        self.create(store, "", schema, value, None)
    }

    fn primitive_value(&self, schema: &SchemaDefinition, kind: PrimitiveKind, value: Option<&Value>) -> PrimitiveValue {
        if let Some(value) = value.filter(|v| !v.is_null()) {
            match PrimitiveValue::coerce(kind, value) {
                Some(coerced) => return coerced.into_value(),
                None => warn!(
                    expected = kind.as_str(),
                    %value,
                    "initial value does not fit the schema type, using default"
                ),
            }
        }
        PrimitiveValue::coerce(kind, &self.default_value(schema))
            .map(Coerced::into_value)
            .unwrap_or_else(|| kind.zero())
    }

    /// The caller's value, or the schema default when absent or `null`.
    fn container_input<'v>(&self, schema: &SchemaDefinition, value: Option<&'v Value>) -> Cow<'v, Value> {
        match value.filter(|v| !v.is_null()) {
            Some(value) => Cow::Borrowed(value),
            None => Cow::Owned(self.default_value(schema)),
        }
    }
}

fn boxed_rule<F>(build: F) -> Box<BuildFn>
where
    F: for<'a> Fn(&Arc<NodeFactory>, &mut NodeStore, BuildRequest<'a>) -> Result<NodeId> + Send + Sync + 'static,
{
    Box::new(build)
}

fn primitive_rule(kind: PrimitiveKind) -> Box<BuildFn> {
    boxed_rule(move |factory, store, req| {
        let value = factory.primitive_value(&req.schema, kind, req.value);
        let id = req.id.clone();
        store.insert(ValueNode::primitive(req.id, req.name, req.schema, value))?;
        Ok(id)
    })
}

fn build_object(factory: &Arc<NodeFactory>, store: &mut NodeStore, req: BuildRequest<'_>) -> Result<NodeId> {
    let input = factory.container_input(&req.schema, req.value);
    let empty = Map::new();
    let members = input.as_object().unwrap_or(&empty);
    let id = req.id.clone();
    let schema = Arc::clone(&req.schema);
    store.insert(ValueNode::object(req.id, req.name, req.schema))?;

    for (name, child_schema) in schema.properties.iter().flatten() {
        let child = factory.create(store, name, child_schema, members.get(name), None)?;
        store.object_add_child(&id, name, &child)?;
    }
    if let Some(extra_schema) = schema.additional_property_schema() {
        for (name, value) in members {
            if schema.property(name).is_some() {
                continue;
            }
            let child = factory.create(store, name, extra_schema, Some(value), None)?;
            store.object_add_child(&id, name, &child)?;
        }
    }
    Ok(id)
}

fn build_array(factory: &Arc<NodeFactory>, store: &mut NodeStore, req: BuildRequest<'_>) -> Result<NodeId> {
    let input = factory.container_input(&req.schema, req.value);
    let items = input.as_array().map(Vec::as_slice).unwrap_or_default();
    let items_schema = req
        .schema
        .items
        .clone()
        .unwrap_or_else(|| Arc::new(SchemaDefinition::string()));
    let id = req.id.clone();
    let mut node = ValueNode::array(req.id, req.name, req.schema);
    if let Some(array) = node.as_array_mut() {
        array.set_factory(Arc::clone(factory));
    }
    store.insert(node)?;

    for (index, item) in items.iter().enumerate() {
        let child = factory.create(store, &index.to_string(), &items_schema, Some(item), None)?;
        store.array_push(&id, &child)?;
    }
    Ok(id)
}
