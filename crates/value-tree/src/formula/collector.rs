//! Finds formula fields and resolves what they read.
//!
//! A reference is anchored by its prefix:
//!
//! - `/a.b` starts at the tree root;
//! - `../a` starts one object level above the field's enclosing object,
//!   stepping over an array in between (one level per `../`);
//! - anything else starts at the enclosing object, or the root when there
//!   is none.
//!
//! The rest is a simple-form path. A `[*]` segment fans out over every
//! current item of the array it applies to. References that land on an
//! object or array stand for every primitive beneath it.

use indexmap::IndexSet;
use tracing::{debug, warn};
use value_path::{parse_simple_path, PathSegment};

use super::context::ExpressionEvaluator;
use super::field::{ArrayLevelRef, FormulaField};
use crate::node::{NodeId, NodeKind};
use crate::store::NodeStore;

pub struct FormulaCollector<'a> {
    store: &'a NodeStore,
    root: &'a NodeId,
    parser: &'a dyn ExpressionEvaluator,
}

impl<'a> FormulaCollector<'a> {
    pub fn new(store: &'a NodeStore, root: &'a NodeId, parser: &'a dyn ExpressionEvaluator) -> Self {
        Self { store, root, parser }
    }

    /// Every formula field under the root, depth-first.
    pub fn collect(&self) -> Vec<FormulaField> {
        let mut fields = Vec::new();
        let mut levels = Vec::new();
        self.walk(self.root, None, &mut levels, &mut fields);
        fields
    }

    fn walk(
        &self,
        id: &NodeId,
        enclosing: Option<&NodeId>,
        levels: &mut Vec<ArrayLevelRef>,
        out: &mut Vec<FormulaField>,
    ) {
        let Some(node) = self.store.node(id) else {
            return;
        };
        match node.kind() {
            NodeKind::Object(object) => {
                for (_, child) in object.children() {
                    self.walk(child, Some(id), levels, out);
                }
            }
            NodeKind::Array(array) => {
                for (index, item) in array.items().iter().enumerate() {
                    levels.push(ArrayLevelRef {
                        array: id.clone(),
                        index,
                    });
                    self.walk(item, enclosing, levels, out);
                    levels.pop();
                }
            }
            NodeKind::Primitive(primitive) => {
                let Some(formula) = primitive.formula() else {
                    return;
                };
                let dependencies = self.dependencies_of(id, &formula.expression, enclosing);
                out.push(FormulaField {
                    node: id.clone(),
                    expression: formula.expression.clone(),
                    parent: enclosing.cloned(),
                    dependencies,
                    array_levels: levels.clone(),
                });
            }
        }
    }

    fn dependencies_of(&self, field: &NodeId, expression: &str, enclosing: Option<&NodeId>) -> Vec<NodeId> {
        let parsed = match self.parser.parse_expression(expression) {
            Ok(parsed) => parsed,
            Err(error) => {
                warn!(node = %field, expression, %error, "unparsable formula, tracking no dependencies");
                return Vec::new();
            }
        };
        let mut resolved = IndexSet::new();
        for reference in &parsed.dependencies {
            let targets = self.resolve_reference(reference, enclosing);
            if targets.is_empty() {
                debug!(node = %field, reference = %reference, "unresolved formula reference");
            }
            resolved.extend(targets);
        }
        resolved.into_iter().collect()
    }

    /// Primitive nodes a single reference reads.
    pub fn resolve_reference(&self, reference: &str, enclosing: Option<&NodeId>) -> Vec<NodeId> {
        let (anchor, rest) = if let Some(rest) = reference.strip_prefix('/') {
            (Some(self.root.clone()), rest)
        } else if reference.starts_with("../") {
            let mut anchor = Some(enclosing.unwrap_or(self.root).clone());
            let mut rest = reference;
            while let Some(stripped) = rest.strip_prefix("../") {
                rest = stripped;
                anchor = anchor.and_then(|a| self.object_above(&a));
            }
            (anchor, rest)
        } else {
            (Some(enclosing.unwrap_or(self.root).clone()), reference)
        };
        let Some(anchor) = anchor else {
            return Vec::new();
        };
        let Ok(path) = parse_simple_path(rest) else {
            return Vec::new();
        };

        let mut targets = Vec::new();
        self.expand(&anchor, path.segments(), &mut targets);
        let mut leaves = IndexSet::new();
        for target in targets {
            leaves.extend(
                self.store
                    .subtree(&target)
                    .into_iter()
                    .filter(|id| self.store.node(id).is_some_and(|n| n.is_primitive())),
            );
        }
        leaves.into_iter().collect()
    }

    /// The container one object level up, skipping an array in between.
    fn object_above(&self, id: &NodeId) -> Option<NodeId> {
        let parent = self.store.node(id)?.parent()?.clone();
        let parent_node = self.store.node(&parent)?;
        if parent_node.is_array() {
            return parent_node.parent().cloned();
        }
        Some(parent)
    }

    fn expand(&self, from: &NodeId, segments: &[PathSegment], out: &mut Vec<NodeId>) {
        let Some((segment, rest)) = segments.split_first() else {
            out.push(from.clone());
            return;
        };
        let Some(node) = self.store.node(from) else {
            return;
        };
        match (segment, node.kind()) {
            (PathSegment::Property(name), NodeKind::Object(object)) => {
                if let Some(child) = object.child(name) {
                    self.expand(child, rest, out);
                }
            }
            (PathSegment::Index(index), NodeKind::Array(array)) => {
                if let Some(item) = array.items().get(*index) {
                    self.expand(item, rest, out);
                }
            }
            (PathSegment::Wildcard, NodeKind::Array(array)) => {
                for item in array.items() {
                    self.expand(item, rest, out);
                }
            }
            _ => {}
        }
    }
}
