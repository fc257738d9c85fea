//! Dependency map and evaluation order over formula fields.
//!
//! Fields are referred to by their position in the collected field list.

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexSet;

use super::field::FormulaField;
use crate::node::NodeId;

/// Primitive node -> fields that read it.
pub type DependencyMap = HashMap<NodeId, IndexSet<usize>>;

pub fn build_dependency_map(fields: &[FormulaField]) -> DependencyMap {
    let mut map = DependencyMap::new();
    for (index, field) in fields.iter().enumerate() {
        for dependency in &field.dependencies {
            map.entry(dependency.clone()).or_default().insert(index);
        }
    }
    map
}

/// Topological order: every field comes after the fields it reads.
///
/// A field on a cycle is still emitted exactly once; the back edge that
/// closes the cycle is ignored.
pub fn build_evaluation_order(fields: &[FormulaField]) -> Vec<usize> {
    let by_node: HashMap<&NodeId, usize> = fields
        .iter()
        .enumerate()
        .map(|(index, field)| (&field.node, index))
        .collect();
    let mut order = Vec::with_capacity(fields.len());
    let mut visited = HashSet::new();
    let mut visiting = HashSet::new();
    for index in 0..fields.len() {
        visit(index, fields, &by_node, &mut visited, &mut visiting, &mut order);
    }
    order
}

fn visit(
    index: usize,
    fields: &[FormulaField],
    by_node: &HashMap<&NodeId, usize>,
    visited: &mut HashSet<usize>,
    visiting: &mut HashSet<usize>,
    order: &mut Vec<usize>,
) {
    if visited.contains(&index) || !visiting.insert(index) {
        return;
    }
    for dependency in &fields[index].dependencies {
        if let Some(&upstream) = by_node.get(dependency) {
            visit(upstream, fields, by_node, visited, visiting, order);
        }
    }
    visiting.remove(&index);
    visited.insert(index);
    order.push(index);
}

/// Fields to recompute after `changed` changed, in evaluation order.
///
/// Follows the map transitively: a recomputed field's node may itself be
/// read by further fields.
pub fn affected_formulas(
    changed: &NodeId,
    fields: &[FormulaField],
    map: &DependencyMap,
    order: &[usize],
) -> Vec<usize> {
    affected_by_any(std::iter::once(changed), fields, map, order)
}

pub(crate) fn affected_by_any<'n>(
    changed: impl IntoIterator<Item = &'n NodeId>,
    fields: &[FormulaField],
    map: &DependencyMap,
    order: &[usize],
) -> Vec<usize> {
    let mut affected = HashSet::new();
    let mut queue: VecDeque<&NodeId> = changed.into_iter().collect();
    while let Some(node) = queue.pop_front() {
        let Some(readers) = map.get(node) else {
            continue;
        };
        for &reader in readers {
            if affected.insert(reader) {
                queue.push_back(&fields[reader].node);
            }
        }
    }
    order
        .iter()
        .copied()
        .filter(|index| affected.contains(index))
        .collect()
}

/// Dependency map plus evaluation order for one set of fields.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    dependency_map: DependencyMap,
    order: Vec<usize>,
}

impl DependencyGraph {
    pub fn build(fields: &[FormulaField]) -> Self {
        Self {
            dependency_map: build_dependency_map(fields),
            order: build_evaluation_order(fields),
        }
    }

    pub fn dependency_map(&self) -> &DependencyMap {
        &self.dependency_map
    }

    pub fn evaluation_order(&self) -> &[usize] {
        &self.order
    }

    /// Distinct nodes read by at least one field.
    pub fn dependencies(&self) -> impl Iterator<Item = &NodeId> {
        self.dependency_map.keys()
    }

    pub fn affected_by(&self, changed: &NodeId, fields: &[FormulaField]) -> Vec<usize> {
        affected_formulas(changed, fields, &self.dependency_map, &self.order)
    }

    pub fn affected_by_any<'n>(
        &self,
        changed: impl IntoIterator<Item = &'n NodeId>,
        fields: &[FormulaField],
    ) -> Vec<usize> {
        affected_by_any(changed, fields, &self.dependency_map, &self.order)
    }
}
