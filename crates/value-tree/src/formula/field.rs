use crate::node::NodeId;

/// One enclosing array of a formula field and the field's item index in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayLevelRef {
    pub array: NodeId,
    pub index: usize,
}

/// A formula-bearing primitive with its resolved inputs.
///
/// Rebuilt from the tree on every engine (re)initialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormulaField {
    pub node: NodeId,
    pub expression: String,
    /// Nearest enclosing object.
    pub parent: Option<NodeId>,
    /// Primitive nodes the expression reads, deduplicated.
    pub dependencies: Vec<NodeId>,
    /// Enclosing arrays, outermost first.
    pub array_levels: Vec<ArrayLevelRef>,
}

impl FormulaField {
    pub fn depends_on(&self, node: &NodeId) -> bool {
        self.dependencies.contains(node)
    }

    pub fn is_in_array(&self) -> bool {
        !self.array_levels.is_empty()
    }
}
