use indexmap::IndexMap;

use super::NodeId;

/// Insertion-ordered property map.
#[derive(Debug, Clone, Default)]
pub struct ObjectNode {
    children: IndexMap<String, NodeId>,
    base_children: IndexMap<String, NodeId>,
}

impl ObjectNode {
    pub fn child(&self, name: &str) -> Option<&NodeId> {
        self.children.get(name)
    }

    pub fn has_child(&self, name: &str) -> bool {
        self.children.contains_key(name)
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, &NodeId)> {
        self.children.iter().map(|(name, id)| (name.as_str(), id))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Name under which `id` is a member.
    pub fn name_of(&self, id: &NodeId) -> Option<&str> {
        self.children
            .iter()
            .find(|(_, child)| *child == id)
            .map(|(name, _)| name.as_str())
    }

    /// Whether membership differs from the committed baseline.
    pub fn membership_changed(&self) -> bool {
        self.children != self.base_children
    }

    pub(crate) fn insert(&mut self, name: String, id: NodeId) -> Option<NodeId> {
        self.children.insert(name, id)
    }

    pub(crate) fn remove(&mut self, name: &str) -> Option<NodeId> {
        self.children.shift_remove(name)
    }

    pub(crate) fn remove_id(&mut self, id: &NodeId) -> bool {
        let before = self.children.len();
        self.children.retain(|_, child| child != id);
        self.children.len() != before
    }

    pub(crate) fn commit(&mut self) {
        self.base_children = self.children.clone();
    }

    /// Restore the baseline; returns the ids that were members before.
    pub(crate) fn revert(&mut self) -> Vec<NodeId> {
        let previous = self.children.values().cloned().collect();
        self.children = self.base_children.clone();
        previous
    }
}
