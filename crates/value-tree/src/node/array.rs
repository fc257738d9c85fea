use std::sync::Arc;

use super::NodeId;
use crate::factory::NodeFactory;

/// Ordered item list.
///
/// Arrays built by a [`NodeFactory`] keep a handle to it so new typed items
/// can be synthesized from the items schema later.
#[derive(Clone, Default)]
pub struct ArrayNode {
    items: Vec<NodeId>,
    base_items: Vec<NodeId>,
    factory: Option<Arc<NodeFactory>>,
}

impl std::fmt::Debug for ArrayNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArrayNode")
            .field("items", &self.items)
            .field("base_items", &self.base_items)
            .field("has_factory", &self.factory.is_some())
            .finish()
    }
}

impl ArrayNode {
    pub fn items(&self) -> &[NodeId] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Item at `index`; negative indices count from the end (`-1` is last).
    pub fn at(&self, index: isize) -> Option<&NodeId> {
        let len = self.items.len() as isize;
        let index = if index < 0 { len + index } else { index };
        if index < 0 {
            return None;
        }
        self.items.get(index as usize)
    }

    pub fn position_of(&self, id: &NodeId) -> Option<usize> {
        self.items.iter().position(|item| item == id)
    }

    /// Whether length or order differs from the committed baseline.
    pub fn membership_changed(&self) -> bool {
        self.items != self.base_items
    }

    pub fn factory(&self) -> Option<&Arc<NodeFactory>> {
        self.factory.as_ref()
    }

    pub(crate) fn set_factory(&mut self, factory: Arc<NodeFactory>) {
        self.factory = Some(factory);
    }

    pub(crate) fn items_mut(&mut self) -> &mut Vec<NodeId> {
        &mut self.items
    }

    pub(crate) fn commit(&mut self) {
        self.base_items = self.items.clone();
    }

    /// Restore the baseline; returns the items that were present before.
    pub(crate) fn revert(&mut self) -> Vec<NodeId> {
        std::mem::replace(&mut self.items, self.base_items.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn array_of(ids: &[&str]) -> ArrayNode {
        let mut node = ArrayNode::default();
        node.items_mut().extend(ids.iter().map(|id| NodeId::from(*id)));
        node
    }

    #[test]
    fn test_negative_at() {
        let node = array_of(&["a", "b", "c"]);
        assert_eq!(node.at(-1).map(NodeId::as_str), Some("c"));
        assert_eq!(node.at(-3).map(NodeId::as_str), Some("a"));
        assert_eq!(node.at(-4), None);
        assert_eq!(node.at(3), None);
        assert_eq!(node.at(0).map(NodeId::as_str), Some("a"));
    }

    #[test]
    fn test_membership_changed_tracks_order() {
        let mut node = array_of(&["a", "b"]);
        node.commit();
        node.items_mut().swap(0, 1);
        assert!(node.membership_changed());
        let previous = node.revert();
        assert_eq!(previous, vec![NodeId::from("b"), NodeId::from("a")]);
        assert!(!node.membership_changed());
    }
}
