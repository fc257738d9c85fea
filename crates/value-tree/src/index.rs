//! Id lookup and path cache for one tree.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use tracing::trace;
use value_path::Path;

use crate::node::{NodeId, ValueNode};
use crate::store::NodeStore;

/// Which ids belong to the tree rooted at `root`, plus lazily computed
/// paths.
///
/// Paths of nodes that sit anywhere below an array are never cached: a
/// sibling insert or remove shifts their index without touching them.
/// Everything else is cached on first use and must be evicted with
/// [`TreeIndex::invalidate_paths_under`] (or a [`TreeIndex::rebuild`]) after
/// a structural change.
#[derive(Debug)]
pub struct TreeIndex {
    root: NodeId,
    ids: RefCell<HashSet<NodeId>>,
    paths: RefCell<HashMap<NodeId, Path>>,
}

impl TreeIndex {
    pub fn build(store: &NodeStore, root: NodeId) -> Self {
        let index = Self {
            root,
            ids: RefCell::default(),
            paths: RefCell::default(),
        };
        index.rebuild(store);
        index
    }

    pub fn root(&self) -> &NodeId {
        &self.root
    }

    /// Re-walk the tree and drop every cached path.
    pub fn rebuild(&self, store: &NodeStore) {
        let ids: HashSet<NodeId> = store.subtree(&self.root).into_iter().collect();
        trace!(count = ids.len(), "rebuilt tree index");
        *self.ids.borrow_mut() = ids;
        self.paths.borrow_mut().clear();
    }

    /// Add `id` and its subtree.
    pub fn register(&self, store: &NodeStore, id: &NodeId) {
        self.ids.borrow_mut().extend(store.subtree(id));
    }

    /// Forget `id` and its subtree.
    pub fn unregister(&self, store: &NodeStore, id: &NodeId) {
        let mut ids = self.ids.borrow_mut();
        let mut paths = self.paths.borrow_mut();
        for node in store.subtree(id) {
            paths.remove(&node);
            ids.remove(&node);
        }
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.ids.borrow().contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.borrow().is_empty()
    }

    /// Look up a node of this tree, rebuilding once before giving up.
    pub fn node_by_id<'s>(&self, store: &'s NodeStore, id: &NodeId) -> Option<&'s ValueNode> {
        if !self.contains(id) {
            self.rebuild(store);
            if !self.contains(id) {
                return None;
            }
        }
        store.node(id)
    }

    pub fn path_of(&self, store: &NodeStore, id: &NodeId) -> Path {
        if store.has_array_ancestor(id) {
            return store.path_of(id);
        }
        if let Some(path) = self.paths.borrow().get(id) {
            return path.clone();
        }
        let path = store.path_of(id);
        self.paths.borrow_mut().insert(id.clone(), path.clone());
        path
    }

    /// Evict cached paths of `id` and everything beneath it.
    pub fn invalidate_paths_under(&self, store: &NodeStore, id: &NodeId) {
        let mut paths = self.paths.borrow_mut();
        for node in store.subtree(id) {
            paths.remove(&node);
        }
    }

    pub fn cached_path_count(&self) -> usize {
        self.paths.borrow().len()
    }
}
