//! Change notification for nodes.
//!
//! Listeners register interest in a node's value or an array's length and
//! get back a [`Subscription`]. Dropping the subscription unregisters it.
//! When a watched node changes, the store queues a [`NodeEvent`]; the owner
//! of the store drains the queue with [`Watchers::take_pending`] once the
//! mutation has completed and dispatches it to the listener.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::node::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchKind {
    /// A primitive's value.
    Value,
    /// An array's length.
    Length,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeEvent {
    ValueChanged(NodeId),
    LengthChanged(NodeId),
}

impl NodeEvent {
    pub fn target(&self) -> &NodeId {
        match self {
            Self::ValueChanged(id) | Self::LengthChanged(id) => id,
        }
    }

    pub fn kind(&self) -> WatchKind {
        match self {
            Self::ValueChanged(_) => WatchKind::Value,
            Self::LengthChanged(_) => WatchKind::Length,
        }
    }
}

#[derive(Debug, Default)]
struct WatchRegistry {
    next_id: u64,
    watches: HashMap<u64, (NodeId, WatchKind)>,
    counts: HashMap<(NodeId, WatchKind), usize>,
    pending: Vec<NodeEvent>,
    muted: usize,
}

impl WatchRegistry {
    fn remove(&mut self, id: u64) {
        let Some(key) = self.watches.remove(&id) else {
            return;
        };
        if let Some(count) = self.counts.get_mut(&key) {
            *count -= 1;
            if *count == 0 {
                self.counts.remove(&key);
            }
        }
    }
}

/// Shared watch registry of a node store.
#[derive(Debug, Clone, Default)]
pub struct Watchers {
    registry: Rc<RefCell<WatchRegistry>>,
}

impl Watchers {
    pub fn watch(&self, target: NodeId, kind: WatchKind) -> Subscription {
        let mut registry = self.registry.borrow_mut();
        registry.next_id += 1;
        let id = registry.next_id;
        *registry.counts.entry((target.clone(), kind)).or_insert(0) += 1;
        registry.watches.insert(id, (target, kind));
        Subscription {
            id,
            registry: Rc::downgrade(&self.registry),
        }
    }

    pub fn is_watched(&self, target: &NodeId, kind: WatchKind) -> bool {
        self.registry
            .borrow()
            .counts
            .contains_key(&(target.clone(), kind))
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.registry.borrow().watches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queue `event` if someone watches its target and notifications are
    /// not muted. Duplicate pending events collapse into one.
    pub(crate) fn emit(&self, event: NodeEvent) {
        let mut registry = self.registry.borrow_mut();
        if registry.muted > 0 {
            return;
        }
        if !registry
            .counts
            .contains_key(&(event.target().clone(), event.kind()))
        {
            return;
        }
        if !registry.pending.contains(&event) {
            registry.pending.push(event);
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.registry.borrow().pending.is_empty()
    }

    /// Drain queued events in the order they occurred.
    pub fn take_pending(&self) -> Vec<NodeEvent> {
        std::mem::take(&mut self.registry.borrow_mut().pending)
    }

    /// Suppress notifications until the guard is dropped.
    pub fn mute(&self) -> MuteGuard {
        self.registry.borrow_mut().muted += 1;
        MuteGuard {
            registry: Rc::clone(&self.registry),
        }
    }
}

/// Keeps notifications muted while alive.
#[must_use = "notifications are unmuted as soon as the guard is dropped"]
pub struct MuteGuard {
    registry: Rc<RefCell<WatchRegistry>>,
}

impl Drop for MuteGuard {
    fn drop(&mut self) {
        let mut registry = self.registry.borrow_mut();
        registry.muted = registry.muted.saturating_sub(1);
    }
}

/// Handle to one registered watch; unregisters on drop.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Weak<RefCell<WatchRegistry>>,
}

impl Subscription {
    pub fn target(&self) -> Option<(NodeId, WatchKind)> {
        let registry = self.registry.upgrade()?;
        let registry = registry.borrow();
        registry.watches.get(&self.id).cloned()
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.borrow_mut().remove(self.id);
        }
    }
}
