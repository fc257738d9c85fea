//! Keeps formula fields consistent with what they read.
//!
//! Lifecycle:
//!
//! ```text
//! Uninitialized --initialize--> Initialized --dispose--> Disposed
//!                                   |   ^
//!                                   +---+ reinitialize (array length change)
//! ```
//!
//! While initialized the engine holds one value watch per distinct
//! dependency and one length watch per array in the tree. Value changes
//! recompute the affected fields in evaluation order; any length change
//! throws the whole setup away and rebuilds it.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::collector::FormulaCollector;
use super::context::ExpressionEvaluator;
use super::evaluator::{FormulaErrorCallback, FormulaEvaluator};
use super::field::FormulaField;
use super::graph::DependencyGraph;
use crate::error::Result;
use crate::node::NodeId;
use crate::store::NodeStore;
use crate::watch::{NodeEvent, Subscription, WatchKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Initialized,
    Disposed,
}

#[derive(Clone, Default)]
pub struct FormulaEngineOptions {
    /// Invoked for every failing expression, after the field has been reset.
    pub on_error: Option<FormulaErrorCallback>,
}

impl fmt::Debug for FormulaEngineOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormulaEngineOptions")
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

#[derive(Debug)]
pub struct FormulaEngine {
    evaluator: FormulaEvaluator,
    state: EngineState,
    fields: Vec<FormulaField>,
    graph: DependencyGraph,
    subscriptions: Vec<Subscription>,
    evaluations: u64,
}

impl FormulaEngine {
    pub fn new(expressions: Arc<dyn ExpressionEvaluator>) -> Self {
        Self::with_options(expressions, FormulaEngineOptions::default())
    }

    pub fn with_options(expressions: Arc<dyn ExpressionEvaluator>, options: FormulaEngineOptions) -> Self {
        Self {
            evaluator: FormulaEvaluator::new(expressions).with_error_callback(options.on_error),
            state: EngineState::Uninitialized,
            fields: Vec::new(),
            graph: DependencyGraph::default(),
            subscriptions: Vec::new(),
            evaluations: 0,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn fields(&self) -> &[FormulaField] {
        &self.fields
    }

    pub fn field_of(&self, node: &NodeId) -> Option<&FormulaField> {
        self.fields.iter().find(|field| &field.node == node)
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Total field evaluations since construction.
    pub fn evaluation_count(&self) -> u64 {
        self.evaluations
    }

    /// Collect, order, evaluate everything and subscribe.
    ///
    /// The first initialization over a clean tree makes the computed values
    /// part of the committed baseline, so a freshly loaded tree is not
    /// dirty. Over a dirty tree the baseline is left alone.
    pub fn initialize(&mut self, store: &mut NodeStore, root: &NodeId) -> Result<()> {
        let rebase = self.state == EngineState::Uninitialized && !store.is_dirty(root);
        self.setup(store, root, rebase)
    }

    /// Drop every subscription and start over.
    pub fn reinitialize(&mut self, store: &mut NodeStore, root: &NodeId) -> Result<()> {
        debug!("reinitializing formula engine");
        self.setup(store, root, false)
    }

    /// Start over after the inputs were reverted to their baseline. The
    /// recomputed values become the baseline of their nodes.
    pub fn reinitialize_baseline(&mut self, store: &mut NodeStore, root: &NodeId) -> Result<()> {
        debug!("reinitializing formula engine on the baseline");
        self.setup(store, root, true)
    }

    fn setup(&mut self, store: &mut NodeStore, root: &NodeId, rebase: bool) -> Result<()> {
        self.subscriptions.clear();
        self.fields = FormulaCollector::new(store, root, self.evaluator.expressions()).collect();
        self.graph = DependencyGraph::build(&self.fields);

        let order = self.graph.evaluation_order().to_vec();
        self.evaluate_batch(store, root, &order, rebase)?;

        let watchers = store.watchers().clone();
        for dependency in self.graph.dependencies() {
            self.subscriptions
                .push(watchers.watch(dependency.clone(), WatchKind::Value));
        }
        for id in store.subtree(root) {
            if store.node(&id).is_some_and(|n| n.is_array()) {
                self.subscriptions.push(watchers.watch(id, WatchKind::Length));
            }
        }

        self.state = EngineState::Initialized;
        debug!(
            fields = self.fields.len(),
            subscriptions = self.subscriptions.len(),
            "formula engine initialized"
        );
        Ok(())
    }

    /// React to queued node events.
    pub fn handle_events(&mut self, store: &mut NodeStore, root: &NodeId, events: &[NodeEvent]) -> Result<()> {
        if self.state != EngineState::Initialized || events.is_empty() {
            return Ok(());
        }
        if events.iter().any(|e| matches!(e, NodeEvent::LengthChanged(_))) {
            return self.reinitialize(store, root);
        }
        let changed = events.iter().map(NodeEvent::target);
        let affected = self.graph.affected_by_any(changed, &self.fields);
        debug!(events = events.len(), affected = affected.len(), "recalculating formulas");
        self.evaluate_batch(store, root, &affected, false)
    }

    /// Re-evaluate every field in order.
    pub fn recalculate_all(&mut self, store: &mut NodeStore, root: &NodeId) -> Result<()> {
        let order = self.graph.evaluation_order().to_vec();
        self.evaluate_batch(store, root, &order, false)
    }

    /// Evaluate `batch` with notifications muted so that the batch lands
    /// as one unit.
    fn evaluate_batch(&mut self, store: &mut NodeStore, root: &NodeId, batch: &[usize], rebase: bool) -> Result<()> {
        let watchers = store.watchers().clone();
        let _mute = watchers.mute();
        for &index in batch {
            let Some(field) = self.fields.get(index) else {
                continue;
            };
            if !store.contains(&field.node) {
                continue;
            }
            self.evaluator.evaluate(store, root, field, rebase)?;
            self.evaluations += 1;
        }
        Ok(())
    }

    /// Drop subscriptions and fields. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        if self.state == EngineState::Disposed {
            return;
        }
        self.subscriptions.clear();
        self.fields.clear();
        self.graph = DependencyGraph::default();
        self.state = EngineState::Disposed;
        debug!("formula engine disposed");
    }
}
