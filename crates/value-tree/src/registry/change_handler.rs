use super::RuleRegistry;
use crate::change::Change;
use crate::schema::SchemaDefinition;

pub type ChangeHandlerFn = dyn Fn(&Change, &SchemaDefinition) + Send + Sync;

/// Side-effect hooks run after tracked changes.
///
/// The schema passed to a handler is the one of the node the change
/// targets: the written primitive, the added or removed property, or the
/// array for array operations.
#[derive(Debug, Default)]
pub struct ChangeHandlerRegistry {
    rules: RuleRegistry<Box<ChangeHandlerFn>>,
}

impl ChangeHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<M, F>(&mut self, name: impl Into<String>, matcher: M, handler: F)
    where
        M: Fn(&SchemaDefinition) -> bool + Send + Sync + 'static,
        F: Fn(&Change, &SchemaDefinition) + Send + Sync + 'static,
    {
        self.rules.register(name, matcher, Box::new(handler));
    }

    pub fn with<M, F>(mut self, name: impl Into<String>, matcher: M, handler: F) -> Self
    where
        M: Fn(&SchemaDefinition) -> bool + Send + Sync + 'static,
        F: Fn(&Change, &SchemaDefinition) + Send + Sync + 'static,
    {
        self.register(name, matcher, handler);
        self
    }

    /// Run the first matching handler; returns whether one ran.
    pub fn handle(&self, change: &Change, schema: &SchemaDefinition) -> bool {
        match self.rules.find(schema) {
            Some(handler) => {
                handler(change, schema);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
