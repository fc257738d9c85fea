use serde_json::Value;

use super::RuleRegistry;
use crate::schema::SchemaDefinition;

pub type SerializeFn = dyn Fn(&Value, &SchemaDefinition) -> Value + Send + Sync;

/// Output transforms for schema shapes such as dates or file references.
#[derive(Debug, Default)]
pub struct SerializerRegistry {
    rules: RuleRegistry<Box<SerializeFn>>,
}

impl SerializerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<M, F>(&mut self, name: impl Into<String>, matcher: M, serialize: F)
    where
        M: Fn(&SchemaDefinition) -> bool + Send + Sync + 'static,
        F: Fn(&Value, &SchemaDefinition) -> Value + Send + Sync + 'static,
    {
        self.rules.register(name, matcher, Box::new(serialize));
    }

    pub fn with<M, F>(mut self, name: impl Into<String>, matcher: M, serialize: F) -> Self
    where
        M: Fn(&SchemaDefinition) -> bool + Send + Sync + 'static,
        F: Fn(&Value, &SchemaDefinition) -> Value + Send + Sync + 'static,
    {
        self.register(name, matcher, serialize);
        self
    }

    /// Apply the first matching serializer; unmatched values pass through.
    pub fn serialize(&self, value: Value, schema: &SchemaDefinition) -> Value {
        match self.rules.find(schema) {
            Some(serialize) => serialize(&value, schema),
            None => value,
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
