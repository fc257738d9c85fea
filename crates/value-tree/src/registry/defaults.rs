use serde_json::Value;

use super::RuleRegistry;
use crate::schema::SchemaDefinition;

pub type DefaultValueFn = dyn Fn(&SchemaDefinition) -> Value + Send + Sync;

/// Defaults for schema shapes that declare none.
///
/// An explicit, non-null `default` in the schema always wins; otherwise the
/// first matching rule supplies the value, and the type's zero value is the
/// last resort.
#[derive(Debug, Default)]
pub struct DefaultValueRegistry {
    rules: RuleRegistry<Box<DefaultValueFn>>,
}

impl DefaultValueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<M, F>(&mut self, name: impl Into<String>, matcher: M, default: F)
    where
        M: Fn(&SchemaDefinition) -> bool + Send + Sync + 'static,
        F: Fn(&SchemaDefinition) -> Value + Send + Sync + 'static,
    {
        self.rules.register(name, matcher, Box::new(default));
    }

    pub fn with<M, F>(mut self, name: impl Into<String>, matcher: M, default: F) -> Self
    where
        M: Fn(&SchemaDefinition) -> bool + Send + Sync + 'static,
        F: Fn(&SchemaDefinition) -> Value + Send + Sync + 'static,
    {
        self.register(name, matcher, default);
        self
    }

    pub fn default_for(&self, schema: &SchemaDefinition) -> Value {
        if let Some(value) = schema.default.as_ref().filter(|v| !v.is_null()) {
            return value.clone();
        }
        match self.rules.find(schema) {
            Some(default) => default(schema),
            None => schema.type_default(),
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
