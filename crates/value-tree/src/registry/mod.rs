//! Rule-matched registries keyed on schema shape.
//!
//! Each registry is an ordered list of `(name, matcher, handler)` rules;
//! the first rule whose matcher accepts a schema wins.

mod change_handler;
mod defaults;
mod serializer;

pub use change_handler::{ChangeHandlerFn, ChangeHandlerRegistry};
pub use defaults::{DefaultValueFn, DefaultValueRegistry};
pub use serializer::{SerializeFn, SerializerRegistry};

use std::fmt;

use crate::schema::SchemaDefinition;

pub type SchemaMatcher = dyn Fn(&SchemaDefinition) -> bool + Send + Sync;

pub struct Rule<H> {
    name: String,
    matcher: Box<SchemaMatcher>,
    handler: H,
}

impl<H> Rule<H> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matches(&self, schema: &SchemaDefinition) -> bool {
        (self.matcher)(schema)
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }
}

pub struct RuleRegistry<H> {
    rules: Vec<Rule<H>>,
}

impl<H> Default for RuleRegistry<H> {
    fn default() -> Self {
        Self { rules: Vec::new() }
    }
}

impl<H> fmt::Debug for RuleRegistry<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl<H> RuleRegistry<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule; it is consulted after every existing rule.
    pub fn register<M>(&mut self, name: impl Into<String>, matcher: M, handler: H)
    where
        M: Fn(&SchemaDefinition) -> bool + Send + Sync + 'static,
    {
        let len = self.rules.len();
        self.insert(len, name, matcher, handler);
    }

    /// Insert a rule at `position` (clamped to the end).
    pub fn insert<M>(&mut self, position: usize, name: impl Into<String>, matcher: M, handler: H)
    where
        M: Fn(&SchemaDefinition) -> bool + Send + Sync + 'static,
    {
        let position = position.min(self.rules.len());
        self.rules.insert(
            position,
            Rule {
                name: name.into(),
                matcher: Box::new(matcher),
                handler,
            },
        );
    }

    pub fn find_rule(&self, schema: &SchemaDefinition) -> Option<&Rule<H>> {
        self.rules.iter().find(|rule| rule.matches(schema))
    }

    pub fn find(&self, schema: &SchemaDefinition) -> Option<&H> {
        self.find_rule(schema).map(Rule::handler)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(Rule::name)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
