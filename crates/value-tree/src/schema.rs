//! Schema definitions consumed by the node factory.
//!
//! A [`SchemaDefinition`] is the JSON-Schema-like description of one node:
//! its type, default, constraints and, for primitives, an optional formula
//! (`x-formula`). It deserializes from its JSON form with `serde`, and a
//! fluent builder covers the common shapes:
//!
//! ```
//! use value_tree::SchemaDefinition;
//!
//! let schema = SchemaDefinition::object([
//!     ("price", SchemaDefinition::number()),
//!     ("quantity", SchemaDefinition::number().with_default(1)),
//!     ("total", SchemaDefinition::number().with_formula("price * quantity")),
//! ]);
//! assert_eq!(schema.schema_type(), "object");
//! assert!(schema.property("total").unwrap().formula.is_some());
//! ```

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const TYPE_OBJECT: &str = "object";
pub const TYPE_ARRAY: &str = "array";
pub const TYPE_STRING: &str = "string";
pub const TYPE_NUMBER: &str = "number";
pub const TYPE_BOOLEAN: &str = "boolean";

/// A computed-field declaration: `{"version": 1, "expression": "a + b"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaDefinition {
    #[serde(default = "default_formula_version")]
    pub version: u32,
    pub expression: String,
}

fn default_formula_version() -> u32 {
    1
}

impl FormulaDefinition {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            version: default_formula_version(),
            expression: expression.into(),
        }
    }
}

/// `additionalProperties`: either a flag or the schema of extra members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AdditionalProperties {
    Allowed(bool),
    Schema(Arc<SchemaDefinition>),
}

fn is_false(flag: &bool) -> bool {
    !*flag
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDefinition {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    pub ref_: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub read_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, Arc<SchemaDefinition>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Arc<SchemaDefinition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<AdditionalProperties>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<String>,
    #[serde(rename = "x-formula", default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<FormulaDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_: Option<Vec<Value>>,
}

impl SchemaDefinition {
    /// Deserialize a schema from its JSON form.
    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    // ------------------------------------------------------------------
    // Builders

    pub fn of_type(type_: impl Into<String>) -> Self {
        Self {
            type_: Some(type_.into()),
            ..Self::default()
        }
    }

    pub fn string() -> Self {
        Self::of_type(TYPE_STRING)
    }

    pub fn number() -> Self {
        Self::of_type(TYPE_NUMBER)
    }

    pub fn boolean() -> Self {
        Self::of_type(TYPE_BOOLEAN)
    }

    pub fn object<K, I>(properties: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, SchemaDefinition)>,
    {
        Self {
            type_: Some(TYPE_OBJECT.to_string()),
            properties: Some(
                properties
                    .into_iter()
                    .map(|(name, schema)| (name.into(), Arc::new(schema)))
                    .collect(),
            ),
            ..Self::default()
        }
    }

    pub fn array(items: SchemaDefinition) -> Self {
        Self {
            type_: Some(TYPE_ARRAY.to_string()),
            items: Some(Arc::new(items)),
            ..Self::default()
        }
    }

    pub fn reference(ref_: impl Into<String>) -> Self {
        Self {
            ref_: Some(ref_.into()),
            ..Self::default()
        }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_formula(mut self, expression: impl Into<String>) -> Self {
        self.formula = Some(FormulaDefinition::new(expression));
        self
    }

    pub fn with_read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn with_required<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.required = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_minimum(mut self, minimum: f64) -> Self {
        self.minimum = Some(minimum);
        self
    }

    pub fn with_maximum(mut self, maximum: f64) -> Self {
        self.maximum = Some(maximum);
        self
    }

    pub fn with_min_length(mut self, min_length: usize) -> Self {
        self.min_length = Some(min_length);
        self
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn with_enum(mut self, values: impl IntoIterator<Item = Value>) -> Self {
        self.enum_ = Some(values.into_iter().collect());
        self
    }

    pub fn with_foreign_key(mut self, table: impl Into<String>) -> Self {
        self.foreign_key = Some(table.into());
        self
    }

    pub fn with_additional_properties(mut self, schema: SchemaDefinition) -> Self {
        self.additional_properties = Some(AdditionalProperties::Schema(Arc::new(schema)));
        self
    }

    // ------------------------------------------------------------------
    // Queries

    /// The declared type, `"object"` when absent.
    pub fn schema_type(&self) -> &str {
        self.type_.as_deref().unwrap_or(TYPE_OBJECT)
    }

    pub fn property(&self, name: &str) -> Option<&Arc<SchemaDefinition>> {
        self.properties.as_ref().and_then(|props| props.get(name))
    }

    /// Schema for extra object members, when `additionalProperties` is a schema.
    pub fn additional_property_schema(&self) -> Option<&Arc<SchemaDefinition>> {
        match &self.additional_properties {
            Some(AdditionalProperties::Schema(schema)) => Some(schema),
            _ => None,
        }
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required
            .as_ref()
            .is_some_and(|names| names.iter().any(|n| n == name))
    }

    pub fn has_formula(&self) -> bool {
        self.formula.is_some()
    }

    /// The zero value of the declared type.
    pub fn type_default(&self) -> Value {
        match self.schema_type() {
            TYPE_STRING => Value::String(String::new()),
            TYPE_NUMBER => Value::from(0),
            TYPE_BOOLEAN => Value::Bool(false),
            TYPE_ARRAY => Value::Array(Vec::new()),
            TYPE_OBJECT => Value::Object(Map::new()),
            _ => Value::Null,
        }
    }

    /// `default` when declared, otherwise the type's zero value.
    pub fn default_value(&self) -> Value {
        match &self.default {
            Some(value) if !value.is_null() => value.clone(),
            _ => self.type_default(),
        }
    }
}
