//! Schema rule checks.
//!
//! Diagnostics are computed on demand from a node's schema and current
//! value. They never fail and never block edits.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock, PoisonError};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use crate::node::{NodeId, NodeKind};
use crate::store::NodeStore;
use crate::value::{number_to_json, PrimitiveValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// One validation finding: `{severity, type, message, path, params?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    #[serde(rename = "type")]
    pub type_: String,
    pub message: String,
    /// Simple-form path of the offending node.
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Diagnostic {
    fn error(type_: &str, message: String, path: String, params: Option<Value>) -> Self {
        Self {
            severity: Severity::Error,
            type_: type_.to_string(),
            message,
            path,
            params,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Diagnostics raised by `id` itself, not its descendants.
pub(crate) fn node_diagnostics(store: &NodeStore, id: &NodeId) -> Vec<Diagnostic> {
    let Some(node) = store.node(id) else {
        return Vec::new();
    };
    let schema = node.schema();
    let path = store.path_of(id);
    let mut out = Vec::new();

    match node.kind() {
        NodeKind::Object(object) => {
            for name in schema.required.iter().flatten() {
                let missing = match object.child(name).and_then(|c| store.node(c)) {
                    None => true,
                    Some(child) => child
                        .as_primitive()
                        .and_then(|p| p.value().as_str())
                        .is_some_and(str::is_empty),
                };
                if missing {
                    out.push(Diagnostic::error(
                        "required",
                        format!("`{name}` is required"),
                        path.child(name.as_str()).as_simple_string(),
                        None,
                    ));
                }
            }
        }
        NodeKind::Array(_) => {}
        NodeKind::Primitive(primitive) => {
            let path = path.as_simple_string();
            let value = primitive.value();
            match value {
                PrimitiveValue::Number(n) => {
                    if let Some(minimum) = schema.minimum.filter(|min| n < min) {
                        out.push(Diagnostic::error(
                            "minimum",
                            format!("must be at least {minimum}"),
                            path.clone(),
                            Some(json!({"minimum": number_to_json(minimum)})),
                        ));
                    }
                    if let Some(maximum) = schema.maximum.filter(|max| n > max) {
                        out.push(Diagnostic::error(
                            "maximum",
                            format!("must be at most {maximum}"),
                            path.clone(),
                            Some(json!({"maximum": number_to_json(maximum)})),
                        ));
                    }
                }
                PrimitiveValue::String(s) => {
                    let len = s.chars().count();
                    if let Some(min) = schema.min_length.filter(|min| len < *min) {
                        out.push(Diagnostic::error(
                            "minLength",
                            format!("must be at least {min} characters"),
                            path.clone(),
                            Some(json!({"minLength": min})),
                        ));
                    }
                    if let Some(max) = schema.max_length.filter(|max| len > *max) {
                        out.push(Diagnostic::error(
                            "maxLength",
                            format!("must be at most {max} characters"),
                            path.clone(),
                            Some(json!({"maxLength": max})),
                        ));
                    }
                    if let Some(pattern) = &schema.pattern {
                        match compiled_pattern(pattern) {
                            Ok(re) if !re.is_match(s) => out.push(Diagnostic::error(
                                "pattern",
                                format!("must match `{pattern}`"),
                                path.clone(),
                                Some(json!({"pattern": pattern})),
                            )),
                            Ok(_) => {}
                            Err(error) => {
                                warn!(node = %id, %pattern, %error, "invalid schema pattern");
                            }
                        }
                    }
                    if schema.foreign_key.is_some() && s.is_empty() {
                        out.push(Diagnostic::error(
                            "foreignKey",
                            "reference is empty".to_string(),
                            path.clone(),
                            Some(json!({"foreignKey": schema.foreign_key})),
                        ));
                    }
                }
                PrimitiveValue::Boolean(_) => {}
            }

            if let Some(allowed) = &schema.enum_ {
                let json = value.to_json();
                if !allowed.contains(&json) {
                    out.push(Diagnostic::error(
                        "enum",
                        "value is not one of the allowed values".to_string(),
                        path.clone(),
                        Some(json!({"enum": allowed})),
                    ));
                }
            }

            if let Some(warning) = primitive.formula_warning() {
                out.push(Diagnostic {
                    severity: Severity::Warning,
                    type_: "formula".to_string(),
                    message: warning.message.clone(),
                    path,
                    params: Some(json!({
                        "warningType": warning.warning_type,
                        "expression": warning.expression,
                    })),
                });
            }
        }
    }
    out
}

/// Compile `pattern` once per process.
fn compiled_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    static PATTERNS: OnceLock<Mutex<HashMap<String, Result<Regex, regex::Error>>>> = OnceLock::new();
    let mut patterns = PATTERNS
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    patterns
        .entry(pattern.to_string())
        .or_insert_with(|| Regex::new(pattern))
        .clone()
}
