//! Change log and its JSON Patch rendering.
//!
//! Every tracked mutation of a [`ValueTree`](crate::ValueTree) appends one
//! [`Change`]. The log renders to RFC 6902 operations one-to-one, in the
//! order the changes happened:
//!
//! | Change           | Patch                                     |
//! |------------------|-------------------------------------------|
//! | `SetValue`       | `replace` at the node                     |
//! | `AddProperty`    | `add` at the property                     |
//! | `RemoveProperty` | `remove` at the property                  |
//! | `ArrayPush`      | `add` at `<array>/-`                      |
//! | `ArrayInsert`    | `add` at `<array>/<index>`                |
//! | `ArrayRemove`    | `remove` at `<array>/<index>`             |
//! | `ArrayMove`      | `move` from `<array>/<from>` to `/<to>`   |
//! | `ArrayReplace`   | `replace` at `<array>/<index>`            |
//! | `ArrayClear`     | `replace` of the array with `[]`          |

use serde::{Deserialize, Serialize};
use serde_json::Value;
use value_path::Path;

// ── Change ────────────────────────────────────────────────────────────────

/// One semantic mutation. `path` is the written node, the property, or the
/// array the operation applied to.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    SetValue {
        path: Path,
        value: Value,
        old_value: Value,
    },
    AddProperty {
        path: Path,
        value: Value,
    },
    RemoveProperty {
        path: Path,
        old_value: Value,
    },
    ArrayPush {
        path: Path,
        value: Value,
    },
    ArrayInsert {
        path: Path,
        index: usize,
        value: Value,
    },
    ArrayRemove {
        path: Path,
        index: usize,
        old_value: Value,
    },
    ArrayMove {
        path: Path,
        from: usize,
        to: usize,
    },
    ArrayReplace {
        path: Path,
        index: usize,
        value: Value,
        old_value: Value,
    },
    ArrayClear {
        path: Path,
        old_value: Value,
    },
}

impl Change {
    pub fn path(&self) -> &Path {
        match self {
            Self::SetValue { path, .. }
            | Self::AddProperty { path, .. }
            | Self::RemoveProperty { path, .. }
            | Self::ArrayPush { path, .. }
            | Self::ArrayInsert { path, .. }
            | Self::ArrayRemove { path, .. }
            | Self::ArrayMove { path, .. }
            | Self::ArrayReplace { path, .. }
            | Self::ArrayClear { path, .. } => path,
        }
    }

    /// Short name, as used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SetValue { .. } => "setValue",
            Self::AddProperty { .. } => "addProperty",
            Self::RemoveProperty { .. } => "removeProperty",
            Self::ArrayPush { .. } => "arrayPush",
            Self::ArrayInsert { .. } => "arrayInsert",
            Self::ArrayRemove { .. } => "arrayRemove",
            Self::ArrayMove { .. } => "arrayMove",
            Self::ArrayReplace { .. } => "arrayReplace",
            Self::ArrayClear { .. } => "arrayClear",
        }
    }

    pub fn to_patch(&self) -> JsonPatch {
        match self {
            Self::SetValue { path, value, .. } => JsonPatch::replace(path.as_json_pointer(), value.clone()),
            Self::AddProperty { path, value } => JsonPatch::add(path.as_json_pointer(), value.clone()),
            Self::RemoveProperty { path, .. } => JsonPatch::remove(path.as_json_pointer()),
            Self::ArrayPush { path, value } => {
                JsonPatch::add(format!("{}/-", path.as_json_pointer()), value.clone())
            }
            Self::ArrayInsert { path, index, value } => {
                JsonPatch::add(path.child_index(*index).as_json_pointer(), value.clone())
            }
            Self::ArrayRemove { path, index, .. } => {
                JsonPatch::remove(path.child_index(*index).as_json_pointer())
            }
            Self::ArrayMove { path, from, to } => JsonPatch::move_(
                path.child_index(*from).as_json_pointer(),
                path.child_index(*to).as_json_pointer(),
            ),
            Self::ArrayReplace { path, index, value, .. } => {
                JsonPatch::replace(path.child_index(*index).as_json_pointer(), value.clone())
            }
            Self::ArrayClear { path, .. } => {
                JsonPatch::replace(path.as_json_pointer(), Value::Array(Vec::new()))
            }
        }
    }
}

// ── JsonPatch ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Remove,
    Replace,
    Move,
    Copy,
    Test,
}

/// One RFC 6902 operation: `{op, path, value?, from?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonPatch {
    pub op: PatchOp,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
}

impl JsonPatch {
    pub fn add(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: PatchOp::Add,
            path: path.into(),
            value: Some(value),
            from: None,
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            op: PatchOp::Remove,
            path: path.into(),
            value: None,
            from: None,
        }
    }

    pub fn replace(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: PatchOp::Replace,
            path: path.into(),
            value: Some(value),
            from: None,
        }
    }

    pub fn move_(from: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            op: PatchOp::Move,
            path: path.into(),
            value: None,
            from: Some(from.into()),
        }
    }
}

/// Serialize operations as a JSON Patch document.
pub fn to_json_patch(patches: &[JsonPatch]) -> Value {
    serde_json::to_value(patches).unwrap_or_else(|_| Value::Array(Vec::new()))
}

// ── ChangeTracker ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct ChangeTracker {
    changes: Vec<Change>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, change: Change) {
        self.changes.push(change);
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn clear(&mut self) {
        self.changes.clear();
    }

    pub fn patches(&self) -> Vec<JsonPatch> {
        self.changes.iter().map(Change::to_patch).collect()
    }
}
