//! Structured paths into a value tree.
//!
//! A [`Path`] is an immutable sequence of [`PathSegment`]s: a property name,
//! an array index, or a wildcard standing for "every item of this array".
//! Paths render two ways:
//!
//! - the *simple* form used by formulas and callers: `items[2].price`,
//!   `items[*].price`
//! - an RFC 6901 [JSON Pointer](https://tools.ietf.org/html/rfc6901):
//!   `/items/2/price`
//!
//! # Example
//!
//! ```
//! use value_path::{Path, PathSegment};
//!
//! let path: Path = "items[2].price".parse().unwrap();
//! assert_eq!(path.len(), 3);
//! assert_eq!(path.segments()[1], PathSegment::Index(2));
//! assert_eq!(path.as_simple_string(), "items[2].price");
//! assert_eq!(path.as_json_pointer(), "/items/2/price");
//!
//! let parent: Path = "items".parse().unwrap();
//! assert!(path.is_child_of(&parent));
//! ```

use thiserror::Error;

pub mod parse;
pub mod path;
pub mod pointer;

pub use parse::parse_simple_path;
pub use path::{Path, PathSegment};
pub use pointer::{escape_component, format_json_pointer, parse_json_pointer, unescape_component};

/// Errors produced while parsing a path string.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("empty segment at offset {0}")]
    EmptySegment(usize),
    #[error("unclosed bracket at offset {0}")]
    UnclosedBracket(usize),
    #[error("invalid index `{index}` at offset {offset}")]
    InvalidIndex { index: String, offset: usize },
    #[error("unexpected character `{ch}` at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },
    #[error("NO_PARENT")]
    NoParent,
}

/// Check if a string represents a valid non-negative integer array index.
///
/// Leading zeros are rejected, except for `"0"` itself.
///
/// ```
/// use value_path::is_valid_index;
///
/// assert!(is_valid_index("0"));
/// assert!(is_valid_index("123"));
/// assert!(!is_valid_index("01"));
/// assert!(!is_valid_index("-1"));
/// assert!(!is_valid_index("abc"));
/// ```
pub fn is_valid_index(index: &str) -> bool {
    if index.is_empty() {
        return false;
    }
    let bytes = index.as_bytes();
    if bytes.len() > 1 && bytes[0] == b'0' {
        return false;
    }
    bytes.iter().all(|b| b.is_ascii_digit())
}
