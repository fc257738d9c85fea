//! The [`Path`] value type.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::parse::parse_simple_path;
use crate::pointer::{format_json_pointer, parse_json_pointer};
use crate::{is_valid_index, PathError};

/// One step of a [`Path`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathSegment {
    /// An object property name.
    Property(String),
    /// A position in an array.
    Index(usize),
    /// Every item of an array.
    Wildcard,
}

impl PathSegment {
    pub fn property(name: impl Into<String>) -> Self {
        Self::Property(name.into())
    }

    pub fn is_property(&self) -> bool {
        matches!(self, Self::Property(_))
    }

    pub fn is_index(&self) -> bool {
        matches!(self, Self::Index(_))
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::Wildcard)
    }

    pub fn as_property(&self) -> Option<&str> {
        match self {
            Self::Property(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            Self::Index(index) => Some(*index),
            _ => None,
        }
    }

    /// The raw JSON Pointer component for this segment (unescaped).
    fn pointer_component(&self) -> String {
        match self {
            Self::Property(name) => name.clone(),
            Self::Index(index) => index.to_string(),
            Self::Wildcard => "*".to_string(),
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Property(name) => f.write_str(name),
            Self::Index(index) => write!(f, "[{index}]"),
            Self::Wildcard => f.write_str("[*]"),
        }
    }
}

/// An immutable location in a value tree.
///
/// Equality and prefix checks are structural. The empty path is the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    segments: Vec<PathSegment>,
}

impl Path {
    /// The root path.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn from_segments(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }

    /// Build a path from JSON Pointer components.
    ///
    /// Components that are valid array indices become [`PathSegment::Index`],
    /// `*` becomes [`PathSegment::Wildcard`], and everything else a property.
    pub fn from_json_pointer(pointer: &str) -> Self {
        parse_json_pointer(pointer)
            .into_iter()
            .map(|component| {
                if component == "*" {
                    PathSegment::Wildcard
                } else if is_valid_index(&component) {
                    match component.parse() {
                        Ok(index) => PathSegment::Index(index),
                        Err(_) => PathSegment::Property(component),
                    }
                } else {
                    PathSegment::Property(component)
                }
            })
            .collect()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Alias of [`Path::is_empty`].
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn last(&self) -> Option<&PathSegment> {
        self.segments.last()
    }

    /// A new path with `segment` appended.
    pub fn join(&self, segment: PathSegment) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend_from_slice(&self.segments);
        segments.push(segment);
        Self { segments }
    }

    pub fn child(&self, name: impl Into<String>) -> Self {
        self.join(PathSegment::Property(name.into()))
    }

    pub fn child_index(&self, index: usize) -> Self {
        self.join(PathSegment::Index(index))
    }

    pub fn child_wildcard(&self) -> Self {
        self.join(PathSegment::Wildcard)
    }

    /// A new path with all of `other`'s segments appended.
    pub fn concat(&self, other: &Path) -> Self {
        let mut segments = self.segments.clone();
        segments.extend_from_slice(&other.segments);
        Self { segments }
    }

    /// The enclosing path.
    ///
    /// ```
    /// use value_path::Path;
    ///
    /// let path: Path = "a.b[1]".parse().unwrap();
    /// assert_eq!(path.parent().unwrap().as_simple_string(), "a.b");
    /// assert!(Path::root().parent().is_err());
    /// ```
    pub fn parent(&self) -> Result<Self, PathError> {
        match self.segments.split_last() {
            Some((_, init)) => Ok(Self {
                segments: init.to_vec(),
            }),
            None => Err(PathError::NoParent),
        }
    }

    /// Whether `prefix` is a (non-strict) prefix of this path.
    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }

    /// Whether this path lies strictly beneath `parent`.
    pub fn is_child_of(&self, parent: &Path) -> bool {
        self.segments.len() > parent.segments.len() && self.starts_with(parent)
    }

    pub fn has_wildcard(&self) -> bool {
        self.segments.iter().any(PathSegment::is_wildcard)
    }

    /// Dotted/bracket rendering: `a.b[2]`, `items[*].price`.
    pub fn as_simple_string(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            if let PathSegment::Property(name) = segment {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(name);
            } else {
                out.push_str(&segment.to_string());
            }
        }
        out
    }

    /// RFC 6901 rendering: `/a/b/2`. The root renders as `""`.
    pub fn as_json_pointer(&self) -> String {
        let components: Vec<String> = self
            .segments
            .iter()
            .map(PathSegment::pointer_component)
            .collect();
        format_json_pointer(&components)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_simple_string())
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_simple_path(s)
    }
}

impl From<Vec<PathSegment>> for Path {
    fn from(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }
}

impl FromIterator<PathSegment> for Path {
    fn from_iter<I: IntoIterator<Item = PathSegment>>(iter: I) -> Self {
        Self {
            segments: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a PathSegment;
    type IntoIter = std::slice::Iter<'a, PathSegment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}

impl Serialize for Path {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_simple_string())
    }
}

impl<'de> Deserialize<'de> for Path {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
