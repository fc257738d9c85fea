//! Parser for the simple path form (`a.b[2]`, `items[*].price`).

use crate::path::{Path, PathSegment};
use crate::PathError;

/// Parse a simple-form path.
///
/// Property names are separated by `.`; `[n]` is an array index and `[*]` a
/// wildcard. The empty string is the root. A path may start with a bracket
/// (`[0].name`) when the root is an array.
///
/// ```
/// use value_path::{parse_simple_path, PathSegment};
///
/// let path = parse_simple_path("rows[0].tags[*]").unwrap();
/// assert_eq!(
///     path.segments(),
///     &[
///         PathSegment::property("rows"),
///         PathSegment::Index(0),
///         PathSegment::property("tags"),
///         PathSegment::Wildcard,
///     ]
/// );
/// assert!(parse_simple_path("a..b").is_err());
/// assert!(parse_simple_path("a[1").is_err());
/// ```
pub fn parse_simple_path(input: &str) -> Result<Path, PathError> {
    let bytes = input.as_bytes();
    let mut segments = Vec::new();
    let mut pos = 0;

    if input.is_empty() {
        return Ok(Path::root());
    }

    // A leading bracket skips the first property.
    let mut expect_property = bytes[0] != b'[';

    while pos < bytes.len() {
        if expect_property {
            let start = pos;
            while pos < bytes.len() && bytes[pos] != b'.' && bytes[pos] != b'[' {
                if bytes[pos] == b']' {
                    return Err(PathError::UnexpectedChar { ch: ']', offset: pos });
                }
                pos += 1;
            }
            if pos == start {
                return Err(PathError::EmptySegment(start));
            }
            segments.push(PathSegment::Property(input[start..pos].to_string()));
            expect_property = false;
            continue;
        }

        match bytes[pos] {
            b'.' => {
                pos += 1;
                if pos == bytes.len() {
                    return Err(PathError::EmptySegment(pos));
                }
                expect_property = true;
            }
            b'[' => {
                let open = pos;
                let close = input[open..]
                    .find(']')
                    .map(|offset| open + offset)
                    .ok_or(PathError::UnclosedBracket(open))?;
                let inner = &input[open + 1..close];
                let segment = if inner == "*" {
                    PathSegment::Wildcard
                } else if !inner.is_empty() && inner.bytes().all(|b| b.is_ascii_digit()) {
                    let index = inner.parse().map_err(|_| PathError::InvalidIndex {
                        index: inner.to_string(),
                        offset: open + 1,
                    })?;
                    PathSegment::Index(index)
                } else {
                    return Err(PathError::InvalidIndex {
                        index: inner.to_string(),
                        offset: open + 1,
                    });
                };
                segments.push(segment);
                pos = close + 1;
            }
            _ => {
                let ch = input[pos..].chars().next().unwrap_or('\0');
                return Err(PathError::UnexpectedChar { ch, offset: pos });
            }
        }
    }

    Ok(Path::from_segments(segments))
}
