//! RFC 6901 component escaping and pointer formatting.

/// Unescapes a JSON Pointer path component.
///
/// `~1` becomes `/` and `~0` becomes `~`.
///
/// ```
/// use value_path::unescape_component;
///
/// assert_eq!(unescape_component("a~0b"), "a~b");
/// assert_eq!(unescape_component("c~1d"), "c/d");
/// ```
pub fn unescape_component(component: &str) -> String {
    let mut out = String::with_capacity(component.len());
    let mut chars = component.chars().peekable();
    while let Some(c) = chars.next() {
        let decoded = match (c, chars.peek()) {
            ('~', Some('0')) => '~',
            ('~', Some('1')) => '/',
            _ => {
                out.push(c);
                continue;
            }
        };
        chars.next();
        out.push(decoded);
    }
    out
}

/// Escapes a JSON Pointer path component.
///
/// ```
/// use value_path::escape_component;
///
/// assert_eq!(escape_component("a~b"), "a~0b");
/// assert_eq!(escape_component("c/d"), "c~1d");
/// assert_eq!(escape_component("plain"), "plain");
/// ```
pub fn escape_component(component: &str) -> String {
    let mut out = String::with_capacity(component.len());
    for c in component.chars() {
        match c {
            '~' => out.push_str("~0"),
            '/' => out.push_str("~1"),
            _ => out.push(c),
        }
    }
    out
}

/// Format raw components into a JSON Pointer string.
///
/// The root (no components) renders as the empty string.
///
/// ```
/// use value_path::format_json_pointer;
///
/// assert_eq!(format_json_pointer::<&str>(&[]), "");
/// assert_eq!(format_json_pointer(&["a", "0", "b/c"]), "/a/0/b~1c");
/// ```
pub fn format_json_pointer<S: AsRef<str>>(components: &[S]) -> String {
    let mut out = String::new();
    for component in components {
        out.push('/');
        out.push_str(&escape_component(component.as_ref()));
    }
    out
}

/// Parse a JSON Pointer string into unescaped components.
///
/// An empty pointer is the root. A missing leading slash is tolerated.
///
/// ```
/// use value_path::parse_json_pointer;
///
/// assert_eq!(parse_json_pointer(""), Vec::<String>::new());
/// assert_eq!(parse_json_pointer("/a/b~1c"), vec!["a", "b/c"]);
/// assert_eq!(parse_json_pointer("a/0"), vec!["a", "0"]);
/// ```
pub fn parse_json_pointer(pointer: &str) -> Vec<String> {
    if pointer.is_empty() {
        return Vec::new();
    }
    let body = pointer.strip_prefix('/').unwrap_or(pointer);
    body.split('/').map(unescape_component).collect()
}
