//! Route path grammar: normalization, segment parsing, and the escape
//! rules shared by insertion, matching, and reverse lookup.

use std::sync::Arc;

/// Ensure a registered or requested path begins with `/`.
pub(crate) fn normalize(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

/// One piece of a parsed route path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    Static(String),
    Param(Arc<str>),
    Any,
}

/// Split a normalized path into static/param/any segments.
///
/// `:` and `*` are only treated as markers when they begin a segment (the
/// position right after `/`, or the very start of the path); elsewhere
/// they're ordinary characters. `\:` is the escape for a literal colon at
/// a segment boundary.
pub(crate) fn segments(path: &str) -> Vec<Segment> {
    let mut out = Vec::new();
    let bytes = path.as_bytes();
    let mut run_start = 0usize;
    let mut literal = String::new();
    let mut at_boundary = true;
    let mut i = 0usize;

    while i < bytes.len() {
        let b = bytes[i];
        if at_boundary && b == b':' {
            literal.push_str(&path[run_start..i]);
            if !literal.is_empty() {
                out.push(Segment::Static(std::mem::take(&mut literal)));
            }
            let start = i + 1;
            let mut end = start;
            while end < bytes.len() && bytes[end] != b'/' {
                end += 1;
            }
            out.push(Segment::Param(Arc::from(&path[start..end])));
            i = end;
            run_start = i;
            at_boundary = false;
            continue;
        }
        if at_boundary && b == b'*' {
            literal.push_str(&path[run_start..i]);
            if !literal.is_empty() {
                out.push(Segment::Static(std::mem::take(&mut literal)));
            }
            out.push(Segment::Any);
            // `*` consumes the remainder of the request path verbatim, so
            // anything registered after it in the pattern is unreachable;
            // stop parsing rather than carry dead segments downstream.
            return out;
        }
        if b == b'\\' && i + 1 < bytes.len() && bytes[i + 1] == b':' {
            literal.push_str(&path[run_start..i]);
            literal.push(':');
            i += 2;
            run_start = i;
            at_boundary = false;
            continue;
        }
        at_boundary = b == b'/';
        i += 1;
    }
    literal.push_str(&path[run_start..]);
    if !literal.is_empty() {
        out.push(Segment::Static(literal));
    }
    out
}

/// Ordered parameter names declared by a path (`:name` segments and `*`,
/// which is always named `"*"`).
pub(crate) fn param_names(path: &str) -> Arc<[Arc<str>]> {
    segments(path)
        .into_iter()
        .filter_map(|s| match s {
            Segment::Param(name) => Some(name),
            Segment::Any => Some(Arc::from("*")),
            Segment::Static(_) => None,
        })
        .collect()
}

/// Decode a single `%XX` percent-escape sequence; non-hex or truncated
/// sequences are left untouched.
pub(crate) fn percent_decode(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = &value[i + 1..i + 3];
            if let Ok(byte) = u8::from_str_radix(hex, 16) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Render a registered path back into a concrete string, substituting
/// `values` in declaration order for each `:name`/`*` segment. If fewer
/// values are given than the path declares, the remaining segments are
/// emitted verbatim (`:name`, `*`).
pub(crate) fn reverse(path: &str, values: &[String]) -> String {
    let mut out = String::new();
    let mut values = values.iter();
    for seg in segments(path) {
        match seg {
            Segment::Static(s) => out.push_str(&s),
            Segment::Param(name) => match values.next() {
                Some(v) => out.push_str(v),
                None => {
                    out.push(':');
                    out.push_str(&name);
                }
            },
            Segment::Any => match values.next() {
                Some(v) => out.push_str(v),
                None => out.push('*'),
            },
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_static_param_any() {
        let segs = segments("/users/:id/files/*");
        assert_eq!(
            segs,
            vec![
                Segment::Static("/users/".into()),
                Segment::Param(Arc::from("id")),
                Segment::Static("/files/".into()),
                Segment::Any,
            ]
        );
    }

    #[test]
    fn escaped_colon_is_literal() {
        let segs = segments("/files/a\\:b");
        assert_eq!(segs, vec![Segment::Static("/files/a:b".into())]);
    }

    #[test]
    fn colon_mid_run_is_not_a_param() {
        let segs = segments("/file:undelete");
        assert_eq!(segs, vec![Segment::Static("/file:undelete".into())]);
    }

    #[test]
    fn reverse_substitutes_in_order() {
        let s = reverse("/users/:id/files/*", &["42".to_string(), "a/b.txt".to_string()]);
        assert_eq!(s, "/users/42/files/a/b.txt");
    }

    #[test]
    fn reverse_emits_placeholders_when_short_on_values() {
        let s = reverse("/users/:id", &[]);
        assert_eq!(s, "/users/:id");
    }
}
