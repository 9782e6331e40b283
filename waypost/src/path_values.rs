use std::sync::Arc;

/// The ordered set of values a matched route captured from the request
/// path: one entry per `:name` or `*` segment, in declaration order.
///
/// Handlers receive their own copy; [`crate::RequestContext`] keeps one
/// too so middleware and handlers can both read captured values by name
/// without threading them through every call explicitly.
#[derive(Clone, Debug, Default)]
pub struct PathValues {
    values: Vec<(Arc<str>, String)>,
}

impl PathValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_capacity(cap: usize) -> Self {
        Self { values: Vec::with_capacity(cap) }
    }

    pub(crate) fn from_parts(names: &[Arc<str>], values: Vec<String>) -> Self {
        Self {
            values: names.iter().cloned().zip(values).collect(),
        }
    }

    /// Replace the contents in place: clears the backing `Vec` and refills
    /// it from `names`/`values`, so a capacity reserved by an earlier
    /// [`PathValues::with_capacity`]/[`PathValues::clear`] survives across
    /// requests instead of being dropped and reallocated.
    pub(crate) fn set_all(&mut self, names: &[Arc<str>], values: Vec<String>) {
        self.values.clear();
        self.values.extend(names.iter().cloned().zip(values));
    }

    /// The value captured for `name`, or `None` if no such parameter was
    /// declared on the matched route.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.iter().find(|(n, _)| n.as_ref() == name).map(|(_, v)| v.as_str())
    }

    /// Like [`PathValues::get`], falling back to `default` when absent.
    pub fn get_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.get(name).unwrap_or(default)
    }

    /// The `index`-th captured value, in path order (`*` counts as one).
    pub fn at(&self, index: usize) -> Option<&str> {
        self.values.get(index).map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(n, _)| n.as_ref())
    }

    pub(crate) fn clear(&mut self) {
        self.values.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_name_and_position() {
        let names: Arc<[Arc<str>]> = vec![Arc::from("id"), Arc::from("*")].into();
        let values = PathValues::from_parts(&names, vec!["42".to_string(), "a/b".to_string()]);
        assert_eq!(values.get("id"), Some("42"));
        assert_eq!(values.get("*"), Some("a/b"));
        assert_eq!(values.at(0), Some("42"));
        assert_eq!(values.get("missing"), None);
        assert_eq!(values.get_or("missing", "fallback"), "fallback");
    }
}
