//! A queryable snapshot of registered routes, independent of the trie
//! used to dispatch requests.

use std::sync::Arc;

use hyper::Method;

use super::{path, RouteNotFoundError};

/// Metadata about one registered route, as returned by [`Routes`].
#[derive(Debug, Clone)]
pub struct RouteInfo {
    pub method: Method,
    pub path: String,
    pub name: Option<String>,
    pub param_names: Arc<[Arc<str>]>,
}

impl RouteInfo {
    /// Render this route's path, substituting `values` (in declaration
    /// order) for its parameter and wildcard segments.
    pub fn reverse(&self, values: &[impl std::fmt::Display]) -> String {
        let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        path::reverse(&self.path, &values)
    }
}

/// A point-in-time snapshot of every route added to a [`super::Router`].
///
/// Cloning a `Routes` is cheap (it clones route metadata, not handlers);
/// call [`super::Router::routes`] to get a fresh one after further
/// registrations.
#[derive(Debug, Clone, Default)]
pub struct Routes {
    routes: Vec<RouteInfo>,
}

impl Routes {
    pub(crate) fn new(routes: Vec<RouteInfo>) -> Self {
        Self { routes }
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteInfo> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn filter_by_method(&self, method: &Method) -> Result<Routes, RouteNotFoundError> {
        let filtered = Routes::new(self.routes.iter().filter(|r| &r.method == method).cloned().collect());
        if filtered.is_empty() {
            Err(RouteNotFoundError { query: method.to_string() })
        } else {
            Ok(filtered)
        }
    }

    pub fn filter_by_path(&self, path: &str) -> Result<Routes, RouteNotFoundError> {
        let filtered = Routes::new(self.routes.iter().filter(|r| r.path == path).cloned().collect());
        if filtered.is_empty() {
            Err(RouteNotFoundError { query: path.to_string() })
        } else {
            Ok(filtered)
        }
    }

    pub fn filter_by_name(&self, name: &str) -> Result<Routes, RouteNotFoundError> {
        let filtered = Routes::new(
            self.routes
                .iter()
                .filter(|r| r.name.as_deref() == Some(name))
                .cloned()
                .collect(),
        );
        if filtered.is_empty() {
            Err(RouteNotFoundError { query: name.to_string() })
        } else {
            Ok(filtered)
        }
    }

    pub fn find_by_method_path(&self, method: &Method, path: &str) -> Result<&RouteInfo, RouteNotFoundError> {
        self.routes
            .iter()
            .find(|r| &r.method == method && r.path == path)
            .ok_or_else(|| RouteNotFoundError { query: format!("{} {}", method, path) })
    }

    pub fn find_by_name(&self, name: &str) -> Result<&RouteInfo, RouteNotFoundError> {
        self.routes
            .iter()
            .find(|r| r.name.as_deref() == Some(name))
            .ok_or_else(|| RouteNotFoundError { query: name.to_string() })
    }

    /// Reverse a named route by substituting `values` into its path.
    /// Fails with [`RouteNotFoundError`] if no route was registered with
    /// this name.
    pub fn reverse(&self, name: &str, values: &[impl std::fmt::Display]) -> Result<String, RouteNotFoundError> {
        self.find_by_name(name).map(|r| r.reverse(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(method: Method, path: &str, name: Option<&str>) -> RouteInfo {
        RouteInfo {
            method,
            path: path.to_string(),
            name: name.map(str::to_string),
            param_names: path::param_names(path),
        }
    }

    #[test]
    fn filters_narrow_the_snapshot() {
        let routes = Routes::new(vec![
            info(Method::GET, "/users", Some("list-users")),
            info(Method::POST, "/users", Some("create-user")),
            info(Method::GET, "/users/:id", Some("get-user")),
        ]);

        assert_eq!(routes.filter_by_method(&Method::GET).unwrap().len(), 2);
        assert_eq!(routes.filter_by_path("/users").unwrap().len(), 2);
        assert!(routes.find_by_name("create-user").is_ok());
        assert!(routes.filter_by_method(&Method::DELETE).is_err());
    }

    #[test]
    fn reverse_substitutes_named_route() {
        let routes = Routes::new(vec![info(Method::GET, "/users/:id", Some("get-user"))]);
        assert_eq!(routes.reverse("get-user", &[42]).unwrap(), "/users/42".to_string());
        assert!(routes.reverse("missing", &[42]).is_err());
    }
}
