//! The radix trie backing [`super::Router`].
//!
//! Each node owns a literal byte-string prefix (for static nodes) plus at
//! most one parameter-kind child and at most one any-kind child. Insertion
//! splits nodes on their longest common prefix, so two routes that share a
//! literal run end up under one shared node; matching walks the same
//! structure with backtracking, trying static children before parameter
//! children before the any child, and falls back across kinds on failure.
//!
//! A matched route's handler (plus any route-specific middleware) is
//! stored pre-composed as a single [`Middleware`] object, so the tree
//! itself is generic only over the global/local context types, not the
//! handler's error type.

use std::collections::HashMap;
use std::sync::Arc;

use hyper::Method;

use super::path::{self, Segment};
use crate::middleware::Middleware;

pub(crate) type RouteHandler<G, L> = Arc<dyn Middleware<G, L>>;

/// A per-node handler slot: either a concrete HTTP method, or the
/// `RouteNotFound` sentinel used as a subtree fallback.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub(crate) enum HandlerKey {
    Method(Method),
    RouteNotFound,
}

struct HandlerEntry<G, L> {
    handler: RouteHandler<G, L>,
    param_names: Arc<[Arc<str>]>,
}

impl<G, L> Clone for HandlerEntry<G, L> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
            param_names: self.param_names.clone(),
        }
    }
}

/// Why [`RouteTree::insert`] refused a registration.
#[derive(Debug, Clone)]
pub struct AddRouteError {
    pub path: String,
    pub reason: AddRouteErrorReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddRouteErrorReason {
    /// A handler already exists for this exact method and path, and
    /// `allow_overwriting_route` was not set.
    Duplicate(String),
    /// The path doesn't conform to the route grammar (e.g. a wildcard
    /// that isn't the final segment).
    Malformed(String),
}

impl std::fmt::Display for AddRouteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.reason {
            AddRouteErrorReason::Duplicate(method) => {
                write!(f, "route already registered: {} {}", method, self.path)
            }
            AddRouteErrorReason::Malformed(why) => {
                write!(f, "malformed route path {:?}: {}", self.path, why)
            }
        }
    }
}

impl std::error::Error for AddRouteError {}

struct InsertCtx<G, L> {
    key: HandlerKey,
    handler: RouteHandler<G, L>,
    param_names: Arc<[Arc<str>]>,
    path: String,
    allow_overwrite: bool,
}

pub(crate) struct Node<G, L> {
    prefix: String,
    label: u8,
    static_children: Vec<Box<Node<G, L>>>,
    param_child: Option<Box<Node<G, L>>>,
    any_child: Option<Box<Node<G, L>>>,
    handlers: HashMap<HandlerKey, HandlerEntry<G, L>>,
    allowed_methods: String,
}

impl<G, L> Node<G, L> {
    fn new(prefix: String) -> Self {
        let label = prefix.as_bytes().first().copied().unwrap_or(0);
        Node {
            prefix,
            label,
            static_children: Vec::new(),
            param_child: None,
            any_child: None,
            handlers: HashMap::new(),
            allowed_methods: String::new(),
        }
    }

    fn recompute_allowed_methods(&mut self) {
        let mut methods: Vec<&str> = self
            .handlers
            .keys()
            .filter_map(|k| match k {
                HandlerKey::Method(m) => Some(m.as_str()),
                HandlerKey::RouteNotFound => None,
            })
            .collect();
        methods.sort_unstable();
        methods.dedup();
        self.allowed_methods = methods.join(", ");
    }

    fn is_empty_leaf(&self) -> bool {
        self.handlers.is_empty()
            && self.static_children.is_empty()
            && self.param_child.is_none()
            && self.any_child.is_none()
    }

    fn compact(&mut self) {
        while self.handlers.is_empty()
            && self.param_child.is_none()
            && self.any_child.is_none()
            && self.static_children.len() == 1
        {
            let mut only = self.static_children.pop().unwrap();
            self.prefix.push_str(&only.prefix);
            self.static_children = std::mem::take(&mut only.static_children);
            self.param_child = only.param_child.take();
            self.any_child = only.any_child.take();
            self.handlers = std::mem::take(&mut only.handlers);
            self.allowed_methods = std::mem::take(&mut only.allowed_methods);
        }
    }

    fn split(&mut self, at: usize) {
        let tail = self.prefix.split_off(at);
        let mut moved = Node::new(tail);
        moved.static_children = std::mem::take(&mut self.static_children);
        moved.param_child = self.param_child.take();
        moved.any_child = self.any_child.take();
        moved.handlers = std::mem::take(&mut self.handlers);
        moved.allowed_methods = std::mem::take(&mut self.allowed_methods);
        self.static_children = vec![Box::new(moved)];
    }

    fn insert_segments(&mut self, segments: &[Segment], ctx: &mut InsertCtx<G, L>) -> Result<(), AddRouteError> {
        match segments.first() {
            None => self.set_handler(ctx),
            Some(Segment::Static(s)) => self.insert_static(s, &segments[1..], ctx),
            Some(Segment::Param(_)) => {
                if self.param_child.is_none() {
                    self.param_child = Some(Box::new(Node::new(String::new())));
                }
                self.param_child.as_mut().unwrap().insert_segments(&segments[1..], ctx)
            }
            Some(Segment::Any) => {
                if self.any_child.is_none() {
                    self.any_child = Some(Box::new(Node::new(String::new())));
                }
                self.any_child.as_mut().unwrap().insert_segments(&[], ctx)
            }
        }
    }

    fn insert_static(&mut self, search: &str, rest: &[Segment], ctx: &mut InsertCtx<G, L>) -> Result<(), AddRouteError> {
        if search.is_empty() {
            return self.insert_segments(rest, ctx);
        }
        let label = search.as_bytes()[0];
        if let Some(pos) = self.static_children.iter().position(|c| c.label == label) {
            let lcp = common_prefix_len(search, &self.static_children[pos].prefix);
            if lcp < self.static_children[pos].prefix.len() {
                self.static_children[pos].split(lcp);
            }
            if lcp < search.len() {
                self.static_children[pos].insert_static(&search[lcp..], rest, ctx)
            } else {
                self.static_children[pos].insert_segments(rest, ctx)
            }
        } else {
            let mut new_child = Box::new(Node::new(search.to_string()));
            new_child.insert_segments(rest, ctx)?;
            self.static_children.push(new_child);
            Ok(())
        }
    }

    fn set_handler(&mut self, ctx: &mut InsertCtx<G, L>) -> Result<(), AddRouteError> {
        if self.handlers.contains_key(&ctx.key) && !ctx.allow_overwrite {
            let method = match &ctx.key {
                HandlerKey::Method(m) => m.to_string(),
                HandlerKey::RouteNotFound => "RouteNotFound".to_string(),
            };
            return Err(AddRouteError {
                path: ctx.path.clone(),
                reason: AddRouteErrorReason::Duplicate(method),
            });
        }
        self.handlers.insert(
            ctx.key.clone(),
            HandlerEntry {
                handler: ctx.handler.clone(),
                param_names: ctx.param_names.clone(),
            },
        );
        self.recompute_allowed_methods();
        Ok(())
    }

    fn remove_segments(&mut self, segments: &[Segment], key: &HandlerKey) -> bool {
        match segments.first() {
            None => {
                self.handlers.remove(key);
                self.recompute_allowed_methods();
                self.compact();
                self.is_empty_leaf()
            }
            Some(Segment::Static(s)) => self.remove_static(s, &segments[1..], key),
            Some(Segment::Param(_)) => {
                let drop = match self.param_child.as_mut() {
                    Some(c) => c.remove_segments(&segments[1..], key),
                    None => false,
                };
                if drop {
                    self.param_child = None;
                }
                self.compact();
                self.is_empty_leaf()
            }
            Some(Segment::Any) => {
                let drop = match self.any_child.as_mut() {
                    Some(c) => c.remove_segments(&[], key),
                    None => false,
                };
                if drop {
                    self.any_child = None;
                }
                self.compact();
                self.is_empty_leaf()
            }
        }
    }

    fn remove_static(&mut self, search: &str, rest: &[Segment], key: &HandlerKey) -> bool {
        if search.is_empty() {
            return self.remove_segments(rest, key);
        }
        if let Some(pos) = self.static_children.iter().position(|c| search.starts_with(c.prefix.as_str())) {
            let remaining = &search[self.static_children[pos].prefix.len()..];
            let drop = self.static_children[pos].remove_static(remaining, rest, key);
            if drop {
                self.static_children.remove(pos);
            }
        }
        self.compact();
        self.is_empty_leaf()
    }

    fn try_match(&self, search: &str, method: &Method, depth: u32, ctx: &mut MatchCtx<G, L>) -> MatchStatus<G, L> {
        if let Some(entry) = self.handlers.get(&HandlerKey::RouteNotFound) {
            if ctx.best_not_found.as_ref().map(|b| b.2).unwrap_or(-1) < depth as i64 {
                ctx.best_not_found = Some((entry.handler.clone(), entry.param_names.clone(), depth as i64, ctx.params.clone()));
            }
        }

        if search.is_empty() {
            if let Some(entry) = self.handlers.get(&HandlerKey::Method(method.clone())) {
                return MatchStatus::Found(entry.handler.clone(), entry.param_names.clone());
            }
            let has_other = self.handlers.keys().any(|k| matches!(k, HandlerKey::Method(_)));
            if has_other {
                return MatchStatus::MethodNotAllowed(self.allowed_methods.clone());
            }
            return MatchStatus::NotFound;
        }

        if let Some(child) = self.static_children.iter().find(|c| search.as_bytes().first() == Some(&c.label)) {
            if search.starts_with(child.prefix.as_str()) {
                match child.try_match(&search[child.prefix.len()..], method, depth + 1, ctx) {
                    MatchStatus::NotFound => {}
                    other => return other,
                }
            }
        }

        if let Some(child) = &self.param_child {
            let slash = search.find('/').unwrap_or(search.len());
            let value = &search[..slash];
            let rest = &search[slash..];
            ctx.params.push(value.to_string());
            match child.try_match(rest, method, depth + 1, ctx) {
                MatchStatus::NotFound => {
                    ctx.params.pop();
                }
                other => return other,
            }
        }

        if let Some(child) = &self.any_child {
            ctx.params.push(search.to_string());
            match child.try_match("", method, depth + 1, ctx) {
                MatchStatus::NotFound => {
                    ctx.params.pop();
                }
                other => return other,
            }
        }

        MatchStatus::NotFound
    }
}

fn common_prefix_len(a: &str, b: &str) -> usize {
    a.bytes().zip(b.bytes()).take_while(|(x, y)| x == y).count()
}

pub(crate) enum MatchStatus<G, L> {
    Found(RouteHandler<G, L>, Arc<[Arc<str>]>),
    MethodNotAllowed(String),
    NotFound,
}

struct MatchCtx<G, L> {
    params: Vec<String>,
    /// (handler, param_names, depth, captured params at that depth)
    best_not_found: Option<(RouteHandler<G, L>, Arc<[Arc<str>]>, i64, Vec<String>)>,
}

/// A match against the tree: either a concrete handler, a method mismatch
/// at an otherwise-matched node, or a resolved `RouteNotFound` fallback.
pub(crate) enum Lookup<G, L> {
    Found {
        handler: RouteHandler<G, L>,
        param_names: Arc<[Arc<str>]>,
        values: Vec<String>,
    },
    MethodNotAllowed {
        allowed: String,
    },
    RouteNotFound {
        handler: RouteHandler<G, L>,
        param_names: Arc<[Arc<str>]>,
        values: Vec<String>,
    },
    NotFound,
}

pub(crate) struct RouteTree<G, L> {
    root: Node<G, L>,
}

impl<G, L> Default for RouteTree<G, L> {
    fn default() -> Self {
        Self { root: Node::new(String::new()) }
    }
}

impl<G, L> RouteTree<G, L> {
    pub(crate) fn insert(
        &mut self,
        method: Method,
        path: &str,
        handler: RouteHandler<G, L>,
        allow_overwrite: bool,
    ) -> Result<(), AddRouteError> {
        self.insert_with_key(HandlerKey::Method(method), path, handler, allow_overwrite)
    }

    pub(crate) fn insert_route_not_found(
        &mut self,
        path: &str,
        handler: RouteHandler<G, L>,
        allow_overwrite: bool,
    ) -> Result<(), AddRouteError> {
        self.insert_with_key(HandlerKey::RouteNotFound, path, handler, allow_overwrite)
    }

    fn insert_with_key(
        &mut self,
        key: HandlerKey,
        path: &str,
        handler: RouteHandler<G, L>,
        allow_overwrite: bool,
    ) -> Result<(), AddRouteError> {
        let path = path::normalize(path);
        let segs = path::segments(&path);
        let param_names = path::param_names(&path);
        let mut ctx = InsertCtx {
            key,
            handler,
            param_names,
            path,
            allow_overwrite,
        };
        self.root.insert_segments(&segs, &mut ctx)
    }

    pub(crate) fn remove(&mut self, method: &Method, path: &str) {
        let path = path::normalize(path);
        let segs = path::segments(&path);
        self.root.remove_segments(&segs, &HandlerKey::Method(method.clone()));
    }

    pub(crate) fn lookup(&self, method: &Method, path: &str) -> Lookup<G, L> {
        let mut ctx = MatchCtx {
            params: Vec::new(),
            best_not_found: None,
        };
        match self.root.try_match(path, method, 0, &mut ctx) {
            MatchStatus::Found(handler, param_names) => Lookup::Found {
                handler,
                param_names,
                values: ctx.params,
            },
            MatchStatus::MethodNotAllowed(allowed) => Lookup::MethodNotAllowed { allowed },
            MatchStatus::NotFound => match ctx.best_not_found {
                Some((handler, param_names, _, values)) => Lookup::RouteNotFound {
                    handler,
                    param_names,
                    values,
                },
                None => Lookup::NotFound,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HttpResponse, RequestContext};
    use hyper::StatusCode;

    struct StatusMiddleware(StatusCode);

    #[async_trait::async_trait]
    impl Middleware<(), ()> for StatusMiddleware {
        async fn call(&self, _ctx: &mut RequestContext<(), ()>) -> HttpResponse {
            HttpResponse::builder().status(self.0).body(hyper::Body::empty()).unwrap()
        }
    }

    fn stub_handler() -> RouteHandler<(), ()> {
        Arc::new(StatusMiddleware(StatusCode::OK))
    }

    #[test]
    fn static_prefix_split_keeps_both_routes() {
        let mut tree = RouteTree::<(), ()>::default();
        tree.insert(Method::GET, "/users/new", stub_handler(), false).unwrap();
        tree.insert(Method::GET, "/users/list", stub_handler(), false).unwrap();
        assert!(matches!(tree.lookup(&Method::GET, "/users/new"), Lookup::Found { .. }));
        assert!(matches!(tree.lookup(&Method::GET, "/users/list"), Lookup::Found { .. }));
        assert!(matches!(tree.lookup(&Method::GET, "/users/nope"), Lookup::NotFound));
    }

    #[test]
    fn param_precedence_under_static_sibling() {
        let mut tree = RouteTree::<(), ()>::default();
        tree.insert(Method::GET, "/users/new", stub_handler(), false).unwrap();
        tree.insert(Method::GET, "/users/:id", stub_handler(), false).unwrap();
        match tree.lookup(&Method::GET, "/users/42") {
            Lookup::Found { values, .. } => assert_eq!(values, vec!["42".to_string()]),
            _ => panic!("expected match"),
        }
        assert!(matches!(tree.lookup(&Method::GET, "/users/new"), Lookup::Found { .. }));
    }

    #[test]
    fn method_not_allowed_reports_allowed_set() {
        let mut tree = RouteTree::<(), ()>::default();
        tree.insert(Method::GET, "/widgets", stub_handler(), false).unwrap();
        tree.insert(Method::POST, "/widgets", stub_handler(), false).unwrap();
        match tree.lookup(&Method::DELETE, "/widgets") {
            Lookup::MethodNotAllowed { allowed } => assert_eq!(allowed, "GET, POST"),
            _ => panic!("expected method not allowed"),
        }
    }

    #[test]
    fn duplicate_route_rejected_without_overwrite() {
        let mut tree = RouteTree::<(), ()>::default();
        tree.insert(Method::GET, "/a", stub_handler(), false).unwrap();
        assert!(tree.insert(Method::GET, "/a", stub_handler(), false).is_err());
        assert!(tree.insert(Method::GET, "/a", stub_handler(), true).is_ok());
    }

    #[test]
    fn trailing_text_after_any_is_absorbed_by_the_wildcard() {
        let mut tree = RouteTree::<(), ()>::default();
        tree.insert(Method::GET, "/a/*/f", stub_handler(), false).unwrap();
        match tree.lookup(&Method::GET, "/a/c/f") {
            Lookup::Found { values, .. } => assert_eq!(values, vec!["c/f".to_string()]),
            _ => panic!("expected wildcard match"),
        }
    }

    #[test]
    fn trailing_slash_does_not_satisfy_param() {
        let mut tree = RouteTree::<(), ()>::default();
        tree.insert(Method::GET, "/a3/:id", stub_handler(), false).unwrap();
        assert!(matches!(tree.lookup(&Method::GET, "/a3/"), Lookup::NotFound));
    }

    #[test]
    fn empty_param_allowed_mid_path() {
        let mut tree = RouteTree::<(), ()>::default();
        tree.insert(Method::GET, "/a/:id/b", stub_handler(), false).unwrap();
        match tree.lookup(&Method::GET, "/a//b") {
            Lookup::Found { values, .. } => assert_eq!(values, vec!["".to_string()]),
            _ => panic!("expected match with empty capture"),
        }
    }

    #[test]
    fn route_not_found_sentinel_used_as_fallback() {
        let mut tree = RouteTree::<(), ()>::default();
        tree.insert(Method::GET, "/a/c/df", stub_handler(), false).unwrap();
        tree.insert_route_not_found("/a/c/:file", stub_handler(), false).unwrap();
        match tree.lookup(&Method::GET, "/a/c/dxxx") {
            Lookup::RouteNotFound { values, .. } => assert_eq!(values, vec!["dxxx".to_string()]),
            _ => panic!("expected RouteNotFound fallback"),
        }
    }

    #[test]
    fn multi_level_backtracking_picks_the_most_specific_match() {
        let mut tree = RouteTree::<(), ()>::default();
        tree.insert(Method::GET, "/a/:b/c", stub_handler(), false).unwrap();
        tree.insert(Method::GET, "/a/c/d", stub_handler(), false).unwrap();
        tree.insert(Method::GET, "/a/c/df", stub_handler(), false).unwrap();
        tree.insert(Method::GET, "/a/*/f", stub_handler(), false).unwrap();
        tree.insert(Method::GET, "/:e/c/f", stub_handler(), false).unwrap();
        tree.insert(Method::GET, "/*", stub_handler(), false).unwrap();

        match tree.lookup(&Method::GET, "/a/c/f") {
            Lookup::Found { values, param_names, .. } => {
                assert_eq!(values, vec!["c/f".to_string()]);
                assert_eq!(param_names.as_ref(), [Arc::<str>::from("*")]);
            }
            _ => panic!("expected /a/*/f to match"),
        }

        match tree.lookup(&Method::GET, "/b/c/f") {
            Lookup::Found { values, param_names, .. } => {
                assert_eq!(values, vec!["b".to_string()]);
                assert_eq!(param_names.as_ref(), [Arc::<str>::from("e")]);
            }
            _ => panic!("expected /:e/c/f to match"),
        }

        match tree.lookup(&Method::GET, "/b/c/c") {
            Lookup::Found { values, .. } => assert_eq!(values, vec!["b/c/c".to_string()]),
            _ => panic!("expected /* to match"),
        }
    }

    #[test]
    fn removal_prunes_and_compacts() {
        let mut tree = RouteTree::<(), ()>::default();
        tree.insert(Method::GET, "/users/new", stub_handler(), false).unwrap();
        tree.insert(Method::GET, "/users/list", stub_handler(), false).unwrap();
        tree.remove(&Method::GET, "/users/list");
        assert!(matches!(tree.lookup(&Method::GET, "/users/list"), Lookup::NotFound));
        assert!(matches!(tree.lookup(&Method::GET, "/users/new"), Lookup::Found { .. }));
    }

    #[test]
    fn wildcard_captures_remaining_path() {
        let mut tree = RouteTree::<(), ()>::default();
        tree.insert(Method::GET, "/files/*", stub_handler(), false).unwrap();
        match tree.lookup(&Method::GET, "/files/a/b/c.txt") {
            Lookup::Found { values, .. } => assert_eq!(values, vec!["a/b/c.txt".to_string()]),
            _ => panic!("expected wildcard match"),
        }
    }
}
