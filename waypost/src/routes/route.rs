//! A route descriptor that can be assembled independently of a [`super::Router`]
//! and registered later via [`super::Router::add_route`].

use hyper::Method;

use crate::handlers::{self, Handler, WrappedHandler};
use crate::middleware::ToMiddleware;

/// Method(s), path, handler, and the ordered middleware stack applied
/// outermost-first around the handler. Build with [`Route::new`], add
/// middleware with [`Route::middleware`], reprefix with
/// [`Route::with_prefix`], then register via `Router::add_route`.
pub struct Route<G, L, E> {
    pub(crate) methods: Vec<Method>,
    pub(crate) path: String,
    pub(crate) name: Option<String>,
    pub(crate) middlewares: Vec<Box<dyn ToMiddleware<G, L>>>,
    pub(crate) handler: WrappedHandler<G, L, E>,
}

impl<G, L, E> Route<G, L, E>
where
    G: Send + Sync + 'static,
    L: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    pub fn new<H: Handler<G, L, E>>(methods: Vec<Method>, path: impl Into<String>, handler: H) -> Self {
        Self {
            methods,
            path: path.into(),
            name: None,
            middlewares: Vec::new(),
            handler: handlers::wrapped(handler),
        }
    }

    /// Name this route explicitly (used by `Routes::find_by_name`/`reverse`).
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Append one more middleware to the route's stack. Middlewares added
    /// earlier end up further out; the first one added is the outermost
    /// layer around the handler.
    pub fn middleware(mut self, middleware: impl ToMiddleware<G, L> + 'static) -> Self {
        self.middlewares.push(Box::new(middleware));
        self
    }

    /// Prepend `prefix` to the route's path and `extra_middlewares` ahead
    /// of the route's own stack, so the extras wrap this route's existing
    /// middleware (which keeps wrapping the handler, unchanged).
    pub fn with_prefix(mut self, prefix: &str, extra_middlewares: Vec<Box<dyn ToMiddleware<G, L>>>) -> Self {
        self.path = format!("{}{}", prefix, self.path);
        let mut combined = extra_middlewares;
        combined.extend(self.middlewares);
        self.middlewares = combined;
        self
    }
}
