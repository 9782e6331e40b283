mod concurrent;
mod macros;
mod path;
mod registry;
mod route;
mod tree;

use std::sync::Arc;

use crate::{handlers, prelude::*};

pub use concurrent::ConcurrentRouter;
pub use registry::{RouteInfo, Routes};
pub use route::Route;
pub use tree::{AddRouteError, AddRouteErrorReason};

use tree::{Lookup, RouteHandler, RouteTree};

/// Errors surfaced by [`Router`]'s registry-facing operations (as opposed
/// to [`AddRouteError`], which `add`/`add_wrapped` return directly).
#[derive(Debug, Clone)]
pub enum RouterError {
    AddRoute(AddRouteError),
    RouteNotFound(RouteNotFoundError),
}

impl std::fmt::Display for RouterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouterError::AddRoute(e) => write!(f, "{}", e),
            RouterError::RouteNotFound(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for RouterError {}

impl From<AddRouteError> for RouterError {
    fn from(e: AddRouteError) -> Self {
        RouterError::AddRoute(e)
    }
}

/// A lookup against [`Routes`] (by name, or by method+path) found nothing.
#[derive(Debug, Clone)]
pub struct RouteNotFoundError {
    pub query: String,
}

impl std::fmt::Display for RouteNotFoundError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "no route matched {}", self.query)
    }
}

impl std::error::Error for RouteNotFoundError {}

fn default_route_name(method: &Method, path: &str) -> String {
    format!("{}:{}", method, path)
}

/// Owns the route trie and configuration for a single HTTP application.
///
/// Route registration (`add`, `add_wrapped`, `route_not_found`, `remove`) is
/// not safe to call concurrently with request serving; wrap in a
/// [`ConcurrentRouter`] if routes need to change after the server starts
/// listening.
pub struct Router<GlobalCtx, LocalCtx, Err>
where
    GlobalCtx: 'static,
    LocalCtx: 'static,
{
    pub(crate) tree: RouteTree<GlobalCtx, LocalCtx>,
    routes: Vec<RouteInfo>,
    redirect_trailing: bool,
    handle_options: bool,
    handle_method_not_allowed: bool,
    allow_overwriting_route: bool,
    unescape_path_param_values: bool,
    use_escaped_path_for_matching: bool,
    expose_internal_errors: bool,
    error_handler: Arc<dyn Fn(&mut RequestContext<GlobalCtx, LocalCtx>, Err) -> Response + Send + Sync>,
}

impl<G, L, E> Default for Router<G, L, E>
where
    E: Send + Sync + 'static,
{
    fn default() -> Self {
        Self {
            tree: RouteTree::default(),
            routes: Vec::new(),
            redirect_trailing: false,
            handle_options: true,
            handle_method_not_allowed: true,
            allow_overwriting_route: false,
            unescape_path_param_values: false,
            use_escaped_path_for_matching: true,
            expose_internal_errors: false,
            error_handler: Arc::new(handlers::default_error_handler),
        }
    }
}

impl<G, L, E> Router<G, L, E>
where
    G: Send + Sync + 'static,
    L: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn redirect_trailing_slash(mut self, opt: bool) -> Self {
        self.redirect_trailing = opt;
        self
    }

    pub fn handle_options(mut self, opt: bool) -> Self {
        self.handle_options = opt;
        self
    }

    pub fn handle_method_not_allowed(mut self, opt: bool) -> Self {
        self.handle_method_not_allowed = opt;
        self
    }

    /// When set, re-registering `(method, path)` overwrites the existing
    /// handler instead of returning [`AddRouteErrorReason::Duplicate`].
    pub fn allow_overwriting_route(mut self, opt: bool) -> Self {
        self.allow_overwriting_route = opt;
        self
    }

    /// When set, percent-decode each captured path-parameter value before
    /// it is stored on the context.
    pub fn unescape_path_param_values(mut self, opt: bool) -> Self {
        self.unescape_path_param_values = opt;
        self
    }

    /// When set (the default), match against the raw request path as
    /// received, leaving any percent-escapes intact. When unset, the path
    /// is percent-decoded before matching.
    pub fn use_escaped_path_for_matching(mut self, opt: bool) -> Self {
        self.use_escaped_path_for_matching = opt;
        self
    }

    /// When set, the centralized error handler's JSON body carries the
    /// real error message instead of a generic one.
    pub fn expose_internal_errors(mut self, opt: bool) -> Self {
        self.expose_internal_errors = opt;
        self
    }

    pub fn on_error(mut self, handler: impl Fn(&mut RequestContext<G, L>, E) -> Response + Send + Sync + 'static) -> Self {
        self.error_handler = Arc::new(handler);
        self
    }

    /// Register `handler` for every method in `methods` at `path`, named
    /// `"<method>:<path>"`.
    pub fn add<H: Handler<G, L, E>>(&mut self, methods: Vec<Method>, path: &str, handler: H) -> Result<(), AddRouteError> {
        self.add_wrapped(methods, path, handlers::wrapped(handler))
    }

    /// Like [`Router::add`], but with an explicit route name (used by
    /// [`Routes::find_by_name`]/[`Routes::reverse`]).
    pub fn add_named<H: Handler<G, L, E>>(
        &mut self,
        methods: Vec<Method>,
        path: &str,
        name: &str,
        handler: H,
    ) -> Result<(), AddRouteError> {
        self.add_wrapped_named(methods, path, Some(name), Vec::new(), handlers::wrapped(handler))
    }

    pub fn add_wrapped(&mut self, methods: Vec<Method>, path: &str, handler: WrappedHandler<G, L, E>) -> Result<(), AddRouteError> {
        self.add_wrapped_named(methods, path, None, Vec::new(), handler)
    }

    /// Register a [`Route`] built up via its own `.named(...)`,
    /// `.middleware(...)`, `.with_prefix(...)` builder methods. The
    /// route's middleware stack is composed outermost-first over its
    /// handler once, here, at registration time — the tree stores the
    /// result as a single already-composed chain, so dispatch (`Router::call`)
    /// never has to redo the composition per request.
    pub fn add_route(&mut self, route: Route<G, L, E>) -> Result<(), AddRouteError> {
        self.add_wrapped_named(route.methods, &route.path, route.name.as_deref(), route.middlewares, route.handler)
    }

    fn add_wrapped_named(
        &mut self,
        methods: Vec<Method>,
        path: &str,
        name: Option<&str>,
        middlewares: Vec<Box<dyn ToMiddleware<G, L>>>,
        handler: WrappedHandler<G, L, E>,
    ) -> Result<(), AddRouteError> {
        let path = path::normalize(path);
        let param_names = path::param_names(&path);
        let terminal: RouteHandler<G, L> = Arc::new(handlers::Terminal {
            handler,
            error_handler: self.error_handler.clone(),
        });
        // Outermost-first: fold from the end so the first middleware in
        // the list ends up as the outermost layer around `terminal`.
        let route_handler: RouteHandler<G, L> = middlewares.into_iter().rev().fold(terminal, |next, mw| mw.wrap(next));

        for method in methods {
            tracing::debug!(%method, %path, "registering route");
            self.tree.insert(method.clone(), &path, route_handler.clone(), self.allow_overwriting_route)?;
            let info = RouteInfo {
                method: method.clone(),
                path: path.clone(),
                name: Some(name.map(str::to_string).unwrap_or_else(|| default_route_name(&method, &path))),
                param_names: param_names.clone(),
            };
            if self.allow_overwriting_route {
                self.routes.retain(|r| !(r.method == method && r.path == path));
            }
            self.routes.push(info);
        }
        Ok(())
    }

    /// Register a `RouteNotFound` fallback: invoked when no regular route
    /// matches anywhere under `path`'s subtree (the deepest such fallback
    /// wins). Not listed in [`Router::routes`] — it isn't an addressable
    /// endpoint.
    pub fn route_not_found<H: Handler<G, L, E>>(&mut self, path: &str, handler: H) -> Result<(), AddRouteError> {
        let path = path::normalize(path);
        let route_handler: RouteHandler<G, L> = Arc::new(handlers::Terminal {
            handler: handlers::wrapped(handler),
            error_handler: self.error_handler.clone(),
        });
        self.tree.insert_route_not_found(&path, route_handler, self.allow_overwriting_route)
    }

    pub fn remove(&mut self, method: Method, path: &str) {
        let path = path::normalize(path);
        self.tree.remove(&method, &path);
        self.routes.retain(|r| !(r.method == method && r.path == path));
    }

    /// A point-in-time snapshot of every route registered via `add`/`add_wrapped`/`add_named`.
    pub fn routes(&self) -> Routes {
        Routes::new(self.routes.clone())
    }

    /// Reverse a named route by substituting `values` into its path. See
    /// [`Routes::reverse`].
    pub fn reverse(&self, name: &str, values: &[impl std::fmt::Display]) -> Result<String, RouteNotFoundError> {
        self.routes().reverse(name, values)
    }

    fn match_path(&self, raw_path: &str) -> String {
        let path = if self.redirect_trailing && raw_path.len() > 1 {
            raw_path.trim_end_matches('/')
        } else {
            raw_path
        };
        if self.use_escaped_path_for_matching {
            path.to_string()
        } else {
            path::percent_decode(path)
        }
    }

    fn apply_param_policy(&self, values: Vec<String>) -> Vec<String> {
        if self.unescape_path_param_values {
            values.into_iter().map(|v| path::percent_decode(&v)).collect()
        } else {
            values
        }
    }

    pub(crate) fn lookup(&self, method: &Method, raw_path: &str) -> Lookup<G, L> {
        let path = self.match_path(raw_path);
        self.tree.lookup(method, &path)
    }
}

#[async_trait]
impl<G, L, E> Middleware<G, L> for Router<G, L, E>
where
    G: Send + Sync + 'static,
    L: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    async fn call(&self, ctx: &mut RequestContext<G, L>) -> HttpResponse {
        let method = ctx.request.method().clone();
        let path = ctx.request.uri().path().to_string();

        match self.lookup(&method, &path) {
            // `handler` here is already the fully-composed chain built by
            // `add_wrapped_named` at registration time (route middleware,
            // outermost-first, wrapped around the `Terminal`-adapted
            // handler) — nothing left to compose on the request path.
            Lookup::Found { handler, param_names, values } => {
                let values = self.apply_param_policy(values);
                ctx.set_path_values(&param_names, values);
                handler.call(ctx).await
            }
            Lookup::RouteNotFound { handler, param_names, values } => {
                let values = self.apply_param_policy(values);
                ctx.set_path_values(&param_names, values);
                handler.call(ctx).await
            }
            Lookup::MethodNotAllowed { allowed } => {
                if self.handle_options && method == Method::OPTIONS {
                    HttpResponse::from(respond::options(&allowed))
                } else if self.handle_method_not_allowed {
                    HttpResponse::from(respond::method_not_allowed(&allowed))
                } else {
                    HttpResponse::from(respond::not_found())
                }
            }
            Lookup::NotFound => HttpResponse::from(respond::not_found()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    enum BasicError {}

    async fn index(_: &mut RequestContext<(), ()>, _: PathValues) -> Result<Response, BasicError> {
        Ok(respond::status(Status::OK))
    }

    async fn abc(_: &mut RequestContext<(), ()>, _: PathValues) -> Result<Response, BasicError> {
        Ok(respond::status(Status::CREATED))
    }

    async fn abc_id(_: &mut RequestContext<(), ()>, params: PathValues) -> Result<Response, BasicError> {
        assert_eq!(params.get("id"), Some("123"));
        Ok(respond::status(Status::from_u16(204).unwrap()))
    }

    async fn ctx(router: &Router<(), (), BasicError>, method: Method, path: &str) -> HttpResponse {
        let mut request = HttpRequest::new(HttpBody::empty());
        *request.uri_mut() = hyper::Uri::try_from(path).unwrap();
        *request.method_mut() = method;
        let mut req_ctx = RequestContext::new(Arc::new(()), (), request);
        router.call(&mut req_ctx).await
    }

    #[tokio::test]
    async fn router_dispatches_by_path_and_method() {
        let mut router: Router<(), (), BasicError> = Router::new();
        router.add(vec![Method::GET], "/", index).unwrap();
        router.add(vec![Method::GET], "/abc", abc).unwrap();
        router.add(vec![Method::GET], "/abc/:id", abc_id).unwrap();

        assert_eq!(ctx(&router, Method::GET, "/").await.status(), Status::OK);
        assert_eq!(ctx(&router, Method::GET, "/abc").await.status(), Status::CREATED);
        assert_eq!(ctx(&router, Method::GET, "/abc/123").await.status(), Status::from_u16(204).unwrap());
        assert_eq!(ctx(&router, Method::GET, "/nope").await.status(), Status::NOT_FOUND);
    }

    #[tokio::test]
    async fn router_handles_options_and_method_not_allowed() {
        let mut router: Router<(), (), BasicError> = Router::new();
        router.add(vec![Method::GET], "/abc", index).unwrap();
        router.add(vec![Method::PUT], "/abc", abc).unwrap();

        let options = ctx(&router, Method::OPTIONS, "/abc").await;
        assert_eq!(options.status(), Status::NO_CONTENT);
        let allow = options.headers().get(hyper::header::ALLOW).unwrap().to_str().unwrap();
        assert!(allow.contains("OPTIONS"));
        assert!(allow.contains("GET"));
        assert!(allow.contains("PUT"));

        let not_allowed = ctx(&router, Method::DELETE, "/abc").await;
        assert_eq!(not_allowed.status(), Status::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected_without_overwrite() {
        let mut router: Router<(), (), BasicError> = Router::new();
        router.add(vec![Method::GET], "/abc", index).unwrap();
        assert!(router.add(vec![Method::GET], "/abc", abc).is_err());
    }

    #[tokio::test]
    async fn named_route_reverses_to_its_path() {
        let mut router: Router<(), (), BasicError> = Router::new();
        router.add_named(vec![Method::GET], "/users/:id", "get-user", abc_id).unwrap();
        assert_eq!(router.reverse("get-user", &[42]).unwrap(), "/users/42");
        assert!(router.reverse("missing", &[42]).is_err());
    }

    async fn user_file(_: &mut RequestContext<(), ()>, params: PathValues) -> Result<Response, BasicError> {
        assert_eq!(params.get("uid"), Some("42"));
        assert_eq!(params.get("fid"), Some("report.pdf"));
        Ok(respond::status(Status::OK))
    }

    #[tokio::test]
    async fn reverse_round_trips_through_the_router_with_two_params() {
        let mut router: Router<(), (), BasicError> = Router::new();
        router
            .add_named(vec![Method::GET], "/users/:uid/files/:fid", "userFile", user_file)
            .unwrap();

        let path = router.reverse("userFile", &["42".to_string(), "report.pdf".to_string()]).unwrap();
        assert_eq!(path, "/users/42/files/report.pdf");
        assert_eq!(ctx(&router, Method::GET, &path).await.status(), Status::OK);
    }

    struct MarkerHeader {
        next: Arc<dyn Middleware<(), ()>>,
    }

    #[async_trait]
    impl Middleware<(), ()> for MarkerHeader {
        async fn call(&self, ctx: &mut RequestContext<(), ()>) -> HttpResponse {
            let mut response = self.next.call(ctx).await;
            response.headers_mut().insert("x-marker", hyper::header::HeaderValue::from_static("1"));
            response
        }
    }

    struct MarkerHeaderConfig;

    impl ToMiddleware<(), ()> for MarkerHeaderConfig {
        fn wrap(self: Box<Self>, next: Arc<dyn Middleware<(), ()>>) -> Arc<dyn Middleware<(), ()>> {
            Arc::new(MarkerHeader { next })
        }
    }

    #[tokio::test]
    async fn add_route_composes_its_middleware_stack_around_the_handler() {
        let mut router: Router<(), (), BasicError> = Router::new();
        router
            .add_route(Route::new(vec![Method::GET], "/abc", index).middleware(MarkerHeaderConfig))
            .unwrap();

        let response = ctx(&router, Method::GET, "/abc").await;
        assert_eq!(response.status(), Status::OK);
        assert_eq!(response.headers().get("x-marker").unwrap(), "1");
    }

    #[tokio::test]
    async fn with_prefix_reprefixes_the_path_and_keeps_middleware_wrapping_order() {
        let route = Route::new(vec![Method::GET], "/abc", index)
            .middleware(MarkerHeaderConfig)
            .with_prefix("/api", Vec::new());

        let mut router: Router<(), (), BasicError> = Router::new();
        router.add_route(route).unwrap();

        let response = ctx(&router, Method::GET, "/api/abc").await;
        assert_eq!(response.status(), Status::OK);
        assert_eq!(response.headers().get("x-marker").unwrap(), "1");
    }

    #[tokio::test]
    async fn remove_drops_route_from_registry_and_tree() {
        let mut router: Router<(), (), BasicError> = Router::new();
        router.add(vec![Method::GET], "/abc", index).unwrap();
        assert_eq!(router.routes().len(), 1);
        router.remove(Method::GET, "/abc");
        assert_eq!(router.routes().len(), 0);
        assert_eq!(ctx(&router, Method::GET, "/abc").await.status(), Status::NOT_FOUND);
    }
}
