use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use hyper::body::{Buf, Bytes};
use tokio_util::sync::CancellationToken;

use crate::path_values::PathValues;
use crate::responses::{respond, Response, ResponseError};
use crate::routes::RouteInfo;

use super::HttpRequest;

/// # Request Context
///
/// The `RequestContext` struct represents the lifetime of a request
/// throughout `waypost`'s handling process. A mutable reference to some
/// `RequestContext` is passed to each middleware and then the request
/// handler, allowing you to store/share information between
/// middlewares/the handler.
///
/// ## Global Context
///
/// The `global` field stores a reference to some global context held by the
/// server. This is read only and should include things like database/cache
/// connection pools or other references handlers might need access to.
///
/// When no global context is neccessary, just use the empty tuple type `()`.
///
/// ## Local Context
///
/// The `local` field provides access to some data specific to the handling of
/// the current request. For example, the RequestId middleware will write the
/// generated request id to this local context so that it can be used later
/// (instead of, for example, storing it in a request header and needing to
/// parse it multiple times).
///
/// Types used as local context must implement [`Default`], which is used to
/// instantiate the `local` field when a context is taken from the pool.
///
/// When no local context is necessary, use the empty tuple type `()` (which
/// does implement [`Default`])
///
/// ## Request
///
/// Finally, the request itself is stored in the context so it can be
/// mutated or transformed by middlewares before it is passed to the handler
/// (and to cut down on handler arguments)
///
/// ## Path values, store, and cancellation
///
/// The router fills in the matched route's captured path values before
/// invoking the handler chain; they're available via [`RequestContext::param`]
/// and [`RequestContext::path_values`]. `get`/`set` give middleware and
/// handlers a place to pass arbitrary per-request data without a bespoke
/// `LocalCtx` field for everything. `cancellation_token` is cancelled if the
/// client disconnects mid-request, so long-running handlers can check it.
pub struct RequestContext<GlobalCtx, LocalCtx> {
    pub global: Arc<GlobalCtx>,
    pub local: LocalCtx,
    pub request: HttpRequest,
    path_values: PathValues,
    route_info: Option<Arc<RouteInfo>>,
    store: HashMap<String, Box<dyn Any + Send + Sync>>,
    cancellation: CancellationToken,
    committed: bool,
}

impl<G, L> RequestContext<G, L> {
    pub fn new(global: Arc<G>, local: L, request: HttpRequest) -> Self {
        Self {
            global,
            local,
            request,
            path_values: PathValues::new(),
            route_info: None,
            store: HashMap::new(),
            cancellation: CancellationToken::new(),
            committed: false,
        }
    }

    pub(crate) fn for_pool(global: Arc<G>, request: HttpRequest, cancellation: CancellationToken) -> Self
    where
        L: Default,
    {
        Self {
            global,
            local: L::default(),
            request,
            path_values: PathValues::new(),
            route_info: None,
            store: HashMap::new(),
            cancellation,
            committed: false,
        }
    }

    /// Restore this context to a clean slate so the pool can hand it to a
    /// different request. Every field the previous request could have
    /// touched (path values, store, local context, commit flag) is reset;
    /// nothing leaks across requests.
    pub(crate) fn reset(&mut self, global: Arc<G>, request: HttpRequest, cancellation: CancellationToken)
    where
        L: Default,
    {
        self.global = global;
        self.local = L::default();
        self.request = request;
        self.path_values.clear();
        self.route_info = None;
        self.store.clear();
        self.cancellation = cancellation;
        self.committed = false;
    }

    pub(crate) fn set_path_values(&mut self, param_names: &Arc<[Arc<str>]>, values: Vec<String>) {
        self.path_values.set_all(param_names, values);
    }

    pub(crate) fn set_route_info(&mut self, info: Option<Arc<RouteInfo>>) {
        self.route_info = info;
    }

    /// The value captured by the matched route for `name`, if any.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.path_values.get(name)
    }

    pub fn param_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.path_values.get_or(name, default)
    }

    pub fn path_values(&self) -> &PathValues {
        &self.path_values
    }

    /// Metadata about the route that matched this request, if the router
    /// has run yet.
    pub fn route_info(&self) -> Option<&RouteInfo> {
        self.route_info.as_deref()
    }

    /// Retrieve a value earlier middleware stashed with [`RequestContext::set`].
    pub fn get<T: 'static>(&self, key: &str) -> Option<&T> {
        self.store.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    /// Stash a value for later middleware or the handler to read back with
    /// [`RequestContext::get`]. Scoped to this request; cleared on reset.
    pub fn set<T: Send + Sync + 'static>(&mut self, key: impl Into<String>, value: T) {
        self.store.insert(key.into(), Box::new(value));
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub(crate) fn mark_committed(&mut self) {
        self.committed = true;
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// Checks commit state before a write helper proceeds; logs and refuses
    /// a second write rather than silently clobbering the first response.
    fn check_uncommitted(&mut self) -> Result<(), ResponseAlreadyCommitted> {
        if self.committed {
            tracing::warn!("write attempted after response already committed");
            return Err(ResponseAlreadyCommitted);
        }
        self.mark_committed();
        Ok(())
    }

    /// Consume the body of a request and return its bytes
    pub async fn body(&mut self) -> Result<Bytes, hyper::Error> {
        hyper::body::to_bytes(self.request.body_mut()).await
    }

    /// Consume the body of a request and deserialize it to some type using
    /// `serde_json`
    pub async fn body_json<T>(&mut self) -> Result<T, JsonError>
    where
        T: serde::de::DeserializeOwned + Send,
    {
        let reader = hyper::body::aggregate(self.request.body_mut())
            .await
            .map_err(JsonError::ReadBody)?
            .reader();
        let deserializer = &mut serde_json::Deserializer::from_reader(reader);
        let body: T = serde_path_to_error::deserialize(deserializer).map_err(JsonError::DeserializeBody)?;
        Ok(body)
    }

    /// Deserialize a type from this request's query string.
    pub fn query<T>(&self) -> Result<T, serde_urlencoded::de::Error>
    where
        T: serde::de::DeserializeOwned + Send,
    {
        let raw_query = self.request.uri().query().unwrap_or_default();
        serde_urlencoded::from_str(raw_query)
    }

    /// A single query-string value by key, or `None` if absent or the
    /// query string doesn't parse.
    pub fn query_param(&self, name: &str) -> Option<String> {
        let raw_query = self.request.uri().query().unwrap_or_default();
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(raw_query).ok()?;
        pairs.into_iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Consume an `application/x-www-form-urlencoded` body and deserialize
    /// it to some type.
    pub async fn form<T>(&mut self) -> Result<T, FormError>
    where
        T: serde::de::DeserializeOwned + Send,
    {
        let body = self.body().await.map_err(FormError::ReadBody)?;
        serde_urlencoded::from_bytes(&body).map_err(FormError::Deserialize)
    }

    /// A single `application/x-www-form-urlencoded` value by key, or
    /// `None` if absent or the body doesn't parse.
    pub async fn form_value(&mut self, name: &str) -> Option<String> {
        let pairs: Vec<(String, String)> = self.form().await.ok()?;
        pairs.into_iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Deserialize the request body as JSON. An alias for [`RequestContext::body_json`]
    /// kept for handlers that bind their input type by a single name.
    pub async fn bind<T>(&mut self) -> Result<T, JsonError>
    where
        T: serde::de::DeserializeOwned + Send,
    {
        self.body_json().await
    }

    pub fn json<T: serde::Serialize>(&mut self, status: hyper::StatusCode, body: &T) -> Result<Response, WriteError> {
        self.check_uncommitted()?;
        Ok(respond::json(status, body)?)
    }

    pub fn string(&mut self, status: hyper::StatusCode, body: impl Into<String>) -> Result<Response, ResponseAlreadyCommitted> {
        self.check_uncommitted()?;
        Ok(Response::Text(status, body.into()))
    }

    pub fn html(&mut self, status: hyper::StatusCode, body: impl Into<String>) -> Result<Response, ResponseAlreadyCommitted> {
        self.check_uncommitted()?;
        Ok(respond::html(status, body))
    }

    pub fn xml(&mut self, status: hyper::StatusCode, body: impl Into<String>) -> Result<Response, ResponseAlreadyCommitted> {
        self.check_uncommitted()?;
        Ok(respond::xml(status, body))
    }

    pub fn blob(&mut self, status: hyper::StatusCode, body: Vec<u8>) -> Result<Response, WriteError> {
        self.check_uncommitted()?;
        Ok(respond::bytes(status, body, false)?)
    }

    /// Read `path` from disk and serve it as an octet-stream.
    pub async fn file(&mut self, path: &str) -> Result<Response, FileError> {
        if self.committed {
            tracing::warn!("write attempted after response already committed");
            return Err(FileError::AlreadyCommitted(ResponseAlreadyCommitted));
        }
        let bytes = tokio::fs::read(path).await.map_err(FileError::Io)?;
        self.mark_committed();
        Ok(respond::bytes(hyper::StatusCode::OK, bytes, false).unwrap_or_else(|_| respond::error()))
    }

    pub fn redirect(&mut self, status: hyper::StatusCode, location: &str) -> Result<Response, WriteError> {
        self.check_uncommitted()?;
        Ok(respond::redirect(status, location)?)
    }

    pub fn no_content(&mut self) -> Result<Response, ResponseAlreadyCommitted> {
        self.check_uncommitted()?;
        Ok(respond::no_content())
    }
}

#[derive(Debug)]
pub enum JsonError {
    ReadBody(hyper::Error),
    DeserializeBody(serde_path_to_error::Error<serde_json::Error>),
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JsonError::ReadBody(ref e) => write!(f, "Error reading body: {}", e),
            JsonError::DeserializeBody(ref e) => write!(f, "Failed to deserialize body: {}", e),
        }
    }
}

impl std::error::Error for JsonError {}

#[derive(Debug)]
pub enum FormError {
    ReadBody(hyper::Error),
    Deserialize(serde_urlencoded::de::Error),
}

impl std::fmt::Display for FormError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormError::ReadBody(ref e) => write!(f, "Error reading body: {}", e),
            FormError::Deserialize(ref e) => write!(f, "Failed to deserialize form body: {}", e),
        }
    }
}

impl std::error::Error for FormError {}

/// Returned when a handler tries to write a second response after one was
/// already committed via a `RequestContext` write helper.
#[derive(Debug)]
pub struct ResponseAlreadyCommitted;

impl std::fmt::Display for ResponseAlreadyCommitted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "a response was already committed for this request")
    }
}

impl std::error::Error for ResponseAlreadyCommitted {}

/// Error returned by write helpers that can fail either because the
/// response was already committed, or because the body itself couldn't
/// be encoded.
#[derive(Debug)]
pub enum WriteError {
    AlreadyCommitted(ResponseAlreadyCommitted),
    Response(ResponseError),
}

impl From<ResponseAlreadyCommitted> for WriteError {
    fn from(e: ResponseAlreadyCommitted) -> Self {
        WriteError::AlreadyCommitted(e)
    }
}

impl From<ResponseError> for WriteError {
    fn from(e: ResponseError) -> Self {
        WriteError::Response(e)
    }
}

impl std::fmt::Display for WriteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteError::AlreadyCommitted(ref e) => write!(f, "{}", e),
            WriteError::Response(ref e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for WriteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WriteError::AlreadyCommitted(ref e) => Some(e),
            WriteError::Response(ref e) => Some(e),
        }
    }
}

/// Error returned by [`RequestContext::file`].
#[derive(Debug)]
pub enum FileError {
    AlreadyCommitted(ResponseAlreadyCommitted),
    Io(std::io::Error),
}

impl std::fmt::Display for FileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileError::AlreadyCommitted(ref e) => write!(f, "{}", e),
            FileError::Io(ref e) => write!(f, "failed to read file: {}", e),
        }
    }
}

impl std::error::Error for FileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FileError::AlreadyCommitted(ref e) => Some(e),
            FileError::Io(ref e) => Some(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::HttpRequest;

    fn ctx() -> RequestContext<(), ()> {
        RequestContext::new(Arc::new(()), (), HttpRequest::new(hyper::Body::empty()))
    }

    #[test]
    fn second_write_is_rejected_after_commit() {
        let mut c = ctx();
        assert!(c.string(hyper::StatusCode::OK, "first").is_ok());
        assert!(c.is_committed());
        assert!(c.string(hyper::StatusCode::OK, "second").is_err());
    }

    #[test]
    fn store_roundtrips_typed_values() {
        let mut c = ctx();
        assert!(c.get::<u32>("count").is_none());
        c.set("count", 7u32);
        assert_eq!(c.get::<u32>("count"), Some(&7));
    }

    #[test]
    fn param_reads_through_path_values() {
        let mut c = ctx();
        let names: Arc<[Arc<str>]> = vec![Arc::from("id")].into();
        c.set_path_values(&names, vec!["42".to_string()]);
        assert_eq!(c.param("id"), Some("42"));
        assert_eq!(c.param_or("missing", "fallback"), "fallback");
    }

    #[test]
    fn query_param_reads_a_single_key() {
        let mut request = HttpRequest::new(hyper::Body::empty());
        *request.uri_mut() = hyper::Uri::try_from("http://localhost/search?q=rust&page=2").unwrap();
        let c = RequestContext::<(), ()>::new(Arc::new(()), (), request);
        assert_eq!(c.query_param("q"), Some("rust".to_string()));
        assert_eq!(c.query_param("page"), Some("2".to_string()));
        assert_eq!(c.query_param("missing"), None);
    }

    #[tokio::test]
    async fn form_value_reads_a_single_key() {
        let mut request = HttpRequest::new(hyper::Body::from("name=alice&role=admin"));
        request
            .headers_mut()
            .insert(hyper::header::CONTENT_TYPE, hyper::header::HeaderValue::from_static("application/x-www-form-urlencoded"));
        let mut c = RequestContext::<(), ()>::new(Arc::new(()), (), request);
        assert_eq!(c.form_value("name").await, Some("alice".to_string()));
    }
}
