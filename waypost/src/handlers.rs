use std::future::Future;
use std::sync::Arc;

use crate::middleware::Middleware;
use crate::prelude::*;

/// A type that can act as a route endpoint, handling a matched request and
/// producing either a [`Response`] or an application error.
///
/// Path parameters captured by the matched route are available both as
/// the `params` argument and via `ctx.path_values()`.
#[async_trait]
pub trait Handler<GlobalCtx, LocalCtx, Err>: Send + Sync + 'static {
    async fn handle(
        &self,
        ctx: &mut RequestContext<GlobalCtx, LocalCtx>,
        params: PathValues,
    ) -> Result<Response, Err>;
}

#[async_trait]
impl<G, L, E, F, Fut> Handler<G, L, E> for F
where
    G: Send + Sync + 'static,
    L: Send + 'static,
    E: Send + 'static,
    F: Fn(&mut RequestContext<G, L>, PathValues) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, E>> + Send + 'static,
{
    async fn handle(&self, ctx: &mut RequestContext<G, L>, params: PathValues) -> Result<Response, E> {
        (self)(ctx, params).await
    }
}

pub type WrappedHandler<GlobalCtx, LocalCtx, Err> = Arc<dyn Handler<GlobalCtx, LocalCtx, Err>>;

/// Create a WrappedHandler from any type that implements the Handler trait.
///
/// Note: for closure arguments, at least the ctx argument (`&mut RequestContext<GlobalCtx, LocalCtx>`)
/// must be type hinted for this function to identify the Handler trait.
/// For simple closures that don't need arguments, use the `closure` function
/// to wrap.
pub fn wrapped<GlobalCtx, LocalCtx, Err, F>(handler: F) -> WrappedHandler<GlobalCtx, LocalCtx, Err>
where
    F: Handler<GlobalCtx, LocalCtx, Err>,
{
    Arc::new(handler)
}

// Use same type hints as the impl Handler for F above
pub fn closure<GlobalCtx, LocalCtx, Err, F, Fut>(handler: F) -> WrappedHandler<GlobalCtx, LocalCtx, Err>
where
    GlobalCtx: Send + Sync + 'static,
    LocalCtx: Send + 'static,
    Err: Send + 'static,
    F: Fn(&mut RequestContext<GlobalCtx, LocalCtx>, PathValues) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, Err>> + Send + 'static,
{
    wrapped(handler)
}

pub fn default_error_handler<GlobalCtx, LocalCtx, Err>(_: &mut RequestContext<GlobalCtx, LocalCtx>, _: Err) -> Response {
    respond::status(Status::INTERNAL_SERVER_ERROR)
}

/// Adapts a [`Handler`] plus its error handler into a [`Middleware`], so
/// the router's trie only ever has to store one kind of thing: a fully
/// composed, type-erased per-route call chain (route-specific middleware
/// wrapping the handler invocation).
pub(crate) struct Terminal<G, L, E, H> {
    pub(crate) handler: H,
    pub(crate) error_handler: Arc<dyn Fn(&mut RequestContext<G, L>, E) -> Response + Send + Sync>,
}

#[async_trait]
impl<G, L, E, H> Middleware<G, L> for Terminal<G, L, E, H>
where
    G: Send + Sync + 'static,
    L: Send + Sync + 'static,
    E: Send + 'static,
    H: Handler<G, L, E>,
{
    async fn call(&self, ctx: &mut RequestContext<G, L>) -> HttpResponse {
        let params = ctx.path_values().clone();
        let response = match self.handler.handle(ctx, params).await {
            Ok(response) => response,
            Err(e) => (self.error_handler)(ctx, e),
        };
        HttpResponse::from(response)
    }
}

#[cfg(test)]
mod test {
    use crate::prelude::*;
    use std::sync::Arc;

    #[derive(Debug)]
    enum Error {}

    struct StructHandler;
    #[async_trait]
    impl Handler<(), (), Error> for StructHandler {
        async fn handle(&self, _: &mut RequestContext<(), ()>, _: PathValues) -> Result<Response, Error> {
            Ok(respond::ok())
        }
    }

    #[tokio::test]
    async fn handler_wrapping_works() {
        let hs: Vec<WrappedHandler<(), (), Error>> = vec![
            super::wrapped(StructHandler {}),
            super::wrapped(|_: &mut RequestContext<(), ()>, _| async { Ok(respond::ok()) }),
            super::closure(|_, _| async { Ok(respond::ok()) }),
            Arc::new(|_: &mut RequestContext<(), ()>, _| Box::pin(async { Ok(respond::ok()) })),
        ];
        let gctx = Arc::new(());

        for h in hs {
            let mut ctx = RequestContext::new(gctx.clone(), (), HttpRequest::new(hyper::Body::empty()));
            let params = PathValues::new();
            let res = h.handle(&mut ctx, params).await;
            let res = hyper::Response::<hyper::Body>::from(res.unwrap());
            assert!(res.status().is_success())
        }
    }
}
