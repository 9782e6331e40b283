//! A read-mostly wrapper around [`Router`] for servers that register
//! routes after startup (e.g. plugin-driven or hot-reloaded APIs).
//!
//! Every dispatched request takes a read lock; registration takes a
//! write lock. Since routing a request never mutates the tree, many
//! requests proceed concurrently and only contend with (rare) writers.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::middleware::Middleware;
use crate::routes::{AddRouteError, Router};
use crate::{HttpResponse, RequestContext};

/// Thread-safe handle to a [`Router`], for registering routes from
/// multiple tasks or after the server has started listening.
pub struct ConcurrentRouter<GlobalCtx, LocalCtx, Err> {
    inner: RwLock<Router<GlobalCtx, LocalCtx, Err>>,
}

impl<G, L, E> ConcurrentRouter<G, L, E> {
    pub fn new(router: Router<G, L, E>) -> Self {
        Self { inner: RwLock::new(router) }
    }

    pub async fn add<H>(&self, method: hyper::Method, path: &str, handler: H) -> Result<(), AddRouteError>
    where
        H: crate::handlers::Handler<G, L, E> + 'static,
        G: Send + Sync + 'static,
        L: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        self.inner.write().await.add(vec![method], path, handler)
    }

    pub async fn remove(&self, method: hyper::Method, path: &str) {
        self.inner.write().await.remove(method, path)
    }

    pub async fn routes(&self) -> crate::routes::Routes
    where
        G: 'static,
        L: 'static,
    {
        self.inner.read().await.routes()
    }
}

#[async_trait::async_trait]
impl<G, L, E> Middleware<G, L> for ConcurrentRouter<G, L, E>
where
    G: Send + Sync + 'static,
    L: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    async fn call(&self, context: &mut RequestContext<G, L>) -> HttpResponse {
        let router = self.inner.read().await;
        router.call(context).await
    }
}
