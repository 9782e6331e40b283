//! A mutex-guarded free-list of [`RequestContext`]s, so the dispatcher
//! doesn't allocate a fresh context (and its path-value/store backing
//! storage) for every request.

use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use crate::context::RequestContext;
use crate::HttpRequest;

pub struct ContextPool<GlobalCtx, LocalCtx> {
    free: Mutex<Vec<RequestContext<GlobalCtx, LocalCtx>>>,
}

impl<G, L> ContextPool<G, L>
where
    L: Default,
{
    pub fn new() -> Self {
        Self { free: Mutex::new(Vec::new()) }
    }

    /// Take a context from the free list, resetting it for `request`, or
    /// allocate a new one if the pool is empty.
    pub fn acquire(&self, global: Arc<G>, request: HttpRequest, cancellation: CancellationToken) -> RequestContext<G, L> {
        let reused = self.free.lock().unwrap_or_else(|e| e.into_inner()).pop();
        match reused {
            Some(mut ctx) => {
                ctx.reset(global, request, cancellation);
                ctx
            }
            None => RequestContext::for_pool(global, request, cancellation),
        }
    }

    /// Return a context to the free list once the request it served has
    /// been fully dispatched and its response committed.
    pub fn release(&self, context: RequestContext<G, L>) {
        self.free.lock().unwrap_or_else(|e| e.into_inner()).push(context);
    }
}

impl<G, L> Default for ContextPool<G, L>
where
    L: Default,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn released_context_is_reused() {
        let pool: ContextPool<(), ()> = ContextPool::new();
        let mut ctx = pool.acquire(Arc::new(()), HttpRequest::new(hyper::Body::empty()), CancellationToken::new());
        ctx.set("marker", 1u8);
        pool.release(ctx);
        assert_eq!(pool.free.lock().unwrap().len(), 1);

        let reused = pool.acquire(Arc::new(()), HttpRequest::new(hyper::Body::empty()), CancellationToken::new());
        assert!(reused.get::<u8>("marker").is_none());
        assert!(pool.free.lock().unwrap().is_empty());
    }
}
