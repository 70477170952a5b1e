use crate::error::BoxError;
use crate::fn_trait::ContextFn;
use crate::reply::Reply;
use crate::request::RequestContext;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// The outcome of a handler; any `Err` is answered with a 500.
pub type HandlerResult = Result<Reply, BoxError>;

#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, ctx: &mut RequestContext) -> HandlerResult;
}

#[async_trait]
impl<H: RequestHandler + ?Sized> RequestHandler for Box<H> {
    async fn handle(&self, ctx: &mut RequestContext) -> HandlerResult {
        (**self).handle(ctx).await
    }
}

#[async_trait]
impl<H: RequestHandler + ?Sized> RequestHandler for Arc<H> {
    async fn handle(&self, ctx: &mut RequestContext) -> HandlerResult {
        (**self).handle(ctx).await
    }
}

/// a `ContextFn` holder which represents any async Fn handling a request
pub struct FnHandler<F> {
    f: F,
}

impl<F> FnHandler<F>
where
    F: for<'a> ContextFn<'a, HandlerResult> + Send + Sync,
{
    fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: for<'a> ContextFn<'a, HandlerResult> + Send + Sync,
{
    FnHandler::new(f)
}

#[async_trait]
impl<F> RequestHandler for FnHandler<F>
where
    F: for<'a> ContextFn<'a, HandlerResult> + Send + Sync,
{
    async fn handle(&self, ctx: &mut RequestContext) -> HandlerResult {
        self.f.call(ctx).await
    }
}
