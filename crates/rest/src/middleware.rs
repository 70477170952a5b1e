//! Middlewares run before a handler.
//!
//! Services and routes hold ordered lists of middlewares. They run in registration order and the
//! first [`Rejection`] stops the chain: nothing after it runs, the handler included, and the
//! rejection is rendered to the client.

use crate::error::Rejection;
use crate::fn_trait::ContextFn;
use crate::request::RequestContext;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, ctx: &mut RequestContext) -> Result<(), Rejection>;

    /// The path capture this middleware reads, checked against the route pattern at build time.
    fn path_capture(&self) -> Option<&str> {
        None
    }
}

#[async_trait]
impl<M: Middleware + ?Sized> Middleware for Box<M> {
    async fn handle(&self, ctx: &mut RequestContext) -> Result<(), Rejection> {
        (**self).handle(ctx).await
    }

    fn path_capture(&self) -> Option<&str> {
        (**self).path_capture()
    }
}

#[async_trait]
impl<M: Middleware + ?Sized> Middleware for Arc<M> {
    async fn handle(&self, ctx: &mut RequestContext) -> Result<(), Rejection> {
        (**self).handle(ctx).await
    }

    fn path_capture(&self) -> Option<&str> {
        (**self).path_capture()
    }
}

/// An ordered list of middlewares.
#[derive(Default)]
pub struct Middlewares {
    inner: Vec<Box<dyn Middleware>>,
}

impl Middlewares {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_last<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.inner.push(Box::new(middleware));
        self
    }

    pub fn add_first<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.inner.insert(0, Box::new(middleware));
        self
    }

    pub(crate) fn push(&mut self, middleware: Box<dyn Middleware>) {
        self.inner.push(middleware);
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Middleware> {
        self.inner.iter().map(Box::as_ref)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl fmt::Debug for Middlewares {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Middlewares").field("len", &self.inner.len()).finish()
    }
}

#[async_trait]
impl Middleware for Middlewares {
    async fn handle(&self, ctx: &mut RequestContext) -> Result<(), Rejection> {
        for middleware in self.inner.iter() {
            middleware.handle(ctx).await?;
        }
        Ok(())
    }
}

/// a `ContextFn` holder which represents any async Fn checking a request
pub struct FnMiddleware<F> {
    f: F,
}

impl<F> fmt::Debug for FnMiddleware<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnMiddleware").finish_non_exhaustive()
    }
}

pub fn middleware_fn<F>(f: F) -> FnMiddleware<F>
where
    F: for<'a> ContextFn<'a, Result<(), Rejection>> + Send + Sync,
{
    FnMiddleware { f }
}

#[async_trait]
impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> ContextFn<'a, Result<(), Rejection>> + Send + Sync,
{
    async fn handle(&self, ctx: &mut RequestContext) -> Result<(), Rejection> {
        self.f.call(ctx).await
    }
}
