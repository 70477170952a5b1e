use crate::request::RequestContext;
use std::future::Future;

/// Represents an async function borrowing the request context for `'a`.
///
/// It is implemented for every `Fn(&mut RequestContext) -> impl Future`, which lets async fn
/// items whose future borrows the context be used as handlers and middlewares:
///```no_run
/// use micro_rest::{HandlerResult, Reply, RequestContext};
///
/// async fn hello(ctx: &mut RequestContext) -> HandlerResult {
///     Ok(Reply::ok(ctx.path()))
/// }
///```
/// Bound as `for<'a> ContextFn<'a, Out>`, the returned future may live exactly as long as the
/// borrow of the context.
pub trait ContextFn<'a, Out>: Send + Sync {
    type Future: Future<Output = Out> + Send + 'a;

    fn call(&self, ctx: &'a mut RequestContext) -> Self::Future;
}

impl<'a, Func, Fut, Out> ContextFn<'a, Out> for Func
where
    Func: Fn(&'a mut RequestContext) -> Fut + Send + Sync,
    Fut: Future<Output = Out> + Send + 'a,
{
    type Future = Fut;

    #[inline]
    fn call(&self, ctx: &'a mut RequestContext) -> Self::Future {
        (self)(ctx)
    }
}
