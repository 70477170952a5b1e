//! The per-request dispatch state machine.
//!
//! ```text
//! Idle -> ServiceMiddlewares -> RouteMiddlewares -> HandlerExecuting -> ResponseWritten
//!   \______________\___________________\___________________\____________> Aborted
//! ```
//!
//! Every phase but the two terminal ones can abort. The final phase is attached to the response
//! extensions.

use crate::error::{BoxError, DispatchError, MatchError};
use crate::middleware::Middleware;
use crate::reply::Reply;
use crate::request::RequestContext;
use crate::service::Service;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tracing::{debug, error, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Idle,
    ServiceMiddlewares,
    RouteMiddlewares,
    HandlerExecuting,
    ResponseWritten,
    Aborted,
}

impl Phase {
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::ResponseWritten | Phase::Aborted)
    }

    pub fn can_advance_to(self, next: Phase) -> bool {
        match (self, next) {
            (Phase::Idle, Phase::ServiceMiddlewares)
            | (Phase::ServiceMiddlewares, Phase::RouteMiddlewares)
            | (Phase::RouteMiddlewares, Phase::HandlerExecuting)
            | (Phase::HandlerExecuting, Phase::ResponseWritten) => true,
            (from, Phase::Aborted) => !from.is_terminal(),
            _ => false,
        }
    }
}

#[derive(Debug)]
pub(crate) struct Dispatch {
    phase: Phase,
}

impl Dispatch {
    pub(crate) fn new() -> Self {
        Self { phase: Phase::Idle }
    }

    #[inline]
    pub(crate) fn phase(&self) -> Phase {
        self.phase
    }

    fn advance(&mut self, next: Phase) {
        debug_assert!(self.phase.can_advance_to(next), "{:?} can't advance to {:?}", self.phase, next);
        trace!(from = ?self.phase, to = ?next, "dispatch phase");
        self.phase = next;
    }

    /// Aborts a request that never reached a service.
    pub(crate) fn abort(&mut self) {
        self.advance(Phase::Aborted);
    }

    /// Runs `service` for the path segments left once the API and service prefixes are stripped.
    ///
    /// Panics raised by middlewares or by the handler are caught and turned into a 500.
    pub(crate) async fn run(
        &mut self,
        service: &Service,
        route_segments: &[&str],
        ctx: &mut RequestContext,
    ) -> Result<Reply, DispatchError> {
        let result = match AssertUnwindSafe(self.steps(service, route_segments, ctx)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(cause = %message, phase = ?self.phase, "request panicked");
                Err(DispatchError::Handler(BoxError::from(message)))
            }
        };

        match result {
            Ok(reply) => {
                self.advance(Phase::ResponseWritten);
                Ok(reply)
            }
            Err(e) => {
                self.advance(Phase::Aborted);
                Err(e)
            }
        }
    }

    async fn steps(
        &mut self,
        service: &Service,
        route_segments: &[&str],
        ctx: &mut RequestContext,
    ) -> Result<Reply, DispatchError> {
        self.advance(Phase::ServiceMiddlewares);
        service.middlewares().handle(ctx).await?;

        // not-found errors name the whole request path, not the part left for the trie
        let matched = service.trie().at_segments(ctx.method(), route_segments).map_err(|e| match e {
            MatchError::RouteNotFound { .. } => MatchError::RouteNotFound { path: ctx.path().to_owned() },
            other => other,
        })?;
        let (route, params) = matched.into_parts();
        debug!(service = %service.prefix(), pattern = %route.pattern(), "route matched");
        ctx.bind_path(params);

        self.advance(Phase::RouteMiddlewares);
        route.middlewares().handle(ctx).await?;

        self.advance(Phase::HandlerExecuting);
        route.handler().handle(ctx).await.map_err(DispatchError::Handler)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    match panic.downcast_ref::<&str>() {
        Some(message) => (*message).to_owned(),
        None => panic.downcast_ref::<String>().cloned().unwrap_or_else(|| "handler panicked".to_owned()),
    }
}

/// The reply rendered for a request that ended early.
pub(crate) fn failure_reply(error: DispatchError) -> Reply {
    match error {
        DispatchError::Rejected(rejection) => {
            if !rejection.status().is_success() {
                warn!(status = %rejection.status(), message = rejection.message(), "request rejected");
            }
            Reply::from(rejection)
        }
        DispatchError::Route(e) => {
            debug!(cause = %e, "no route");
            Reply::error(e.status(), e.to_string())
        }
        DispatchError::Handler(e) => {
            error!(cause = %e, "handler failed");
            Reply::internal_server_error(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Dispatch, Phase, failure_reply};
    use crate::error::{DispatchError, MatchError, Rejection};
    use crate::middleware::{Middlewares, middleware_fn};
    use crate::router::{Routes, get, split_path};
    use crate::service::{Service, ServiceApi};
    use crate::{HandlerResult, Reply, RequestContext, handler_fn};
    use bytes::Bytes;
    use http::{Method, Request, StatusCode};
    use http_body_util::Full;

    #[test]
    fn test_phase_transitions() {
        assert!(Phase::Idle.can_advance_to(Phase::ServiceMiddlewares));
        assert!(Phase::ServiceMiddlewares.can_advance_to(Phase::RouteMiddlewares));
        assert!(Phase::RouteMiddlewares.can_advance_to(Phase::HandlerExecuting));
        assert!(Phase::HandlerExecuting.can_advance_to(Phase::ResponseWritten));

        assert!(!Phase::Idle.can_advance_to(Phase::HandlerExecuting));
        assert!(!Phase::RouteMiddlewares.can_advance_to(Phase::ServiceMiddlewares));

        for phase in [Phase::Idle, Phase::ServiceMiddlewares, Phase::RouteMiddlewares, Phase::HandlerExecuting] {
            assert!(phase.can_advance_to(Phase::Aborted), "{phase:?}");
            assert!(!phase.is_terminal());
        }
        for phase in [Phase::ResponseWritten, Phase::Aborted] {
            assert!(phase.is_terminal());
            assert!(!phase.can_advance_to(Phase::Aborted));
        }
    }

    async fn ok(_ctx: &mut RequestContext) -> HandlerResult {
        Ok(Reply::ok("done"))
    }

    async fn fail(_ctx: &mut RequestContext) -> HandlerResult {
        Err("database unreachable".into())
    }

    async fn explode(_ctx: &mut RequestContext) -> HandlerResult {
        panic!("boom")
    }

    async fn deny(_ctx: &mut RequestContext) -> Result<(), Rejection> {
        Err(Rejection::forbidden("denied"))
    }

    struct Fixture {
        deny: bool,
    }

    impl ServiceApi for Fixture {
        fn prefix(&self) -> &str {
            "jobs"
        }

        fn routes(&self) -> Routes {
            Routes::new()
                .route("ok", get(handler_fn(ok)))
                .route("fail", get(handler_fn(fail)))
                .route("explode", get(handler_fn(explode)))
        }

        fn middlewares(&self) -> Middlewares {
            if self.deny { Middlewares::new().add_last(middleware_fn(deny)) } else { Middlewares::new() }
        }
    }

    async fn run(deny: bool, method: Method, route_path: &str) -> (Result<Reply, DispatchError>, Phase) {
        let segments = split_path(route_path);
        let service = Service::build(&Fixture { deny }).unwrap();
        let request = Request::builder().method(method).uri("/").body(Full::new(Bytes::new())).unwrap();
        let mut ctx = RequestContext::new(request);

        let mut dispatch = Dispatch::new();
        let result = dispatch.run(&service, &segments, &mut ctx).await;
        (result, dispatch.phase())
    }

    #[tokio::test]
    async fn test_handler_reply() {
        let (result, phase) = run(false, Method::GET, "ok").await;
        assert_eq!(result.unwrap(), Reply::ok("done"));
        assert_eq!(phase, Phase::ResponseWritten);
    }

    #[tokio::test]
    async fn test_handler_error() {
        let (result, phase) = run(false, Method::GET, "fail").await;
        let reply = failure_reply(result.unwrap_err());
        assert_eq!(reply, Reply::internal_server_error("database unreachable"));
        assert_eq!(phase, Phase::Aborted);
    }

    #[tokio::test]
    async fn test_handler_panic() {
        let (result, phase) = run(false, Method::GET, "explode").await;
        let error = result.unwrap_err();
        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.to_string(), "boom");
        assert_eq!(phase, Phase::Aborted);
    }

    #[tokio::test]
    async fn test_lookup_failures() {
        let (result, phase) = run(false, Method::POST, "ok").await;
        assert!(matches!(result, Err(DispatchError::Route(MatchError::MethodNotAllowed { .. }))));
        assert_eq!(phase, Phase::Aborted);

        let (result, _) = run(false, Method::GET, "missing").await;
        assert_eq!(failure_reply(result.unwrap_err()).status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_service_middleware_rejects() {
        let (result, phase) = run(true, Method::GET, "ok").await;
        assert_eq!(failure_reply(result.unwrap_err()), Reply::forbidden("denied"));
        assert_eq!(phase, Phase::Aborted);
    }

    #[test]
    fn test_abort_before_service() {
        let mut dispatch = Dispatch::new();
        dispatch.abort();
        assert_eq!(dispatch.phase(), Phase::Aborted);
    }
}
