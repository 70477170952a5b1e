//! An async routing and dispatch engine for REST services.
//!
//! Services group routes under a path prefix. Each request goes through the same pipeline:
//!
//! 1. the service owning the path is picked, the longest prefix winning
//! 2. the service middlewares run
//! 3. the route trie resolves the method and the remaining path, binding path captures
//! 4. the route middlewares run: parameter declarations, validators, custom checks
//! 5. the handler runs and returns a [`Reply`]
//! 6. the reply, or the error that ended the request, is rendered through the configured
//!    [`Envelope`](envelope::Envelope) and [`Marshaler`](envelope::Marshaler)
//!
//! ```no_run
//! use micro_rest::params::{self, Placement};
//! use micro_rest::router::{Routes, get};
//! use micro_rest::{Engine, HandlerResult, Reply, RequestContext, ServiceApi, handler_fn};
//!
//! struct Users;
//!
//! async fn find(ctx: &mut RequestContext) -> HandlerResult {
//!     let id: i64 = ctx.declared(Placement::Path, "id")?;
//!     Ok(Reply::ok(&id))
//! }
//!
//! impl ServiceApi for Users {
//!     fn prefix(&self) -> &str {
//!         "users"
//!     }
//!
//!     fn routes(&self) -> Routes {
//!         Routes::new().route("{id}", get(handler_fn(find)).with(params::integer(Placement::Path, "id")))
//!     }
//! }
//!
//! # async fn serve(request: http::Request<http_body_util::Full<bytes::Bytes>>) {
//! let engine = Engine::builder().service(Users).build().unwrap();
//! // GET /api/users/42 -> 200 {"result":42}
//! let response = engine.dispatch(request).await;
//! # }
//! ```

mod body;
mod config;
mod dispatch;
mod engine;
mod fn_trait;
mod handler;
mod middleware;
mod reply;
mod request;
mod service;

pub mod envelope;
pub mod error;
pub mod params;
pub mod router;

pub use body::ResponseBody;
pub use config::EngineConfig;
pub use dispatch::Phase;
pub use engine::Engine;
pub use engine::EngineBuilder;
pub use fn_trait::ContextFn;
pub use handler::FnHandler;
pub use handler::HandlerResult;
pub use handler::RequestHandler;
pub use handler::handler_fn;
pub use middleware::FnMiddleware;
pub use middleware::Middleware;
pub use middleware::Middlewares;
pub use middleware::middleware_fn;
pub use reply::Content;
pub use reply::Reply;
pub use request::PathParams;
pub use request::RequestContext;
pub use service::ServiceApi;
