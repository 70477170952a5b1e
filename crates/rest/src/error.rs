//! Error types produced while registering routes and dispatching requests.
//!
//! The errors are layered the same way a request flows through the engine:
//!
//! - [`RouteError`] and [`BuildError`]: registration time, reported by [`crate::Engine::builder`]
//! - [`MatchError`]: route lookup misses
//! - [`ParamError`]: parameter and body extraction failures
//! - [`Rejection`]: the explicit `(status, message)` result of a middleware
//! - [`MarshalError`]: rendering failures
//! - [`DispatchError`]: everything that can end a request early, with its status

use crate::params::Placement;
use http::{Method, StatusCode};
use std::error::Error;
use std::fmt::Display;
use thiserror::Error;

pub type BoxError = Box<dyn Error + Send + Sync>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("route '{method} /{pattern}' is already registered")]
    Conflict { method: Method, pattern: String },

    #[error("pattern '{pattern}' contains an empty segment")]
    EmptySegment { pattern: String },

    #[error("pattern '{pattern}' contains a capture without name")]
    EmptyCapture { pattern: String },

    #[error("capture '{name}' is used more than once in pattern '{pattern}'")]
    DuplicateCapture { name: String, pattern: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MatchError {
    #[error("method '{method}' not allowed")]
    MethodNotAllowed { method: Method },

    #[error("path '{path}' not found")]
    RouteNotFound { path: String },
}

impl MatchError {
    pub fn status(&self) -> StatusCode {
        match self {
            MatchError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            MatchError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
        }
    }
}

#[derive(Debug, Error)]
pub enum ParamError {
    #[error("parameter '{name}' not found in {placement}")]
    Missing { name: String, placement: Placement },

    #[error("parameter '{name}' is not of type {expected}: '{raw}'")]
    InvalidType { name: String, expected: String, raw: String },

    #[error("parameter '{name}' is invalid: {reason}")]
    Invalid { name: String, reason: String },

    #[error("parameter '{name}' in {placement} was not declared by the route")]
    Undeclared { name: String, placement: Placement },

    #[error("parameter '{name}' was declared as {declared}, it can't be read as '{target}'")]
    DeclaredAs { name: String, declared: String, target: &'static str },

    #[error("malformed query string: {reason}")]
    MalformedQuery { reason: String },

    #[error("content-type not supported: '{content_type}'")]
    UnsupportedContentType { content_type: String },

    #[error("decoding body failed: {reason}")]
    BodyDecode { reason: String },

    #[error("reading body failed: {source}")]
    BodyRead { source: BoxError },

    #[error("body of type '{content_type}' can't be bound to '{target}'")]
    BodyTypeMismatch { content_type: String, target: &'static str },
}

impl ParamError {
    pub fn missing(name: impl Into<String>, placement: Placement) -> Self {
        Self::Missing { name: name.into(), placement }
    }

    pub fn invalid_type(name: impl Into<String>, expected: impl Display, raw: impl Into<String>) -> Self {
        Self::InvalidType { name: name.into(), expected: expected.to_string(), raw: raw.into() }
    }

    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid { name: name.into(), reason: reason.into() }
    }

    pub fn undeclared(name: impl Into<String>, placement: Placement) -> Self {
        Self::Undeclared { name: name.into(), placement }
    }

    pub fn declared_as(name: impl Into<String>, declared: impl Display, target: &'static str) -> Self {
        Self::DeclaredAs { name: name.into(), declared: declared.to_string(), target }
    }

    pub fn malformed_query(reason: impl Display) -> Self {
        Self::MalformedQuery { reason: reason.to_string() }
    }

    pub fn unsupported_content_type(content_type: impl Into<String>) -> Self {
        Self::UnsupportedContentType { content_type: content_type.into() }
    }

    pub fn body_decode(reason: impl Display) -> Self {
        Self::BodyDecode { reason: reason.to_string() }
    }

    pub fn body_read(source: impl Into<BoxError>) -> Self {
        Self::BodyRead { source: source.into() }
    }

    pub fn body_type_mismatch(content_type: impl Into<String>, target: &'static str) -> Self {
        Self::BodyTypeMismatch { content_type: content_type.into(), target }
    }

    /// Returns true if the parameter had no value at all.
    #[inline]
    pub fn is_missing(&self) -> bool {
        matches!(self, ParamError::Missing { .. })
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ParamError::Missing { .. }
            | ParamError::InvalidType { .. }
            | ParamError::Invalid { .. }
            | ParamError::MalformedQuery { .. }
            | ParamError::UnsupportedContentType { .. }
            | ParamError::BodyDecode { .. } => StatusCode::BAD_REQUEST,
            ParamError::Undeclared { .. }
            | ParamError::DeclaredAs { .. }
            | ParamError::BodyRead { .. }
            | ParamError::BodyTypeMismatch { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("marshaling response failed: {reason}")]
pub struct MarshalError {
    reason: String,
}

impl MarshalError {
    pub fn new(reason: impl Display) -> Self {
        Self { reason: reason.to_string() }
    }
}

/// The outcome of a failed middleware: the status and message rendered to the client.
///
/// A rejection carrying a success status is not an error for the client, it only stops the
/// chain and answers with an empty response of that status.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct Rejection {
    status: StatusCode,
    message: String,
}

impl Rejection {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Stops the chain and answers with `status` and no content.
    pub fn answer(status: StatusCode) -> Self {
        Self::new(status, String::new())
    }

    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<ParamError> for Rejection {
    fn from(error: ParamError) -> Self {
        Self::new(error.status(), error.to_string())
    }
}

impl From<MatchError> for Rejection {
    fn from(error: MatchError) -> Self {
        Self::new(error.status(), error.to_string())
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error(transparent)]
    Route(#[from] MatchError),

    #[error("{0}")]
    Handler(BoxError),
}

impl DispatchError {
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::Rejected(rejection) => rejection.status(),
            DispatchError::Route(error) => error.status(),
            DispatchError::Handler(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("service prefix '{prefix}' is registered twice")]
    DuplicateService { prefix: String },

    #[error("invalid route in service '{service}': {source}")]
    Route {
        service: String,
        #[source]
        source: RouteError,
    },

    #[error("route '{method} /{pattern}' of service '{service}' declares unknown path parameter '{name}'")]
    UnknownPathParameter { service: String, method: Method, pattern: String, name: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_error_status() {
        assert_eq!(ParamError::missing("id", Placement::Path).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ParamError::invalid_type("n", "int", "abc").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ParamError::unsupported_content_type("image/png").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ParamError::undeclared("n", Placement::Query).status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            ParamError::body_type_mismatch("text/plain", "Vec<u8>").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn param_error_into_rejection() {
        let rejection = Rejection::from(ParamError::invalid_type("n", "int", "abc"));
        assert_eq!(rejection.status(), StatusCode::BAD_REQUEST);
        assert_eq!(rejection.message(), "parameter 'n' is not of type int: 'abc'");
    }

    #[test]
    fn dispatch_error_status() {
        let not_allowed = DispatchError::from(MatchError::MethodNotAllowed { method: Method::PATCH });
        assert_eq!(not_allowed.status(), StatusCode::METHOD_NOT_ALLOWED);

        let not_found = DispatchError::from(MatchError::RouteNotFound { path: "a/b".into() });
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let handler = DispatchError::Handler("boom".into());
        assert_eq!(handler.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(handler.to_string(), "boom");

        let rejected = DispatchError::from(Rejection::forbidden("no token"));
        assert_eq!(rejected.status(), StatusCode::FORBIDDEN);
        assert_eq!(rejected.to_string(), "no token");
    }
}
