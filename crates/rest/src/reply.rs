//! Replies returned by handlers and their rendering into HTTP responses.
//!
//! A [`Reply`] is the single outcome of a handler: a status and either nothing, a payload, or an
//! error message. The engine renders it once, through the configured [`Envelope`] and
//! [`Marshaler`], so a handler cannot write a response twice.

use crate::body::ResponseBody;
use crate::envelope::{Envelope, Marshaler};
use crate::error::{MarshalError, Rejection};
use http::header::{CONTENT_TYPE, HeaderValue};
use http::{Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::error;

const FALLBACK_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// What a reply carries besides its status.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Empty,
    Payload(Value),
    Error(String),
    /// The payload could not be turned into a value; rendered as a 500.
    Unserializable(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    status: StatusCode,
    content: Content,
}

impl Reply {
    /// Replies 200 with `payload`.
    pub fn ok<T: Serialize + ?Sized>(payload: &T) -> Self {
        Self::object(StatusCode::OK, payload)
    }

    /// Replies `status` with `payload`.
    pub fn object<T: Serialize + ?Sized>(status: StatusCode, payload: &T) -> Self {
        let content = match serde_json::to_value(payload) {
            Ok(value) => Content::Payload(value),
            Err(e) => Content::Unserializable(e.to_string()),
        };
        Self { status, content }
    }

    /// Replies 201 without content.
    pub fn created() -> Self {
        Self::without_content(StatusCode::CREATED)
    }

    /// Replies 204 without content.
    pub fn no_content() -> Self {
        Self::without_content(StatusCode::NO_CONTENT)
    }

    pub fn without_content(status: StatusCode) -> Self {
        Self { status, content: Content::Empty }
    }

    /// Replies `status` with an error message.
    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, content: Content::Error(message.into()) }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::error(StatusCode::BAD_REQUEST, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::error(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::error(StatusCode::NOT_FOUND, message)
    }

    pub fn method_not_allowed(message: impl Into<String>) -> Self {
        Self::error(StatusCode::METHOD_NOT_ALLOWED, message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::error(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[inline]
    pub fn content(&self) -> &Content {
        &self.content
    }

    /// Renders the reply: status first, then the marshaled object and its content type.
    ///
    /// A reply that fails to marshal is answered with a plain-text 500.
    pub(crate) fn render(self, marshaler: &dyn Marshaler, envelope: &dyn Envelope) -> Response<ResponseBody> {
        let object = match self.content {
            Content::Empty => return bodiless(self.status),
            Content::Payload(payload) => envelope.payload(payload),
            Content::Error(message) => envelope.error(&message),
            Content::Unserializable(reason) => {
                let e = MarshalError::new(reason);
                error!(cause = %e, status = %self.status, "serializing reply payload failed");
                return fallback(&e);
            }
        };

        match marshaler.marshal(&object) {
            Ok(bytes) => {
                let mut response = Response::new(ResponseBody::once(bytes));
                *response.status_mut() = self.status;
                if let Ok(value) = HeaderValue::from_str(marshaler.content_type().as_ref()) {
                    response.headers_mut().insert(CONTENT_TYPE, value);
                }
                response
            }
            Err(e) => {
                error!(cause = %e, status = %self.status, "marshaling reply failed");
                fallback(&e)
            }
        }
    }
}

impl From<Rejection> for Reply {
    /// A rejection with a success status is answered without content.
    fn from(rejection: Rejection) -> Self {
        let status = rejection.status();
        if status.is_success() { Self::without_content(status) } else { Self::error(status, rejection.message()) }
    }
}

fn bodiless(status: StatusCode) -> Response<ResponseBody> {
    let mut response = Response::new(ResponseBody::empty());
    *response.status_mut() = status;
    response
}

fn fallback(e: &MarshalError) -> Response<ResponseBody> {
    let mut response = Response::new(ResponseBody::from(format!("internal server error: {e}")));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static(FALLBACK_CONTENT_TYPE));
    response
}

#[cfg(test)]
mod tests {
    use super::{Content, Reply};
    use crate::envelope::{AsIs, JsonMarshaler, MockMarshaler, Wrapped};
    use crate::error::{MarshalError, Rejection};
    use bytes::Bytes;
    use http::StatusCode;
    use http::header::CONTENT_TYPE;
    use serde::Serialize;
    use serde::ser::Error as _;
    use serde_json::json;
    use std::collections::HashMap;

    #[derive(Serialize)]
    struct Note {
        id: i64,
        title: &'static str,
    }

    fn body_of(response: &http::Response<crate::ResponseBody>) -> Bytes {
        response.body().as_bytes().cloned().unwrap_or_default()
    }

    #[test]
    fn test_ok_is_wrapped() {
        let response = Reply::ok(&Note { id: 1, title: "groceries" }).render(&JsonMarshaler, &Wrapped::default());

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        let body: serde_json::Value = serde_json::from_slice(&body_of(&response)).unwrap();
        assert_eq!(body, json!({"result": {"id": 1, "title": "groceries"}}));
    }

    #[test]
    fn test_error_as_is() {
        let response = Reply::forbidden("no token").render(&JsonMarshaler, &AsIs);

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_of(&response), Bytes::from_static(br#""no token""#));
    }

    #[test]
    fn test_without_content() {
        for reply in [Reply::created(), Reply::no_content(), Reply::without_content(StatusCode::ACCEPTED)] {
            let status = reply.status();
            let response = reply.render(&JsonMarshaler, &Wrapped::default());

            assert_eq!(response.status(), status);
            assert!(response.headers().get(CONTENT_TYPE).is_none());
            assert!(response.body().as_bytes().is_none());
        }
    }

    #[test]
    fn test_constructors() {
        assert_eq!(Reply::bad_request("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(Reply::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(Reply::method_not_allowed("x").status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(Reply::internal_server_error("x").content(), &Content::Error("x".into()));
        assert_eq!(Reply::object(StatusCode::CREATED, &[1, 2]).content(), &Content::Payload(json!([1, 2])));
    }

    #[test]
    fn test_marshal_failure_falls_back_to_plain_text() {
        let mut marshaler = MockMarshaler::new();
        marshaler.expect_marshal().times(1).returning(|_| Err(MarshalError::new("disk full")));
        marshaler.expect_content_type().never();

        let response = Reply::ok(&1).render(&marshaler, &Wrapped::default());

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
        assert_eq!(
            body_of(&response),
            Bytes::from_static(b"internal server error: marshaling response failed: disk full")
        );
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("not representable"))
        }
    }

    #[test]
    fn test_unserializable_payload() {
        let reply = Reply::ok(&Unserializable);
        assert!(matches!(reply.content(), Content::Unserializable(_)));

        let mut marshaler = MockMarshaler::new();
        marshaler.expect_marshal().never();

        let response = reply.render(&marshaler, &Wrapped::default());
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        // map keys must be strings in JSON
        let keys = HashMap::from([((1, 2), "pair")]);
        assert!(matches!(Reply::ok(&keys).content(), Content::Unserializable(_)));
    }

    #[test]
    fn test_rejection_into_reply() {
        assert_eq!(Reply::from(Rejection::forbidden("no token")), Reply::forbidden("no token"));
        assert_eq!(Reply::from(Rejection::answer(StatusCode::OK)), Reply::without_content(StatusCode::OK));
        assert_eq!(Reply::from(Rejection::new(StatusCode::OK, "ignored")), Reply::without_content(StatusCode::OK));
    }
}
