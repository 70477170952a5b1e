//! How a reply payload is shaped and serialized.
//!
//! A [`Marshaler`] turns a JSON value into bytes and names the response content type. An
//! [`Envelope`] decides the shape of the value before marshaling: [`Wrapped`] puts payloads and
//! errors under configurable keys, [`AsIs`] leaves payloads untouched.

use crate::error::MarshalError;
use bytes::Bytes;
use mime::Mime;
use serde_json::{Map, Value};

/// Serializes response objects.
#[cfg_attr(test, mockall::automock)]
pub trait Marshaler: Send + Sync {
    /// The `Content-Type` of the marshaled bytes.
    fn content_type(&self) -> Mime;

    fn marshal(&self, object: &Value) -> Result<Bytes, MarshalError>;
}

/// Marshals objects as JSON with `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMarshaler;

impl Marshaler for JsonMarshaler {
    fn content_type(&self) -> Mime {
        mime::APPLICATION_JSON
    }

    fn marshal(&self, object: &Value) -> Result<Bytes, MarshalError> {
        serde_json::to_vec(object).map(Bytes::from).map_err(MarshalError::new)
    }
}

/// Shapes payloads and error messages into the object sent to the client.
pub trait Envelope: Send + Sync {
    fn payload(&self, payload: Value) -> Value;

    fn error(&self, message: &str) -> Value;
}

/// Sends payloads unchanged and errors as bare strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct AsIs;

impl Envelope for AsIs {
    fn payload(&self, payload: Value) -> Value {
        payload
    }

    fn error(&self, message: &str) -> Value {
        Value::String(message.to_owned())
    }
}

/// Wraps payloads and errors in an object: `{"result": ...}` and `{"error": "..."}` by default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wrapped {
    result_key: String,
    error_key: String,
}

impl Wrapped {
    pub fn new(result_key: impl Into<String>, error_key: impl Into<String>) -> Self {
        Self { result_key: result_key.into(), error_key: error_key.into() }
    }

    #[inline]
    pub fn result_key(&self) -> &str {
        &self.result_key
    }

    #[inline]
    pub fn error_key(&self) -> &str {
        &self.error_key
    }
}

impl Default for Wrapped {
    fn default() -> Self {
        Self::new("result", "error")
    }
}

impl Envelope for Wrapped {
    fn payload(&self, payload: Value) -> Value {
        let mut object = Map::with_capacity(1);
        object.insert(self.result_key.clone(), payload);
        Value::Object(object)
    }

    fn error(&self, message: &str) -> Value {
        let mut object = Map::with_capacity(1);
        object.insert(self.error_key.clone(), Value::String(message.to_owned()));
        Value::Object(object)
    }
}
