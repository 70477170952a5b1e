//! Request and response bodies.
//!
//! [`RequestBody`] reads the transport body at most once; every later access works on the
//! buffered bytes and on the cached decoded value. [`ResponseBody`] is the single-frame body the
//! engine answers with.

use crate::error::{BoxError, ParamError};
use crate::params::Placement;
use bytes::Bytes;
use http_body::Body as HttpBody;
use http_body::{Frame, SizeHint};
use http_body_util::BodyExt;
use http_body_util::combinators::UnsyncBoxBody;
use mime::Mime;
use serde::de::DeserializeOwned;
use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::trace;

const BODY: &str = "body";

pub(crate) struct RequestBody {
    source: Option<UnsyncBoxBody<Bytes, BoxError>>,
    buffered: Bytes,
    failure: Option<String>,
    parsed: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    fields: Option<Vec<(String, String)>>,
    declared: Option<(TypeId, &'static str)>,
}

impl RequestBody {
    pub(crate) fn new<B>(body: B) -> Self
    where
        B: HttpBody<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        Self {
            source: Some(body.map_err(Into::into).boxed_unsync()),
            buffered: Bytes::new(),
            failure: None,
            parsed: HashMap::new(),
            fields: None,
            declared: None,
        }
    }

    /// The raw body, pulled from the transport on first call only.
    ///
    /// A failed read is remembered and reported again by every later call.
    pub(crate) async fn bytes(&mut self) -> Result<&Bytes, ParamError> {
        if let Some(source) = self.source.take() {
            match source.collect().await {
                Ok(collected) => {
                    self.buffered = collected.to_bytes();
                    trace!(len = self.buffered.len(), "request body buffered");
                }
                Err(e) => {
                    self.failure = Some(e.to_string());
                    return Err(ParamError::body_read(e));
                }
            }
        }

        match &self.failure {
            Some(failure) => Err(ParamError::body_read(failure.clone())),
            None => Ok(&self.buffered),
        }
    }

    /// Decodes the body into `T`; each type is decoded once and cached next to the others.
    pub(crate) async fn parse<T>(&mut self, content_type: Option<&str>) -> Result<&T, ParamError>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        let key = TypeId::of::<T>();

        if !self.parsed.contains_key(&key) {
            let bytes = self.bytes().await?.clone();
            if bytes.is_empty() {
                return Err(ParamError::missing(BODY, Placement::Body));
            }

            let parsed = decode::<T>(&content_type_of(content_type)?, &bytes)?;
            self.parsed.insert(key, Box::new(parsed));
        }

        self.parsed_as::<T>().ok_or_else(|| ParamError::missing(BODY, Placement::Body))
    }

    /// Top-level scalar fields of a form or JSON object body, in body order.
    pub(crate) async fn fields(&mut self, content_type: Option<&str>) -> Result<&[(String, String)], ParamError> {
        if self.fields.is_none() {
            let bytes = self.bytes().await?.clone();
            let fields =
                if bytes.is_empty() { Vec::new() } else { decode_fields(&content_type_of(content_type)?, &bytes)? };
            self.fields = Some(fields);
        }

        Ok(self.fields.as_deref().unwrap_or_default())
    }

    pub(crate) fn parsed_as<T: 'static>(&self) -> Option<&T> {
        self.parsed.get(&TypeId::of::<T>()).and_then(|parsed| parsed.downcast_ref::<T>())
    }

    pub(crate) fn declare<T: 'static>(&mut self) {
        self.declared = Some((TypeId::of::<T>(), type_name::<T>()));
    }

    /// The type a body declaration decodes into, if the route has one.
    #[inline]
    pub(crate) fn declared(&self) -> Option<(TypeId, &'static str)> {
        self.declared
    }

    /// True once the transport body has been read.
    #[inline]
    pub(crate) fn is_consumed(&self) -> bool {
        self.source.is_none()
    }
}

fn content_type_of(raw: Option<&str>) -> Result<Mime, ParamError> {
    let raw = raw.unwrap_or_default();
    raw.parse::<Mime>().map_err(|_| ParamError::unsupported_content_type(raw))
}

fn decode<T>(content_type: &Mime, bytes: &Bytes) -> Result<T, ParamError>
where
    T: DeserializeOwned + 'static,
{
    match content_type.essence_str() {
        "application/json" => serde_json::from_slice(bytes).map_err(ParamError::body_decode),
        "application/xml" | "text/xml" => serde_xml_rs::from_reader(&bytes[..]).map_err(ParamError::body_decode),
        "application/x-www-form-urlencoded" => serde_urlencoded::from_bytes(bytes).map_err(ParamError::body_decode),
        "text/plain" => {
            let text = String::from_utf8(bytes.to_vec()).map_err(ParamError::body_decode)?;
            let boxed: Box<dyn Any> = Box::new(text);
            boxed
                .downcast::<T>()
                .map(|typed| *typed)
                .map_err(|_| ParamError::body_type_mismatch(content_type.essence_str(), type_name::<T>()))
        }
        other => Err(ParamError::unsupported_content_type(other)),
    }
}

fn decode_fields(content_type: &Mime, bytes: &Bytes) -> Result<Vec<(String, String)>, ParamError> {
    match content_type.essence_str() {
        "application/x-www-form-urlencoded" => serde_urlencoded::from_bytes(bytes).map_err(ParamError::body_decode),
        "application/json" => {
            let value: serde_json::Value = serde_json::from_slice(bytes).map_err(ParamError::body_decode)?;
            let serde_json::Value::Object(object) = value else {
                return Ok(Vec::new());
            };

            let mut fields = Vec::new();
            for (name, value) in object {
                match value {
                    serde_json::Value::Array(items) => {
                        fields.extend(items.into_iter().filter_map(scalar).map(|item| (name.clone(), item)));
                    }
                    other => fields.extend(scalar(other).map(|item| (name, item))),
                }
            }
            Ok(fields)
        }
        other => Err(ParamError::unsupported_content_type(other)),
    }
}

fn scalar(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// A response body sent in a single frame.
#[derive(Debug, Default)]
pub struct ResponseBody {
    inner: Option<Bytes>,
}

impl ResponseBody {
    pub fn empty() -> Self {
        Self { inner: None }
    }

    pub fn once(bytes: Bytes) -> Self {
        if bytes.is_empty() { Self::empty() } else { Self { inner: Some(bytes) } }
    }

    /// The bytes not yet polled.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        self.inner.as_ref()
    }
}

impl From<Bytes> for ResponseBody {
    fn from(bytes: Bytes) -> Self {
        Self::once(bytes)
    }
}

impl From<String> for ResponseBody {
    fn from(value: String) -> Self {
        Self::once(Bytes::from(value))
    }
}

impl From<&'static str> for ResponseBody {
    fn from(value: &'static str) -> Self {
        Self::once(Bytes::from_static(value.as_bytes()))
    }
}

impl From<()> for ResponseBody {
    fn from(_: ()) -> Self {
        Self::empty()
    }
}

impl From<Option<Bytes>> for ResponseBody {
    fn from(option: Option<Bytes>) -> Self {
        option.map(Self::once).unwrap_or_default()
    }
}

impl HttpBody for ResponseBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Poll::Ready(self.get_mut().inner.take().map(|bytes| Ok(Frame::data(bytes))))
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_none()
    }

    fn size_hint(&self) -> SizeHint {
        match &self.inner {
            None => SizeHint::with_exact(0),
            Some(bytes) => SizeHint::with_exact(bytes.len() as u64),
        }
    }
}
