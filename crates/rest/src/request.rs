//! Request handling module giving handlers and middlewares access to the request.
//!
//! This module contains the core types for working with HTTP requests in the engine:
//! - `RequestContext`: the request head, its path parameters, its read-once body and the
//!   per-request parameter cache
//! - `PathParams`: captures extracted from the request path by the route trie

use crate::body::RequestBody;
use crate::error::{BoxError, ParamError};
use crate::params::{Conversion, FromValue, Parameter, ParameterStore, Placement, Value};
use bytes::Bytes;
use chrono::NaiveDateTime;
use http::header::CONTENT_TYPE;
use http::{Extensions, HeaderMap, Method, Request, Uri, Version};
use http_body::Body as HttpBody;
use serde::de::DeserializeOwned;
use std::any::{TypeId, type_name};
use std::borrow::Cow;
use std::fmt;

const BODY: &str = "body";

/// Everything a middleware or a handler knows about the current request.
///
/// A context is created per request and owned by the task serving it. Parameters are extracted
/// lazily and cached, so asking twice for the same parameter never parses it twice, and the
/// transport body is read at most once.
pub struct RequestContext {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    extensions: Extensions,
    path_params: PathParams,
    query: Option<Vec<(String, String)>>,
    body: RequestBody,
    parameters: ParameterStore,
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("path_params", &self.path_params)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

impl RequestContext {
    /// Creates a context from a request, taking ownership of its body.
    pub fn new<B>(request: Request<B>) -> Self
    where
        B: HttpBody<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = request.into_parts();
        Self {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            extensions: parts.extensions,
            path_params: PathParams::empty(),
            query: None,
            body: RequestBody::new(body),
            parameters: ParameterStore::new(),
        }
    }

    pub(crate) fn bind_path(&mut self, path_params: PathParams) {
        self.path_params = path_params;
    }

    /// Returns the HTTP method of the request
    #[inline]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the URI of the request
    #[inline]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    #[inline]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    #[inline]
    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns the HTTP headers of the request
    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Request-scoped values, e.g. set by a middleware for the handler.
    #[inline]
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    #[inline]
    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// Returns the captures of the matched route pattern
    #[inline]
    pub fn path_params(&self) -> &PathParams {
        &self.path_params
    }

    /// The parameters extracted so far.
    #[inline]
    pub fn parameters(&self) -> &ParameterStore {
        &self.parameters
    }

    /// Extracts a parameter and converts its first value, caching the result.
    ///
    /// A parameter already converted with the same `conversion` is returned from the cache. A
    /// parameter declared by the route keeps its declared value; other conversions of it are
    /// computed from the cached raw values and returned without being cached.
    pub async fn extract(
        &mut self,
        placement: Placement,
        name: &str,
        conversion: &Conversion,
    ) -> Result<Cow<'_, Value>, ParamError> {
        if !self.parameters.holds(placement, name, conversion) {
            if let Some(declared) = self.parameters.get(placement, name).filter(|parameter| parameter.is_mandatory()) {
                return convert_first(name, placement, declared.raw(), conversion).map(Cow::Owned);
            }

            self.convert_and_cache(placement, name, conversion).await?;
        }

        self.parameters
            .get(placement, name)
            .and_then(Parameter::value)
            .map(Cow::Borrowed)
            .ok_or_else(|| ParamError::missing(name, placement))
    }

    /// Extracts a parameter and marks it mandatory.
    pub(crate) async fn require(
        &mut self,
        placement: Placement,
        name: &str,
        conversion: &Conversion,
    ) -> Result<&Value, ParamError> {
        if !self.parameters.holds(placement, name, conversion) {
            self.convert_and_cache(placement, name, conversion).await?;
        }

        if let Some(parameter) = self.parameters.get_mut(placement, name) {
            parameter.mark_mandatory();
        }

        self.declared_value(placement, name)
    }

    async fn convert_and_cache(
        &mut self,
        placement: Placement,
        name: &str,
        conversion: &Conversion,
    ) -> Result<(), ParamError> {
        let cached = self.parameters.get(placement, name).map(|parameter| parameter.raw().to_vec());
        let raw = match cached {
            Some(raw) => raw,
            None => self.raw_values(placement, name).await?,
        };

        let value = convert_first(name, placement, &raw, conversion)?;
        self.parameters.record(placement, name, raw).set_parsed(conversion.clone(), value);
        Ok(())
    }

    /// The value of a parameter converted by a declaration middleware of the route.
    ///
    /// Fails with [`ParamError::Undeclared`] if no declaration ran for this parameter.
    pub fn declared_value(&self, placement: Placement, name: &str) -> Result<&Value, ParamError> {
        self.declared_parameter(placement, name)?.value().ok_or_else(|| ParamError::undeclared(name, placement))
    }

    /// Reads a declared parameter as `T`.
    pub fn declared<T: FromValue>(&self, placement: Placement, name: &str) -> Result<T, ParamError> {
        let parameter = self.declared_parameter(placement, name)?;

        parameter.value().and_then(T::from_value).ok_or_else(|| {
            let declared = parameter.conversion().map(ToString::to_string).unwrap_or_default();
            ParamError::declared_as(name, declared, type_name::<T>())
        })
    }

    fn declared_parameter(&self, placement: Placement, name: &str) -> Result<&Parameter, ParamError> {
        self.parameters
            .get(placement, name)
            .filter(|parameter| parameter.is_mandatory() && parameter.value().is_some())
            .ok_or_else(|| ParamError::undeclared(name, placement))
    }

    pub async fn boolean(&mut self, placement: Placement, name: &str) -> Result<bool, ParamError> {
        self.typed(placement, name, Conversion::Bool).await
    }

    pub async fn integer(&mut self, placement: Placement, name: &str) -> Result<i64, ParamError> {
        self.typed(placement, name, Conversion::Integer).await
    }

    pub async fn float(&mut self, placement: Placement, name: &str) -> Result<f64, ParamError> {
        self.typed(placement, name, Conversion::Float).await
    }

    pub async fn string(&mut self, placement: Placement, name: &str) -> Result<String, ParamError> {
        self.typed(placement, name, Conversion::String).await
    }

    /// Parses a date-time with the strftime `layout`, e.g. `%Y-%m-%d %H:%M`.
    pub async fn time(&mut self, placement: Placement, name: &str, layout: &str) -> Result<NaiveDateTime, ParamError> {
        self.typed(placement, name, Conversion::time(layout)).await
    }

    async fn typed<T: FromValue>(
        &mut self,
        placement: Placement,
        name: &str,
        conversion: Conversion,
    ) -> Result<T, ParamError> {
        let value = self.extract(placement, name, &conversion).await?;
        T::from_value(&value).ok_or_else(|| ParamError::declared_as(name, &conversion, type_name::<T>()))
    }

    /// All raw values of a parameter, in request order.
    pub async fn values(&mut self, placement: Placement, name: &str) -> Result<&[String], ParamError> {
        if self.parameters.get(placement, name).is_none() {
            let raw = self.raw_values(placement, name).await?;
            if raw.is_empty() {
                return Err(ParamError::missing(name, placement));
            }
            self.parameters.record(placement, name, raw);
        }

        self.parameters.get(placement, name).map(Parameter::raw).ok_or_else(|| ParamError::missing(name, placement))
    }

    async fn raw_values(&mut self, placement: Placement, name: &str) -> Result<Vec<String>, ParamError> {
        let values: Vec<String> = match placement {
            Placement::Path => self.path_params.get(name).map(str::to_owned).into_iter().collect(),
            Placement::Query => {
                self.query_pairs()?.iter().filter(|(key, _)| key == name).map(|(_, value)| value.clone()).collect()
            }
            Placement::Header => {
                self.headers.get_all(name).iter().filter_map(|value| value.to_str().ok()).map(str::to_owned).collect()
            }
            Placement::Body => {
                let content_type = content_type(&self.headers);
                let fields = self.body.fields(content_type).await?;
                fields.iter().filter(|(key, _)| key == name).map(|(_, value)| value.clone()).collect()
            }
        };

        Ok(values)
    }

    fn query_pairs(&mut self) -> Result<&[(String, String)], ParamError> {
        if self.query.is_none() {
            let pairs = match self.uri.query() {
                Some(query) => serde_urlencoded::from_str(query).map_err(ParamError::malformed_query)?,
                None => Vec::new(),
            };
            self.query = Some(pairs);
        }

        Ok(self.query.as_deref().unwrap_or_default())
    }

    /// Binds the whole query string into `T`; nested keys like `filter[tag]=x` are supported.
    pub fn query_as<T: DeserializeOwned>(&self) -> Result<T, ParamError> {
        serde_qs::from_str(self.uri.query().unwrap_or_default()).map_err(ParamError::malformed_query)
    }

    /// Decodes the body into `T` according to the request `Content-Type`.
    ///
    /// The body is read from the transport once; the decoded value is cached and returned again
    /// when `T` is asked for a second time.
    pub async fn body<T>(&mut self) -> Result<&T, ParamError>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        let content_type = content_type(&self.headers);
        self.body.parse::<T>(content_type).await
    }

    pub(crate) async fn require_body<T>(&mut self) -> Result<&T, ParamError>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        self.body.declare::<T>();
        self.body::<T>().await
    }

    /// The body decoded by a body declaration of the route.
    pub fn declared_body<T: 'static>(&self) -> Result<&T, ParamError> {
        let (declared, declared_name) =
            self.body.declared().ok_or_else(|| ParamError::undeclared(BODY, Placement::Body))?;

        if declared != TypeId::of::<T>() {
            return Err(ParamError::declared_as(BODY, declared_name, type_name::<T>()));
        }

        self.body.parsed_as::<T>().ok_or_else(|| ParamError::undeclared(BODY, Placement::Body))
    }

    /// The raw body bytes.
    pub async fn body_bytes(&mut self) -> Result<&Bytes, ParamError> {
        self.body.bytes().await
    }
}

fn convert_first(
    name: &str,
    placement: Placement,
    raw: &[String],
    conversion: &Conversion,
) -> Result<Value, ParamError> {
    let first = raw.first().ok_or_else(|| ParamError::missing(name, placement))?;
    conversion.convert(first).ok_or_else(|| ParamError::invalid_type(name, conversion, first.as_str()))
}

fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers.get(CONTENT_TYPE).and_then(|value| value.to_str().ok())
}

/// Represents path parameters extracted from the URL path of an HTTP request.
///
/// Path parameters are named segments in the URL path that can be extracted and accessed
/// by name. For example, in the path "users/{id}", "id" is a path parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    params: Vec<(String, String)>,
}

impl PathParams {
    /// Creates an empty PathParams instance with no parameters
    #[inline]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns true if there are no path parameters
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Returns the number of path parameters
    #[inline]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Gets the value of a path parameter by its name
    /// Returns None if the parameter doesn't exist
    pub fn get(&self, key: impl AsRef<str>) -> Option<&str> {
        let key = key.as_ref();
        self.params.iter().find(|(name, _)| name == key).map(|(_, value)| value.as_str())
    }

    /// Iterates the captures in pattern order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

impl<'k, 'v> FromIterator<(&'k str, &'v str)> for PathParams {
    fn from_iter<I: IntoIterator<Item = (&'k str, &'v str)>>(iter: I) -> Self {
        Self { params: iter.into_iter().map(|(name, value)| (name.to_owned(), value.to_owned())).collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::{PathParams, RequestContext};
    use crate::error::ParamError;
    use crate::params::{Conversion, OptionalParam, Placement, Value};
    use bytes::Bytes;
    use futures::{StreamExt, stream};
    use http::Request;
    use http::header::CONTENT_TYPE;
    use http_body::Frame;
    use http_body_util::{Full, StreamBody};
    use serde::Deserialize;
    use std::convert::Infallible;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn context(uri: &str) -> RequestContext {
        RequestContext::new(Request::get(uri).body(Full::new(Bytes::new())).unwrap())
    }

    fn check_send<T: Send>() {}

    #[test]
    fn is_send() {
        check_send::<RequestContext>();
    }

    #[test]
    fn test_path_params() {
        let params = [("id", "42"), ("note", "7")].into_iter().collect::<PathParams>();

        assert_eq!(params.len(), 2);
        assert_eq!(params.get("id"), Some("42"));
        assert_eq!(params.get("missing"), None);
        assert_eq!(params.iter().collect::<Vec<_>>(), vec![("id", "42"), ("note", "7")]);
        assert!(PathParams::empty().is_empty());
    }

    #[tokio::test]
    async fn test_path_parameter() {
        let mut ctx = context("/users/42");
        ctx.bind_path([("id", "42")].into_iter().collect());

        assert_eq!(ctx.integer(Placement::Path, "id").await.unwrap(), 42);
        assert!(ctx.integer(Placement::Path, "uid").await.unwrap_err().is_missing());
    }

    #[tokio::test]
    async fn test_query_parameters() {
        let mut ctx = context("/search?q=rust%20lang&page=2&ratio=0.5&exact=T&tag=a&tag=b");

        assert_eq!(ctx.string(Placement::Query, "q").await.unwrap(), "rust lang");
        assert_eq!(ctx.integer(Placement::Query, "page").await.unwrap(), 2);
        assert_eq!(ctx.float(Placement::Query, "ratio").await.unwrap(), 0.5);
        assert!(ctx.boolean(Placement::Query, "exact").await.unwrap());
        assert_eq!(ctx.values(Placement::Query, "tag").await.unwrap(), ["a", "b"]);
        assert_eq!(ctx.string(Placement::Query, "tag").await.unwrap(), "a");
    }

    #[tokio::test]
    async fn test_invalid_type() {
        let mut ctx = context("/items?n=abc");

        let error = ctx.integer(Placement::Query, "n").await.unwrap_err();
        assert!(matches!(&error, ParamError::InvalidType { name, raw, .. } if name == "n" && raw == "abc"));
        assert_eq!(error.to_string(), "parameter 'n' is not of type int: 'abc'");
    }

    #[tokio::test]
    async fn test_cached_value_is_reused() {
        let mut ctx = context("/items?n=7");

        let first = &*ctx.extract(Placement::Query, "n", &Conversion::Integer).await.unwrap() as *const Value;
        let second = &*ctx.extract(Placement::Query, "n", &Conversion::Integer).await.unwrap() as *const Value;
        assert_eq!(first, second);
        assert_eq!(ctx.parameters().len(), 1);

        // another conversion of the same raw value replaces the cached one
        assert_eq!(ctx.string(Placement::Query, "n").await.unwrap(), "7");
        assert_eq!(ctx.parameters().get(Placement::Query, "n").unwrap().conversion(), Some(&Conversion::String));
    }

    #[tokio::test]
    async fn test_optional_parameter() {
        let mut ctx = context("/items?limit=x");

        assert_eq!(ctx.integer(Placement::Query, "offset").await.optional().unwrap().unwrap_or_default(), 0);
        assert!(ctx.integer(Placement::Query, "limit").await.optional().is_err());
    }

    #[tokio::test]
    async fn test_time_parameter() {
        let mut ctx = context("/events?from=2024-05-01");

        let from = ctx.time(Placement::Query, "from", "%Y-%m-%d").await.unwrap();
        assert_eq!(from.to_string(), "2024-05-01 00:00:00");

        let error = ctx.time(Placement::Query, "from", "%d/%m/%Y").await.unwrap_err();
        assert_eq!(error.to_string(), "parameter 'from' is not of type time with layout '%d/%m/%Y': '2024-05-01'");
    }

    #[tokio::test]
    async fn test_header_parameter() {
        let request = Request::get("/")
            .header("X-Request-Id", "17")
            .header("accept-language", "en")
            .header("accept-language", "fr")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let mut ctx = RequestContext::new(request);

        assert_eq!(ctx.integer(Placement::Header, "x-request-id").await.unwrap(), 17);
        assert_eq!(ctx.values(Placement::Header, "Accept-Language").await.unwrap(), ["en", "fr"]);
        assert!(ctx.string(Placement::Header, "authorization").await.unwrap_err().is_missing());
    }

    #[tokio::test]
    async fn test_body_parameter() {
        let request = Request::post("/")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Full::new(Bytes::from_static(b"age=30&name=ada")))
            .unwrap();
        let mut ctx = RequestContext::new(request);

        assert_eq!(ctx.integer(Placement::Body, "age").await.unwrap(), 30);
        assert_eq!(ctx.string(Placement::Body, "name").await.unwrap(), "ada");
        assert_eq!(ctx.body_bytes().await.unwrap().as_ref(), b"age=30&name=ada");
    }

    #[tokio::test]
    async fn test_declared_accessors_need_a_declaration() {
        let mut ctx = context("/items?n=7");

        ctx.integer(Placement::Query, "n").await.unwrap();
        assert!(matches!(ctx.declared::<i64>(Placement::Query, "n"), Err(ParamError::Undeclared { .. })));

        ctx.require(Placement::Query, "n", &Conversion::Integer).await.unwrap();
        assert_eq!(ctx.declared::<i64>(Placement::Query, "n").unwrap(), 7);
        assert!(matches!(ctx.declared::<bool>(Placement::Query, "n"), Err(ParamError::DeclaredAs { .. })));
    }

    #[tokio::test]
    async fn test_declared_value_survives_other_conversions() {
        let mut ctx = context("/items?n=7");
        ctx.require(Placement::Query, "n", &Conversion::Integer).await.unwrap();

        assert_eq!(ctx.string(Placement::Query, "n").await.unwrap(), "7");
        assert_eq!(ctx.float(Placement::Query, "n").await.unwrap(), 7.0);
        assert!(matches!(ctx.boolean(Placement::Query, "n").await, Err(ParamError::InvalidType { .. })));

        let parameter = ctx.parameters().get(Placement::Query, "n").unwrap();
        assert_eq!(parameter.conversion(), Some(&Conversion::Integer));
        assert_eq!(ctx.declared::<i64>(Placement::Query, "n").unwrap(), 7);
        assert_eq!(ctx.declared_value(Placement::Query, "n").unwrap(), &Value::Integer(7));
    }

    #[derive(Deserialize, Debug, PartialEq)]
    struct Page {
        page: u32,
        per_page: Option<u32>,
    }

    #[test]
    fn test_query_as() {
        let ctx = context("/items?page=3");
        assert_eq!(ctx.query_as::<Page>().unwrap(), Page { page: 3, per_page: None });

        let ctx = context("/items?page=x");
        assert!(matches!(ctx.query_as::<Page>(), Err(ParamError::MalformedQuery { .. })));
    }

    #[derive(Deserialize, Debug, PartialEq)]
    struct Payload {
        field: String,
    }

    #[tokio::test]
    async fn test_body_is_read_once() {
        let polls = Arc::new(AtomicUsize::new(0));
        let counter = polls.clone();
        let frames = stream::iter([r#"{"field":"x"}"#]).map(move |chunk| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Infallible>(Frame::data(Bytes::from_static(chunk.as_bytes())))
        });
        let request =
            Request::post("/").header(CONTENT_TYPE, "application/json").body(StreamBody::new(frames)).unwrap();
        let mut ctx = RequestContext::new(request);

        assert_eq!(ctx.body::<Payload>().await.unwrap().field, "x");
        assert!(matches!(ctx.declared_body::<Payload>(), Err(ParamError::Undeclared { .. })));

        ctx.require_body::<Payload>().await.unwrap();
        assert_eq!(ctx.declared_body::<Payload>().unwrap(), &Payload { field: "x".into() });
        assert_eq!(ctx.string(Placement::Body, "field").await.unwrap(), "x");
        assert_eq!(polls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_declared_body_survives_other_types() {
        let request = Request::post("/")
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from_static(br#"{"field":"x"}"#)))
            .unwrap();
        let mut ctx = RequestContext::new(request);
        ctx.require_body::<Payload>().await.unwrap();

        let raw = ctx.body::<serde_json::Value>().await.unwrap();
        assert_eq!(raw["field"], "x");

        assert_eq!(ctx.declared_body::<Payload>().unwrap(), &Payload { field: "x".into() });
        assert!(matches!(
            ctx.declared_body::<serde_json::Value>(),
            Err(ParamError::DeclaredAs { name, target, .. }) if name == "body" && target.contains("Value")
        ));
    }

    #[tokio::test]
    async fn test_body_read_failure_is_kept() {
        let frames = stream::iter([Err::<Frame<Bytes>, _>(std::io::Error::other("connection reset"))]);
        let request =
            Request::post("/").header(CONTENT_TYPE, "application/json").body(StreamBody::new(frames)).unwrap();
        let mut ctx = RequestContext::new(request);

        for _ in 0..2 {
            let error = ctx.body::<Payload>().await.unwrap_err();
            assert!(matches!(&error, ParamError::BodyRead { .. }), "{error:?}");
            assert_eq!(error.to_string(), "reading body failed: connection reset");
        }

        assert!(matches!(ctx.string(Placement::Body, "field").await, Err(ParamError::BodyRead { .. })));
        assert!(ctx.body::<Payload>().await.optional().is_err());
        assert!(matches!(ctx.body_bytes().await, Err(ParamError::BodyRead { .. })));
    }
}
