use crate::body::ResponseBody;
use crate::config::{DEFAULT_API_PREFIX, EngineConfig};
use crate::dispatch::{self, Dispatch};
use crate::envelope::{Envelope, JsonMarshaler, Marshaler, Wrapped};
use crate::error::{BoxError, BuildError, MatchError};
use crate::request::RequestContext;
use crate::router::split_path;
use crate::service::{Service, ServiceApi};
use bytes::Bytes;
use http::{Request, Response};
use http_body::Body as HttpBody;
use std::fmt;
use std::sync::Arc;
use tracing::info;

pub struct EngineBuilder {
    api_prefix: String,
    marshaler: Arc<dyn Marshaler>,
    envelope: Arc<dyn Envelope>,
    services: Vec<Box<dyn ServiceApi>>,
}

impl fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("api_prefix", &self.api_prefix)
            .field("services", &self.services.len())
            .finish_non_exhaustive()
    }
}

impl EngineBuilder {
    fn new() -> Self {
        Self {
            api_prefix: DEFAULT_API_PREFIX.to_owned(),
            marshaler: Arc::new(JsonMarshaler),
            envelope: Arc::new(Wrapped::default()),
            services: Vec::new(),
        }
    }

    pub fn api_prefix(mut self, api_prefix: impl Into<String>) -> Self {
        self.api_prefix = api_prefix.into();
        self
    }

    pub fn marshaler<M: Marshaler + 'static>(mut self, marshaler: M) -> Self {
        self.marshaler = Arc::new(marshaler);
        self
    }

    pub fn envelope<E: Envelope + 'static>(mut self, envelope: E) -> Self {
        self.envelope = Arc::new(envelope);
        self
    }

    pub fn service<S: ServiceApi + 'static>(mut self, service: S) -> Self {
        self.services.push(Box::new(service));
        self
    }

    /// Registers every route of every service.
    ///
    /// Fails on the first invalid pattern, duplicated route or duplicated service prefix.
    pub fn build(self) -> Result<Engine, BuildError> {
        let config = Arc::new(EngineConfig::new(self.api_prefix, self.marshaler, self.envelope));
        let mut services: Vec<Service> = Vec::with_capacity(self.services.len());

        for api in self.services {
            let service = Service::build(api.as_ref())?;
            if services.iter().any(|registered| registered.segments() == service.segments()) {
                return Err(BuildError::DuplicateService { prefix: service.prefix().to_owned() });
            }

            info!(api = %config.api_prefix(), service = %service.prefix(), "service registered");
            services.push(service);
        }

        Ok(Engine { config, services })
    }
}

/// Resolves requests to the routes of registered services and renders their replies.
///
/// An engine is immutable once built; share it with `Arc` between the tasks serving requests.
#[derive(Debug)]
pub struct Engine {
    config: Arc<EngineConfig>,
    services: Vec<Service>,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Serves one request: `{api prefix}/{service prefix}/{route path}`.
    ///
    /// The final [`Phase`](crate::Phase) of the request is stored in the response extensions.
    pub async fn dispatch<B>(&self, request: Request<B>) -> Response<ResponseBody>
    where
        B: HttpBody<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let path = request.uri().path().to_owned();
        let segments = split_path(&path);
        let mut ctx = RequestContext::new(request);
        let mut dispatch = Dispatch::new();

        let result = match self.resolve(&segments) {
            Some((service, route_segments)) => dispatch.run(service, route_segments, &mut ctx).await,
            None => {
                dispatch.abort();
                Err(MatchError::RouteNotFound { path: path.clone() }.into())
            }
        };

        let reply = result.unwrap_or_else(dispatch::failure_reply);
        let mut response = reply.render(self.config.marshaler(), self.config.envelope());
        response.extensions_mut().insert(dispatch.phase());
        response
    }

    /// Finds the service owning the path; the longest matching service prefix wins.
    ///
    /// Returns the service with the segments left for its route trie.
    fn resolve<'p, 's>(&self, segments: &'p [&'s str]) -> Option<(&Service, &'p [&'s str])> {
        let api_prefix = split_path(self.config.api_prefix());
        let rest = strip_segments(segments, &api_prefix)?;

        self.services
            .iter()
            .filter_map(|service| {
                strip_segments(rest, service.segments()).map(|route_segments| (service, route_segments))
            })
            .max_by_key(|(service, _)| service.segments().len())
    }
}

fn strip_segments<'p, 's, S: AsRef<str>>(path: &'p [&'s str], prefix: &[S]) -> Option<&'p [&'s str]> {
    if prefix.len() > path.len() {
        return None;
    }

    let (head, rest) = path.split_at(prefix.len());
    head.iter().zip(prefix).all(|(segment, expected)| *segment == expected.as_ref()).then_some(rest)
}
