use crate::handler::RequestHandler;
use crate::middleware::{Middleware, Middlewares};
use http::Method;
use std::fmt;

/// A registered route: its handler and the middlewares run before it.
pub struct Route {
    method: Method,
    pattern: String,
    handler: Box<dyn RequestHandler>,
    middlewares: Middlewares,
}

impl Route {
    #[inline]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[inline]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn handler(&self) -> &dyn RequestHandler {
        self.handler.as_ref()
    }

    #[inline]
    pub fn middlewares(&self) -> &Middlewares {
        &self.middlewares
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern)
            .field("middlewares", &self.middlewares)
            .finish_non_exhaustive()
    }
}

macro_rules! method_route {
    ($method:ident, $http_method:ident) => {
        pub fn $method<H: RequestHandler + 'static>(handler: H) -> RouteBuilder {
            route(Method::$http_method, handler)
        }
    };
}

method_route!(get, GET);
method_route!(post, POST);
method_route!(put, PUT);
method_route!(patch, PATCH);
method_route!(delete, DELETE);
method_route!(head, HEAD);
method_route!(options, OPTIONS);

/// Starts a route for any `method`.
pub fn route<H: RequestHandler + 'static>(method: Method, handler: H) -> RouteBuilder {
    RouteBuilder { method, handler: Box::new(handler), middlewares: Middlewares::new() }
}

pub struct RouteBuilder {
    method: Method,
    handler: Box<dyn RequestHandler>,
    middlewares: Middlewares,
}

impl RouteBuilder {
    /// Appends a middleware; middlewares run in the order they were added.
    pub fn with<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middlewares.push(Box::new(middleware));
        self
    }

    #[inline]
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn middlewares(&self) -> &Middlewares {
        &self.middlewares
    }

    pub(crate) fn build(self, pattern: impl Into<String>) -> Route {
        Route { method: self.method, pattern: pattern.into(), handler: self.handler, middlewares: self.middlewares }
    }
}

impl fmt::Debug for RouteBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteBuilder")
            .field("method", &self.method)
            .field("middlewares", &self.middlewares)
            .finish_non_exhaustive()
    }
}

/// The routes of a service, as `(pattern, route)` pairs in registration order.
#[derive(Debug, Default)]
pub struct Routes {
    entries: Vec<(String, RouteBuilder)>,
}

impl Routes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, pattern: impl Into<String>, builder: RouteBuilder) -> Self {
        self.entries.push((pattern.into(), builder));
        self
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RouteBuilder)> {
        self.entries.iter().map(|(pattern, builder)| (pattern.as_str(), builder))
    }
}

impl IntoIterator for Routes {
    type Item = (String, RouteBuilder);
    type IntoIter = std::vec::IntoIter<(String, RouteBuilder)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
