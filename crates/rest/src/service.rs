//! Services: groups of routes sharing a path prefix and a middleware chain.

use crate::error::BuildError;
use crate::middleware::Middlewares;
use crate::router::{Route, RouteTrie, Routes, pattern_captures, split_path};
use tracing::info;

/// A group of routes served under `{api prefix}/{service prefix}`.
///
/// ```
/// use micro_rest::router::{Routes, get};
/// use micro_rest::{HandlerResult, Reply, RequestContext, ServiceApi, handler_fn};
///
/// struct Health;
///
/// async fn ping(_ctx: &mut RequestContext) -> HandlerResult {
///     Ok(Reply::ok("pong"))
/// }
///
/// impl ServiceApi for Health {
///     fn prefix(&self) -> &str {
///         "health"
///     }
///
///     fn routes(&self) -> Routes {
///         Routes::new().route("ping", get(handler_fn(ping)))
///     }
/// }
/// ```
pub trait ServiceApi {
    fn prefix(&self) -> &str;

    fn routes(&self) -> Routes;

    /// Middlewares run for every request of the service, before route lookup.
    fn middlewares(&self) -> Middlewares {
        Middlewares::new()
    }
}

/// A service after registration: its routes are in a trie, nothing changes afterwards.
#[derive(Debug)]
pub(crate) struct Service {
    prefix: String,
    segments: Vec<String>,
    middlewares: Middlewares,
    trie: RouteTrie<Route>,
}

impl Service {
    pub(crate) fn build(api: &dyn ServiceApi) -> Result<Self, BuildError> {
        let prefix = api.prefix().trim_matches('/').to_owned();
        let mut trie = RouteTrie::new();

        for (pattern, builder) in api.routes() {
            let captures = pattern_captures(&pattern);
            let unknown = builder.middlewares().iter().filter_map(|middleware| middleware.path_capture()).find(|name| {
                !captures.iter().any(|capture| capture == name)
            });

            if let Some(name) = unknown {
                return Err(BuildError::UnknownPathParameter {
                    service: prefix.clone(),
                    method: builder.method().clone(),
                    pattern: pattern.trim_matches('/').to_owned(),
                    name: name.to_owned(),
                });
            }

            let method = builder.method().clone();
            let route = builder.build(pattern.trim_matches('/'));
            trie.insert(method.clone(), &pattern, route)
                .map_err(|source| BuildError::Route { service: prefix.clone(), source })?;

            info!(service = %prefix, %method, pattern = %pattern.trim_matches('/'), "route registered");
        }

        let segments = split_path(&prefix).into_iter().map(str::to_owned).collect();
        Ok(Self { prefix, segments, middlewares: api.middlewares(), trie })
    }

    #[inline]
    pub(crate) fn prefix(&self) -> &str {
        &self.prefix
    }

    #[inline]
    pub(crate) fn segments(&self) -> &[String] {
        &self.segments
    }

    #[inline]
    pub(crate) fn middlewares(&self) -> &Middlewares {
        &self.middlewares
    }

    #[inline]
    pub(crate) fn trie(&self) -> &RouteTrie<Route> {
        &self.trie
    }
}

#[cfg(test)]
mod tests {
    use super::{Service, ServiceApi};
    use crate::error::{BuildError, RouteError};
    use crate::params::{self, Placement};
    use crate::router::{Routes, get, post};
    use crate::{HandlerResult, Reply, RequestContext, handler_fn};
    use http::Method;

    async fn noop(_ctx: &mut RequestContext) -> HandlerResult {
        Ok(Reply::no_content())
    }

    struct Fixture(fn() -> Routes);

    impl ServiceApi for Fixture {
        fn prefix(&self) -> &str {
            "/notes/"
        }

        fn routes(&self) -> Routes {
            (self.0)()
        }
    }

    #[test]
    fn test_build_service() {
        let service = Service::build(&Fixture(|| {
            Routes::new()
                .route("", get(handler_fn(noop)))
                .route("{id}", get(handler_fn(noop)).with(params::integer(Placement::Path, "id")))
                .route("{id}", post(handler_fn(noop)))
        }))
        .unwrap();

        assert_eq!(service.prefix(), "notes");
        assert_eq!(service.segments(), ["notes"]);
        assert!(service.middlewares().is_empty());

        let matched = service.trie().at(&Method::GET, "7").unwrap();
        assert_eq!(matched.value().pattern(), "{id}");
        assert_eq!(matched.params().get("id"), Some("7"));
    }

    #[test]
    fn test_unknown_path_parameter() {
        let error = Service::build(&Fixture(|| {
            Routes::new().route("{id}", get(handler_fn(noop)).with(params::integer(Placement::Path, "uid")))
        }))
        .err()
        .unwrap();

        assert!(matches!(
            error,
            BuildError::UnknownPathParameter { service, method, pattern, name }
                if service == "notes" && method == Method::GET && pattern == "{id}" && name == "uid"
        ));
    }

    #[test]
    fn test_duplicate_route() {
        let error = Service::build(&Fixture(|| {
            Routes::new().route("{id}", get(handler_fn(noop))).route("/{id}", get(handler_fn(noop)))
        }))
        .err()
        .unwrap();

        assert!(matches!(
            error,
            BuildError::Route { source: RouteError::Conflict { .. }, .. }
        ));
    }
}
