use crate::envelope::{Envelope, JsonMarshaler, Marshaler, Wrapped};
use std::fmt;
use std::sync::Arc;

pub const DEFAULT_API_PREFIX: &str = "api";

/// Engine-wide settings, fixed once the engine is built.
#[derive(Clone)]
pub struct EngineConfig {
    api_prefix: String,
    marshaler: Arc<dyn Marshaler>,
    envelope: Arc<dyn Envelope>,
}

impl EngineConfig {
    pub(crate) fn new(api_prefix: String, marshaler: Arc<dyn Marshaler>, envelope: Arc<dyn Envelope>) -> Self {
        Self { api_prefix: api_prefix.trim_matches('/').to_owned(), marshaler, envelope }
    }

    /// The first path segments of every route, `api` by default.
    #[inline]
    pub fn api_prefix(&self) -> &str {
        &self.api_prefix
    }

    #[inline]
    pub fn marshaler(&self) -> &dyn Marshaler {
        self.marshaler.as_ref()
    }

    #[inline]
    pub fn envelope(&self) -> &dyn Envelope {
        self.envelope.as_ref()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_PREFIX.to_owned(), Arc::new(JsonMarshaler), Arc::new(Wrapped::default()))
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("api_prefix", &self.api_prefix)
            .field("content_type", &self.marshaler.content_type())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::EngineConfig;
    use crate::envelope::{AsIs, JsonMarshaler};
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();

        assert_eq!(config.api_prefix(), "api");
        assert_eq!(config.marshaler().content_type(), mime::APPLICATION_JSON);
        assert_eq!(config.envelope().error("x"), json!({"error": "x"}));
    }

    #[test]
    fn test_prefix_is_trimmed() {
        let config = EngineConfig::new("/v1/api/".into(), Arc::new(JsonMarshaler), Arc::new(AsIs));
        assert_eq!(config.api_prefix(), "v1/api");
        assert_eq!(config.envelope().error("x"), json!("x"));
    }
}
