use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{KvError, KvResult};

/// Environment variable holding the store endpoint in hosted processes.
pub const ENDPOINT_ENV_VAR: &str = "REPLIT_DB_URL";

/// Construction settings for a client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the store. Required by the time a client is built.
    pub endpoint: Option<String>,
    /// Default for the per-call `cache` flag of every operation.
    pub cache_by_default: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            cache_by_default: true,
        }
    }
}

impl ClientConfig {
    /// Configuration with an explicit endpoint and caching enabled.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            ..Default::default()
        }
    }

    /// Configuration whose endpoint comes from [`ENDPOINT_ENV_VAR`].
    pub fn from_env() -> Self {
        Self::default().or_env()
    }

    /// Fill a missing endpoint from [`ENDPOINT_ENV_VAR`]. An explicit
    /// endpoint always wins.
    pub fn or_env(mut self) -> Self {
        if self.endpoint.is_none() {
            self.endpoint = std::env::var(ENDPOINT_ENV_VAR)
                .ok()
                .filter(|url| !url.is_empty());
        }
        self
    }

    pub fn cache_by_default(mut self, enabled: bool) -> Self {
        self.cache_by_default = enabled;
        self
    }

    pub fn from_toml_str(text: &str) -> KvResult<Self> {
        toml::from_str(text).map_err(|e| KvError::Configuration(e.to_string()))
    }

    /// Load settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> KvResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            KvError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// The endpoint a client will talk to, or a configuration error when
    /// none was provided.
    pub fn resolve_endpoint(&self) -> KvResult<&str> {
        match self.endpoint.as_deref() {
            Some(url) if !url.is_empty() => Ok(url),
            _ => Err(KvError::Configuration(format!(
                "no database URL set: pass an endpoint or set {ENDPOINT_ENV_VAR}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config() {
        let c = ClientConfig::default();
        assert!(c.endpoint.is_none());
        assert!(c.cache_by_default);
    }

    #[test]
    fn missing_endpoint_is_configuration_error() {
        let err = ClientConfig::default().resolve_endpoint().unwrap_err();
        assert!(matches!(err, KvError::Configuration(_)));

        let empty = ClientConfig::with_endpoint("");
        assert!(empty.resolve_endpoint().is_err());
    }

    #[test]
    fn explicit_endpoint_beats_env() {
        let c = ClientConfig::with_endpoint("http://explicit").or_env();
        assert_eq!(c.resolve_endpoint().unwrap(), "http://explicit");
    }

    #[test]
    fn builder_toggles_cache() {
        let c = ClientConfig::with_endpoint("http://x").cache_by_default(false);
        assert!(!c.cache_by_default);
    }

    #[test]
    fn parse_toml() {
        let c = ClientConfig::from_toml_str(
            "endpoint = \"https://kv.example.com/v0/abc\"\ncache_by_default = false\n",
        )
        .unwrap();
        assert_eq!(c.endpoint.as_deref(), Some("https://kv.example.com/v0/abc"));
        assert!(!c.cache_by_default);
    }

    #[test]
    fn toml_fields_default() {
        let c = ClientConfig::from_toml_str("").unwrap();
        assert_eq!(c, ClientConfig::default());
    }

    #[test]
    fn invalid_toml_is_configuration_error() {
        let err = ClientConfig::from_toml_str("endpoint = [").unwrap_err();
        assert!(matches!(err, KvError::Configuration(_)));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "endpoint = \"http://from-file\"").unwrap();
        let c = ClientConfig::load(file.path()).unwrap();
        assert_eq!(c.endpoint.as_deref(), Some("http://from-file"));
        assert!(c.cache_by_default);
    }

    #[test]
    fn load_missing_file() {
        let err = ClientConfig::load("/nonexistent/kvlink.toml").unwrap_err();
        assert!(matches!(err, KvError::Configuration(_)));
    }
}
