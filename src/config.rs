//! Client configuration

use std::env;

/// Public OpenKeyVal endpoint
pub const DEFAULT_BASE_URL: &str = "http://api.openkeyval.org/";

/// Default per-request deadline in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Default gzip level for compressed payloads
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Construction-time options for a store client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Service base URL; keys are appended to it for reads
    pub base_url: String,
    /// Per-request deadline in milliseconds (`None` waits indefinitely)
    pub timeout_ms: Option<u64>,
    /// gzip level used when compression is requested (0-9)
    pub compression_level: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: Some(DEFAULT_TIMEOUT_MS),
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

impl ClientConfig {
    /// Config with the given base URL and default options
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Read `OKV_BASE_URL`, `OKV_TIMEOUT_MS` and `OKV_COMPRESSION_LEVEL`.
    ///
    /// Unset or unparsable values fall back to the defaults. A timeout of
    /// `0` disables the deadline.
    pub fn from_env() -> Result<Self, String> {
        let base_url = env::var("OKV_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        if base_url.trim().is_empty() {
            return Err("OKV_BASE_URL must not be empty".to_string());
        }

        let timeout_ms = match env::var("OKV_TIMEOUT_MS").ok().and_then(|s| s.parse::<u64>().ok()) {
            Some(0) => None,
            Some(ms) => Some(ms),
            None => Some(DEFAULT_TIMEOUT_MS),
        };

        let compression_level = env::var("OKV_COMPRESSION_LEVEL")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_COMPRESSION_LEVEL);

        Ok(ClientConfig {
            base_url,
            timeout_ms,
            compression_level,
        })
    }

    /// Validate the base URL and return it with a trailing `/`
    pub(crate) fn normalized_base_url(&self) -> crate::Result<String> {
        let parsed = url::Url::parse(&self.base_url)
            .map_err(|e| crate::Error::InvalidUrl(format!("Invalid base URL '{}': {}", self.base_url, e)))?;

        match parsed.scheme() {
            "http" | "https" => {}
            other => {
                return Err(crate::Error::InvalidUrl(format!(
                    "Unsupported scheme '{}' in base URL (expected http or https)",
                    other
                )))
            }
        }

        if parsed.query().is_some() || parsed.fragment().is_some() {
            return Err(crate::Error::InvalidUrl(
                "Base URL must not carry a query or fragment".to_string(),
            ));
        }

        let mut base_url = self.base_url.clone();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Ok(base_url)
    }
}
