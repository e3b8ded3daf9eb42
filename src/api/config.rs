//! REST client configuration

use std::time::Duration;

use reqwest::Url;

use crate::error::{Error, Result};

/// Default REST API base URL
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";

/// REST client configuration options
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL every path is appended to
    pub base_url: String,

    /// Whole-request timeout
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ApiConfig {
    /// Create a new config for the given base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set the request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Check the configuration and parse the base URL
    ///
    /// The parsed URL always ends in `/` so relative joins keep the path.
    pub fn validate(&self) -> Result<Url> {
        let mut raw = self.base_url.trim_end_matches('/').to_string();
        raw.push('/');

        let url = Url::parse(&raw)
            .map_err(|e| Error::InvalidConfig(format!("base URL {:?}: {}", self.base_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::InvalidConfig(format!(
                "base URL scheme must be http or https, got {}",
                url.scheme()
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::InvalidConfig("request timeout must be non-zero".into()));
        }

        Ok(url)
    }
}
