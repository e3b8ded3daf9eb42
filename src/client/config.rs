//! Notification client configuration

use std::time::Duration;

use reqwest::Url;

use crate::error::{Error, Result};
use crate::event::ORDER_CREATED_KIND;
use crate::transport::http::DEFAULT_IDLE_TIMEOUT;

/// Default notification stream endpoint
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8080/api/notifications/subscribe";

/// Delay before the first reconnect attempt
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// When to retry after a transport failure
///
/// The default is a single fixed delay. A multiplier above 1.0 turns it into
/// capped exponential backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Delay before the first retry
    pub initial_delay: Duration,

    /// Growth factor applied per consecutive failure
    pub multiplier: f64,

    /// Upper bound on any single delay
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_RECONNECT_DELAY)
    }
}

impl ReconnectPolicy {
    /// Retry after the same delay every time
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            multiplier: 1.0,
            max_delay: delay,
        }
    }

    /// Double the delay after each consecutive failure, up to `max_delay`
    pub fn exponential(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            multiplier: 2.0,
            max_delay: max_delay.max(initial_delay),
        }
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if self.multiplier <= 1.0 {
            return self.initial_delay.min(self.max_delay);
        }

        let factor = self.multiplier.powi(attempt.min(64) as i32);
        let secs = self.initial_delay.as_secs_f64() * factor;
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}

/// Notification client configuration options
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// SSE endpoint URL
    pub endpoint: String,

    /// Event name carrying notifications
    pub event_name: String,

    /// Reconnect timing
    pub reconnect: ReconnectPolicy,

    /// Connect timeout for the default HTTP transport
    pub connect_timeout: Duration,

    /// Idle timeout (reconnect if no data received)
    pub idle_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            event_name: ORDER_CREATED_KIND.to_string(),
            reconnect: ReconnectPolicy::default(),
            connect_timeout: Duration::from_secs(10),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Create a new config for the given endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Set the endpoint URL
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the event name to deliver
    pub fn event_name(mut self, name: impl Into<String>) -> Self {
        self.event_name = name.into();
        self
    }

    /// Use a fixed reconnect delay
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect = ReconnectPolicy::fixed(delay);
        self
    }

    /// Set the reconnect policy
    pub fn reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Set the connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the idle timeout
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Check the configuration and parse the endpoint
    pub fn validate(&self) -> Result<Url> {
        let url = Url::parse(&self.endpoint)
            .map_err(|e| Error::InvalidConfig(format!("endpoint {:?}: {}", self.endpoint, e)))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::InvalidConfig(format!(
                "endpoint scheme must be http or https, got {}",
                url.scheme()
            )));
        }
        if self.event_name.trim().is_empty() {
            return Err(Error::InvalidConfig("event name is empty".into()));
        }
        if self.reconnect.initial_delay.is_zero() {
            return Err(Error::InvalidConfig("reconnect delay must be non-zero".into()));
        }
        if self.idle_timeout.is_zero() {
            return Err(Error::InvalidConfig("idle timeout must be non-zero".into()));
        }
        if !self.reconnect.multiplier.is_finite() || self.reconnect.multiplier < 1.0 {
            return Err(Error::InvalidConfig(format!(
                "reconnect multiplier must be >= 1.0, got {}",
                self.reconnect.multiplier
            )));
        }

        Ok(url)
    }
}
