//! Configuration for the envelope bus.

use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// What to do when a method is called again while a previous call to it is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConcurrentCallPolicy {
    /// Every call gets its own request id; responses are matched by id.
    #[default]
    Correlate,
    /// The second call fails with `EnvelopeError::ConcurrentCall`.
    Reject,
}

impl FromStr for ConcurrentCallPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "correlate" => Ok(Self::Correlate),
            "reject" => Ok(Self::Reject),
            _ => Err(ConfigError::InvalidValue {
                key: "COURIER_CONCURRENT_CALLS".to_string(),
                message: format!("unknown policy: {s}, expected 'correlate' or 'reject'"),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    /// Upper bound for the whole init handshake (readiness + init request).
    pub init_timeout: Duration,
    /// How often the host re-checks the guest's readiness marker.
    pub init_poll_interval: Duration,
    /// Per-request bound; `None` waits until a response or disposal.
    pub request_timeout: Option<Duration>,
    pub concurrent_calls: ConcurrentCallPolicy,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            init_timeout: Duration::from_secs(60),
            init_poll_interval: Duration::from_millis(100),
            request_timeout: None,
            concurrent_calls: ConcurrentCallPolicy::Correlate,
        }
    }
}

impl BusConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key/value source. Missing keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            init_timeout: millis(&lookup, "COURIER_INIT_TIMEOUT_MS")?
                .unwrap_or(defaults.init_timeout),
            init_poll_interval: millis(&lookup, "COURIER_INIT_POLL_INTERVAL_MS")?
                .unwrap_or(defaults.init_poll_interval),
            request_timeout: millis(&lookup, "COURIER_REQUEST_TIMEOUT_MS")?,
            concurrent_calls: lookup("COURIER_CONCURRENT_CALLS")
                .map(|s| s.parse::<ConcurrentCallPolicy>())
                .transpose()?
                .unwrap_or(defaults.concurrent_calls),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.init_poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "COURIER_INIT_POLL_INTERVAL_MS".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.init_poll_interval > self.init_timeout {
            return Err(ConfigError::InvalidValue {
                key: "COURIER_INIT_POLL_INTERVAL_MS".to_string(),
                message: format!(
                    "must not exceed the init timeout ({:?})",
                    self.init_timeout
                ),
            });
        }
        if self.request_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::InvalidValue {
                key: "COURIER_REQUEST_TIMEOUT_MS".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn with_init_timeout(mut self, timeout: Duration) -> Self {
        self.init_timeout = timeout;
        self
    }

    pub fn with_init_poll_interval(mut self, interval: Duration) -> Self {
        self.init_poll_interval = interval;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn with_concurrent_calls(mut self, policy: ConcurrentCallPolicy) -> Self {
        self.concurrent_calls = policy;
        self
    }
}

fn millis(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<Duration>, ConfigError> {
    lookup(key)
        .map(|s| s.trim().parse::<u64>())
        .transpose()
        .map(|ms| ms.map(Duration::from_millis))
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("must be a whole number of milliseconds: {e}"),
        })
}
