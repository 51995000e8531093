//! Service configuration resolved from command-line flags and the environment.
//!
//! The API key is read exactly once, here, and then lent to the geocoder for
//! every request.

use std::{env, fmt, time::Duration};

use thiserror::Error;

use crate::cli::ServiceArgs;

pub const DEFAULT_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/geocode/json";
pub const DEFAULT_API_KEY_ENV: &str = "GOOGLE_API_KEY";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} not set; export it with your geocoding API key")]
    MissingApiKey(String),
    #[error("{0} is set but empty")]
    EmptyApiKey(String),
    #[error("Endpoint '{0}' must start with http:// or https://")]
    InvalidEndpoint(String),
}

/// Wrapper that keeps the key out of debug output and logs.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

#[derive(Debug, Clone)]
pub struct GeocoderConfig {
    pub api_key: ApiKey,
    pub endpoint: String,
    pub region: Option<String>,
    pub language: Option<String>,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl GeocoderConfig {
    pub fn from_args(args: &ServiceArgs) -> Result<Self, ConfigError> {
        Self::from_args_with(args, |name| env::var(name).ok())
    }

    pub fn from_args_with<F>(args: &ServiceArgs, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_key = lookup(&args.api_key_env)
            .ok_or_else(|| ConfigError::MissingApiKey(args.api_key_env.clone()))?;
        let key = raw_key.trim();
        if key.is_empty() {
            return Err(ConfigError::EmptyApiKey(args.api_key_env.clone()));
        }
        let endpoint = args.endpoint.trim().to_string();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ConfigError::InvalidEndpoint(endpoint));
        }
        Ok(Self {
            api_key: ApiKey::new(key),
            endpoint,
            region: non_empty(args.region.as_deref()),
            language: non_empty(args.language.as_deref()),
            timeout: Duration::from_secs(args.timeout_secs.max(1)),
            retry: RetryPolicy {
                max_retries: args.retries,
                base_delay: Duration::from_millis(args.retry_delay_ms),
            },
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
