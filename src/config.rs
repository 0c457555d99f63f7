//! Service configuration and settings loading.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TeeError};
use crate::types::{Ed25519Generation, TeeMode};

/// Default per-attempt timeout for TEE RPCs.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Bounded exponential backoff for idempotent TEE calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first; values below 1 are treated as 1.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry.
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,
    /// Upper bound for any single backoff delay.
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
    /// Factor applied to the delay after each failed attempt.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> u64 {
    250
}

fn default_max_delay() -> u64 {
    2_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryConfig {
    /// Single attempt, no backoff.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }
}

/// Timeout and retry policy applied around every TEE call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallPolicy {
    /// Timeout applied to each attempt.
    pub request_timeout: Duration,
    /// Backoff between attempts.
    pub retry: RetryConfig,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            retry: RetryConfig::default(),
        }
    }
}

/// TEE Service configuration.
#[derive(Debug, Clone)]
pub struct TeeServiceConfig {
    /// TEE operation mode.
    pub mode: TeeMode,
    /// Secret salt for key derivation.
    pub secret_salt: Option<String>,
    /// Explicit endpoint, overriding the mode default.
    pub endpoint: Option<String>,
    /// Per-attempt timeout for TEE RPCs.
    pub request_timeout: Duration,
    /// Retry policy for TEE RPCs.
    pub retry: RetryConfig,
    /// How Ed25519 keys are produced from the derived seed.
    pub ed25519_generation: Ed25519Generation,
}

impl Default for TeeServiceConfig {
    fn default() -> Self {
        Self {
            mode: TeeMode::Local,
            secret_salt: None,
            endpoint: None,
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            retry: RetryConfig::default(),
            ed25519_generation: Ed25519Generation::default(),
        }
    }
}

impl TeeServiceConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `TEE_MODE` (optional, defaults to `OFF`)
    /// - `WALLET_SECRET_SALT` (required by the service when the mode is enabled)
    /// - `TEE_ENDPOINT` (optional)
    /// - `TEE_REQUEST_TIMEOUT_MS` (optional)
    /// - `TEE_MAX_RETRIES` (optional, retries after the first attempt)
    /// - `TEE_ED25519_GENERATION` (optional, `seeded` or `random`)
    ///
    /// # Errors
    /// Returns an error if a variable is present but invalid.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary settings source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mode = match get("TEE_MODE") {
            Some(m) => TeeMode::parse(&m)?,
            None => TeeMode::Off,
        };

        let request_timeout = match get("TEE_REQUEST_TIMEOUT_MS") {
            Some(v) => Duration::from_millis(parse_number(&v, "TEE_REQUEST_TIMEOUT_MS")?),
            None => Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
        };

        let mut retry = RetryConfig::default();
        if let Some(v) = get("TEE_MAX_RETRIES") {
            let retries: u32 = parse_number(&v, "TEE_MAX_RETRIES")?;
            retry.max_attempts = retries.saturating_add(1);
        }

        let ed25519_generation = match get("TEE_ED25519_GENERATION") {
            Some(v) => Ed25519Generation::parse(&v)?,
            None => Ed25519Generation::default(),
        };

        Ok(Self {
            mode,
            secret_salt: get("WALLET_SECRET_SALT"),
            endpoint: get("TEE_ENDPOINT"),
            request_timeout,
            retry,
            ed25519_generation,
        })
    }

    /// Set the salt used as the derivation path for chain identities.
    #[must_use]
    pub fn with_secret_salt(mut self, salt: impl Into<String>) -> Self {
        self.secret_salt = Some(salt.into());
        self
    }

    /// Override the mode's default endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Replace the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the per-attempt timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Choose how Ed25519 keypairs are produced.
    #[must_use]
    pub fn with_ed25519_generation(mut self, generation: Ed25519Generation) -> Self {
        self.ed25519_generation = generation;
        self
    }

    /// Timeout and retry settings as a single policy.
    pub fn call_policy(&self) -> CallPolicy {
        CallPolicy {
            request_timeout: self.request_timeout,
            retry: self.retry.clone(),
        }
    }

    /// The salt, or a configuration error naming the missing setting.
    pub fn require_secret_salt(&self) -> Result<&str> {
        self.secret_salt
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                TeeError::config("WALLET_SECRET_SALT required when TEE_MODE is enabled")
            })
    }
}

fn parse_number<T: std::str::FromStr>(value: &str, key: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| TeeError::config(format!("{} must be a number, got {:?}", key, value)))
}
