//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `COUNTERTOP_API_URL` - Base URL of the Countertop REST API
//! - `COUNTERTOP_API_TOKEN` - API bearer token (high entropy, not a placeholder)
//!
//! ## Optional
//! - `COUNTERTOP_RELOAD_QUIET_MS` - Reload debounce window (default: 500)
//! - `COUNTERTOP_RESUBSCRIBE_DELAY_MS` - Delay before re-opening a broken feed (default: 5000)
//! - `COUNTERTOP_SPEC_CACHE_TTL_SECS` - Specification cache TTL (default: 300)
//! - `COUNTERTOP_REQUEST_TIMEOUT_SECS` - HTTP request timeout (default: 15)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::collections::HashMap;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Default quiet window of the reload gate.
pub const DEFAULT_RELOAD_QUIET: Duration = Duration::from_millis(500);

/// Default delay before a broken change feed is re-opened.
pub const DEFAULT_RESUBSCRIBE_DELAY: Duration = Duration::from_secs(5);

/// Default lifetime of cached specification groups.
pub const DEFAULT_SPEC_CACHE_TTL: Duration = Duration::from_secs(300);

/// Default HTTP request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Client configuration.
///
/// Implements `Debug` manually to redact the API token.
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL of the REST API (always ends with `/`)
    pub api_url: Url,
    /// API bearer token
    pub api_token: SecretString,
    /// Reload gate quiet window
    pub reload_quiet: Duration,
    /// Delay before re-opening a broken change feed
    pub resubscribe_delay: Duration,
    /// Specification group cache TTL
    pub spec_cache_ttl: Duration,
    /// HTTP request timeout
    pub request_timeout: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_url", &self.api_url.as_str())
            .field("api_token", &"[REDACTED]")
            .field("reload_quiet", &self.reload_quiet)
            .field("resubscribe_delay", &self.resubscribe_delay)
            .field("spec_cache_ttl", &self.spec_cache_ttl)
            .field("request_timeout", &self.request_timeout)
            .field("sentry_dsn", &self.sentry_dsn)
            .finish()
    }
}

/// Timing configuration for the order sync task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    /// Reload gate quiet window
    pub reload_quiet: Duration,
    /// Delay before re-opening a broken change feed
    pub resubscribe_delay: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            reload_quiet: DEFAULT_RELOAD_QUIET,
            resubscribe_delay: DEFAULT_RESUBSCRIBE_DELAY,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the API token fails validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_url = parse_base_url("COUNTERTOP_API_URL", &get_required_env("COUNTERTOP_API_URL")?)?;
        let api_token = get_validated_secret("COUNTERTOP_API_TOKEN")?;

        Ok(Self {
            api_url,
            api_token,
            reload_quiet: get_millis_or_default("COUNTERTOP_RELOAD_QUIET_MS", DEFAULT_RELOAD_QUIET)?,
            resubscribe_delay: get_millis_or_default(
                "COUNTERTOP_RESUBSCRIBE_DELAY_MS",
                DEFAULT_RESUBSCRIBE_DELAY,
            )?,
            spec_cache_ttl: get_secs_or_default("COUNTERTOP_SPEC_CACHE_TTL_SECS", DEFAULT_SPEC_CACHE_TTL)?,
            request_timeout: get_secs_or_default(
                "COUNTERTOP_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT,
            )?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
        })
    }

    /// Build a configuration with default timings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if `api_url` is not a valid base URL.
    pub fn new(api_url: &str, api_token: SecretString) -> Result<Self, ConfigError> {
        Ok(Self {
            api_url: parse_base_url("api_url", api_url)?,
            api_token,
            reload_quiet: DEFAULT_RELOAD_QUIET,
            resubscribe_delay: DEFAULT_RESUBSCRIBE_DELAY,
            spec_cache_ttl: DEFAULT_SPEC_CACHE_TTL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            sentry_dsn: None,
        })
    }

    /// Timing configuration for [`crate::OrderSync`].
    #[must_use]
    pub const fn sync(&self) -> SyncConfig {
        SyncConfig {
            reload_quiet: self.reload_quiet,
            resubscribe_delay: self.resubscribe_delay,
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable as `u64` with a default value.
fn get_u64_or_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    get_optional_env(key).map_or(Ok(default), |value| {
        value
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Get an environment variable in milliseconds, defaulting to `default`.
fn get_millis_or_default(key: &str, default: Duration) -> Result<Duration, ConfigError> {
    let default = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    get_u64_or_default(key, default).map(Duration::from_millis)
}

/// Get an environment variable in whole seconds, defaulting to `default`.
fn get_secs_or_default(key: &str, default: Duration) -> Result<Duration, ConfigError> {
    get_u64_or_default(key, default.as_secs()).map(Duration::from_secs)
}

/// Parse a base URL, ensuring a trailing slash so relative joins keep the path.
fn parse_base_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    let with_slash = if value.ends_with('/') {
        value.to_string()
    } else {
        format!("{value}/")
    };
    let url = Url::parse(&with_slash)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme: {}", url.scheme()),
        ));
    }
    Ok(url)
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the token issued by the API."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
