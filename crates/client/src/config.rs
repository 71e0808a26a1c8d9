//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SHOPFRONT_API_URL` - Base URL of the storefront REST API (e.g., `https://shop.example.com/api/`)
//!
//! ## Optional
//! - `SHOPFRONT_REQUEST_TIMEOUT_SECS` - Per-request timeout (default: 30)
//! - `SHOPFRONT_ON_UNAUTHORIZED` - `keep` or `clear` the session on a 401 (default: keep)
//! - `SHOPFRONT_SESSION_FILE` - Where the session is persisted (default: .shopfront/session.json)
//! - `SHOPFRONT_CATALOG_CACHE_TTL_SECS` - Product/category cache lifetime (default: 300)
//! - `SENTRY_DSN` - Sentry error tracking DSN (CLI only)

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_TIMEOUT_SECS: &str = "30";
const DEFAULT_SESSION_FILE: &str = ".shopfront/session.json";
const DEFAULT_CATALOG_TTL_SECS: &str = "300";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// What the gateway does with the stored session when the backend answers 401.
///
/// The storefront historically only logged the condition and kept the
/// session, so a user could retry without logging in again. Deployments that
/// prefer to force a fresh login choose [`UnauthorizedPolicy::Clear`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnauthorizedPolicy {
    /// Log the 401 and leave the session untouched.
    #[default]
    Keep,
    /// Log the 401 and clear the session, ending authentication.
    Clear,
}

impl FromStr for UnauthorizedPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keep" => Ok(Self::Keep),
            "clear" => Ok(Self::Clear),
            other => Err(format!("expected `keep` or `clear`, got `{other}`")),
        }
    }
}

/// Shopfront client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the REST API, always ending in `/`
    pub api_url: Url,
    /// Timeout applied to every backend request
    pub request_timeout: Duration,
    /// Session handling on authorization failures
    pub on_unauthorized: UnauthorizedPolicy,
    /// File the session is persisted to
    pub session_file: PathBuf,
    /// Lifetime of cached catalog responses
    pub catalog_cache_ttl: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

impl ClientConfig {
    /// Build a configuration for `api_url` with every optional value defaulted.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if `api_url` is not an absolute URL.
    pub fn new(api_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            api_url: parse_api_url("SHOPFRONT_API_URL", api_url)?,
            request_timeout: Duration::from_secs(30),
            on_unauthorized: UnauthorizedPolicy::default(),
            session_file: PathBuf::from(DEFAULT_SESSION_FILE),
            catalog_cache_ttl: Duration::from_secs(300),
            sentry_dsn: None,
        })
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_url = parse_api_url("SHOPFRONT_API_URL", &get_required_env("SHOPFRONT_API_URL")?)?;
        let request_timeout = Duration::from_secs(parse_env(
            "SHOPFRONT_REQUEST_TIMEOUT_SECS",
            &get_env_or_default("SHOPFRONT_REQUEST_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS),
        )?);
        let on_unauthorized = parse_env(
            "SHOPFRONT_ON_UNAUTHORIZED",
            &get_env_or_default("SHOPFRONT_ON_UNAUTHORIZED", "keep"),
        )?;
        let session_file = PathBuf::from(get_env_or_default(
            "SHOPFRONT_SESSION_FILE",
            DEFAULT_SESSION_FILE,
        ));
        let catalog_cache_ttl = Duration::from_secs(parse_env(
            "SHOPFRONT_CATALOG_CACHE_TTL_SECS",
            &get_env_or_default("SHOPFRONT_CATALOG_CACHE_TTL_SECS", DEFAULT_CATALOG_TTL_SECS),
        )?);
        let sentry_dsn = get_optional_env("SENTRY_DSN");

        Ok(Self {
            api_url,
            request_timeout,
            on_unauthorized,
            session_file,
            catalog_cache_ttl,
            sentry_dsn,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable, treating an empty value as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse a raw value, attributing failures to `key`.
fn parse_env<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse the API base URL and make sure relative joins stay under it.
///
/// `Url::join("cart/")` against `https://host/api` would replace the last
/// segment, so the path is forced to end with a slash.
fn parse_api_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let mut url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be an absolute http(s) URL".to_string(),
        ));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
