//! Partner integration configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `PARTNER_GRAPHQL_URL` - Partner GraphQL endpoint
//! - `PARTNER_SYNC_URL` - Backend-hosted inventory sync resource (status + trigger)
//! - `PARTNER_OAUTH_TOKEN_URL` - Identity provider token endpoint
//! - `PARTNER_OAUTH_CLIENT_ID` - OAuth client ID
//! - `PARTNER_OAUTH_CLIENT_SECRET` - OAuth client secret (HIGH PRIVILEGE)
//! - `PARTNER_AGENT` - Integration agent string sent with every API call
//!
//! ## Optional
//! - `PARTNER_GRAPHQL_AUDIENCE` - Credential audience for the GraphQL endpoint
//!   (default: origin of `PARTNER_GRAPHQL_URL`)
//! - `PARTNER_SYNC_AUDIENCE` - Credential audience for the sync resource
//!   (default: origin of `PARTNER_SYNC_URL`)
//! - `PARTNER_AGENT_HEADER` - Integration agent header name (default: X-Integration-Agent)
//! - `PARTNER_HTTP_TIMEOUT_SECS` - HTTP request timeout (default: 30)
//! - `PARTNER_TOKEN_SKEW_SECS` - Refresh tokens this long before expiry (default: 60)
//! - `PARTNER_TRIGGER_TIMEOUT_SECS` - Release an in-flight sync trigger after (default: 30)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::time::Duration;

use partner_sync_core::Audience;
use reqwest::header::{HeaderName, HeaderValue};
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.0;
const DEFAULT_AGENT_HEADER: &str = "X-Integration-Agent";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_TOKEN_SKEW_SECS: u64 = 60;
const DEFAULT_TRIGGER_TIMEOUT_SECS: u64 = 30;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
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

/// Partner integration configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Partner GraphQL endpoint
    pub graphql: Endpoint,
    /// Backend-hosted sync status/trigger resource
    pub sync: Endpoint,
    /// Identity provider configuration
    pub oauth: OAuthConfig,
    /// Integration agent header sent with every API call
    pub agent: AgentHeader,
    /// Timeout applied to every outbound HTTP request
    pub http_timeout: Duration,
    /// Tokens expiring within this window are refreshed early
    pub token_skew: Duration,
    /// An in-flight sync trigger is abandoned (and its guard released) after this
    pub trigger_timeout: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
}

/// A remote endpoint together with the audience its credential is scoped to.
///
/// The audience is computed once when the endpoint is configured and then
/// travels with the URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Absolute endpoint URL
    pub url: Url,
    /// Credential audience for this endpoint
    pub audience: Audience,
}

impl Endpoint {
    /// Create an endpoint whose audience is derived from the URL origin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if the URL has no origin.
    pub fn from_url(url: Url) -> Result<Self, ConfigError> {
        let audience = Audience::from_url(&url)
            .map_err(|e| ConfigError::InvalidEnvVar("endpoint URL".to_string(), e.to_string()))?;
        Ok(Self { url, audience })
    }

    /// Create an endpoint with an explicitly configured audience.
    #[must_use]
    pub const fn with_audience(url: Url, audience: Audience) -> Self {
        Self { url, audience }
    }
}

/// OAuth client-credentials configuration.
///
/// Implements `Debug` manually to redact the client secret.
#[derive(Clone)]
pub struct OAuthConfig {
    /// Identity provider token endpoint
    pub token_url: Url,
    /// OAuth client ID
    pub client_id: String,
    /// OAuth client secret (HIGH PRIVILEGE)
    pub client_secret: SecretString,
}

impl std::fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("token_url", &self.token_url.as_str())
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Integration agent header identifying this plugin to the partner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentHeader {
    /// Header name
    pub name: HeaderName,
    /// Fixed agent string
    pub value: HeaderValue,
}

impl AgentHeader {
    /// Build an agent header, validating name and value.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if either part is not a legal
    /// HTTP header token.
    pub fn new(name: &str, value: &str) -> Result<Self, ConfigError> {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            ConfigError::InvalidEnvVar("PARTNER_AGENT_HEADER".to_string(), e.to_string())
        })?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ConfigError::InvalidEnvVar("PARTNER_AGENT".to_string(), e.to_string()))?;
        Ok(Self { name, value })
    }
}

impl SyncConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the client secret fails validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Same as [`SyncConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let graphql = get_endpoint(&lookup, "PARTNER_GRAPHQL_URL", "PARTNER_GRAPHQL_AUDIENCE")?;
        let sync = get_endpoint(&lookup, "PARTNER_SYNC_URL", "PARTNER_SYNC_AUDIENCE")?;
        let oauth = OAuthConfig {
            token_url: get_url(&lookup, "PARTNER_OAUTH_TOKEN_URL")?,
            client_id: get_required_env(&lookup, "PARTNER_OAUTH_CLIENT_ID")?,
            client_secret: get_validated_secret(&lookup, "PARTNER_OAUTH_CLIENT_SECRET")?,
        };
        let agent = AgentHeader::new(
            &get_env_or_default(&lookup, "PARTNER_AGENT_HEADER", DEFAULT_AGENT_HEADER),
            &get_required_env(&lookup, "PARTNER_AGENT")?,
        )?;

        Ok(Self {
            graphql,
            sync,
            oauth,
            agent,
            http_timeout: get_secs(&lookup, "PARTNER_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?,
            token_skew: get_secs(&lookup, "PARTNER_TOKEN_SKEW_SECS", DEFAULT_TOKEN_SKEW_SECS)?,
            trigger_timeout: get_secs(
                &lookup,
                "PARTNER_TRIGGER_TIMEOUT_SECS",
                DEFAULT_TRIGGER_TIMEOUT_SECS,
            )?,
            sentry_dsn: lookup("SENTRY_DSN"),
            sentry_environment: lookup("SENTRY_ENVIRONMENT"),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env<F>(lookup: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an environment variable with a default value.
fn get_env_or_default<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).unwrap_or_else(|| default.to_string())
}

/// Get a required absolute URL.
fn get_url<F>(lookup: &F, key: &str) -> Result<Url, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = get_required_env(lookup, key)?;
    Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Get an endpoint URL and its audience (explicit, or derived from the URL).
fn get_endpoint<F>(lookup: &F, url_key: &str, audience_key: &str) -> Result<Endpoint, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let url = get_url(lookup, url_key)?;
    match lookup(audience_key) {
        Some(raw) => {
            let audience = Audience::parse(&raw)
                .map_err(|e| ConfigError::InvalidEnvVar(audience_key.to_string(), e.to_string()))?;
            Ok(Endpoint::with_audience(url, audience))
        }
        None => {
            let audience = Audience::from_url(&url)
                .map_err(|e| ConfigError::InvalidEnvVar(url_key.to_string(), e.to_string()))?;
            Ok(Endpoint::with_audience(url, audience))
        }
    }
}

/// Get a duration in whole seconds.
fn get_secs<F>(lookup: &F, key: &str, default: u64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).map_or(Ok(Duration::from_secs(default)), |raw| {
        raw.trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Calculate Shannon entropy in bits per character.
///
/// Frequencies are over `char`s, so the denominator is the character count
/// rather than the byte length.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
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
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the secret issued by the partner."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret.
fn get_validated_secret<F>(lookup: &F, key: &str) -> Result<SecretString, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = get_required_env(lookup, key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
