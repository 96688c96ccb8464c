//! Identity provider configuration.
//!
//! Configuration is loaded from environment variables. Endpoint URLs must be
//! HTTPS, except for loopback hosts used in local development.

use crate::auth::claims::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use crate::auth::jwks::DEFAULT_FETCH_TIMEOUT;
use crate::auth::key_cache::DEFAULT_CACHE_TTL;
use reqwest::Url;
use secrecy::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Upper bound for `JWKS_CACHE_TTL_SECONDS` (one day).
pub const MAX_CACHE_TTL_SECONDS: u64 = 86_400;

/// Upper bound for `JWKS_FETCH_TIMEOUT_SECONDS`.
pub const MAX_FETCH_TIMEOUT_SECONDS: u64 = 60;

/// Identity provider settings.
///
/// The client secret is redacted in Debug output.
#[derive(Clone)]
pub struct Config {
    /// Base URL of the identity provider, without trailing slash.
    pub base_url: String,

    /// Realm tokens are issued by.
    pub realm: String,

    /// JWKS endpoint (default: `{base}/realms/{realm}/protocol/openid-connect/certs`).
    pub jwks_url: String,

    /// Expected `iss` claim. `None` disables the check.
    pub issuer: Option<String>,

    /// Key cache TTL (default: one hour).
    pub jwks_cache_ttl: Duration,

    /// Timeout for a single request to the identity provider (default: 10 seconds).
    pub jwks_fetch_timeout: Duration,

    /// Clock skew tolerance for `iat` (default: 5 minutes).
    pub clock_skew: Duration,

    /// Confidential client for introspection and userinfo calls. Both
    /// `IDP_CLIENT_ID` and `IDP_CLIENT_SECRET` must be set, or neither.
    pub client_id: Option<String>,

    pub client_secret: Option<SecretString>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field("realm", &self.realm)
            .field("jwks_url", &self.jwks_url)
            .field("issuer", &self.issuer)
            .field("jwks_cache_ttl", &self.jwks_cache_ttl)
            .field("jwks_fetch_timeout", &self.jwks_fetch_timeout)
            .field("clock_skew", &self.clock_skew)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid URL configuration: {0}")]
    InvalidUrl(String),

    #[error("Invalid JWKS cache TTL configuration: {0}")]
    InvalidCacheTtl(String),

    #[error("Invalid JWKS fetch timeout configuration: {0}")]
    InvalidFetchTimeout(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let base_url = vars
            .get("IDP_BASE_URL")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("IDP_BASE_URL".to_string()))?
            .trim_end_matches('/')
            .to_string();
        validate_endpoint_url("IDP_BASE_URL", &base_url)?;

        let realm = vars
            .get("IDP_REALM")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("IDP_REALM".to_string()))?
            .clone();

        let realm_url = format!("{}/realms/{}", base_url, realm);

        let jwks_url = match vars.get("IDP_JWKS_URL") {
            Some(url) => {
                validate_endpoint_url("IDP_JWKS_URL", url)?;
                url.clone()
            }
            None => format!("{}/protocol/openid-connect/certs", realm_url),
        };

        // An explicitly empty issuer disables the check
        let issuer = match vars.get("IDP_ISSUER") {
            Some(issuer) if issuer.is_empty() => None,
            Some(issuer) => Some(issuer.clone()),
            None => Some(realm_url),
        };

        let jwks_cache_ttl = parse_seconds(
            vars,
            "JWKS_CACHE_TTL_SECONDS",
            DEFAULT_CACHE_TTL,
            1,
            MAX_CACHE_TTL_SECONDS,
        )
        .map_err(ConfigError::InvalidCacheTtl)?;

        let jwks_fetch_timeout = parse_seconds(
            vars,
            "JWKS_FETCH_TIMEOUT_SECONDS",
            DEFAULT_FETCH_TIMEOUT,
            1,
            MAX_FETCH_TIMEOUT_SECONDS,
        )
        .map_err(ConfigError::InvalidFetchTimeout)?;

        let clock_skew = parse_seconds(
            vars,
            "JWT_CLOCK_SKEW_SECONDS",
            DEFAULT_CLOCK_SKEW,
            0,
            MAX_CLOCK_SKEW.as_secs(),
        )
        .map_err(ConfigError::InvalidJwtClockSkew)?;

        let non_empty = |name: &str| vars.get(name).filter(|v| !v.is_empty()).cloned();
        let (client_id, client_secret) =
            match (non_empty("IDP_CLIENT_ID"), non_empty("IDP_CLIENT_SECRET")) {
                (Some(id), Some(secret)) => (Some(id), Some(SecretString::from(secret))),
                (None, None) => (None, None),
                (Some(_), None) => {
                    return Err(ConfigError::MissingEnvVar("IDP_CLIENT_SECRET".to_string()))
                }
                (None, Some(_)) => {
                    return Err(ConfigError::MissingEnvVar("IDP_CLIENT_ID".to_string()))
                }
            };

        Ok(Config {
            base_url,
            realm,
            jwks_url,
            issuer,
            jwks_cache_ttl,
            jwks_fetch_timeout,
            clock_skew,
            client_id,
            client_secret,
        })
    }

    /// `{base_url}/realms/{realm}`, the root of the realm's endpoints.
    pub fn realm_url(&self) -> String {
        format!("{}/realms/{}", self.base_url, self.realm)
    }
}

/// Parse an optional whole-seconds variable within `min..=max`.
fn parse_seconds(
    vars: &HashMap<String, String>,
    name: &str,
    default: Duration,
    min: u64,
    max: u64,
) -> Result<Duration, String> {
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: u64 = value_str.parse().map_err(|e| {
        format!(
            "{} must be a valid non-negative integer, got '{}': {}",
            name, value_str, e
        )
    })?;

    if value < min || value > max {
        return Err(format!(
            "{} must be between {} and {} seconds, got {}",
            name, min, max, value
        ));
    }

    Ok(Duration::from_secs(value))
}

/// Require HTTPS, allowing plain HTTP only for loopback hosts. Credentials in
/// the URL are rejected so they cannot end up in logs.
fn validate_endpoint_url(name: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("{} is not a valid URL: {}", name, e)))?;

    if !url.username().is_empty() || url.password().is_some() {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must not contain credentials",
            name
        )));
    }

    let is_loopback = matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]"));

    match url.scheme() {
        "https" => Ok(()),
        "http" if is_loopback => Ok(()),
        scheme => Err(ConfigError::InvalidUrl(format!(
            "{} must use https (http is only allowed for localhost), got {}",
            name, scheme
        ))),
    }
}
