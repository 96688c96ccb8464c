//! Client for the identity provider's token endpoints.
//!
//! Local validation cannot see revocation. [`IdpClient`] asks the provider
//! directly: token introspection (RFC 7662) reports whether a token is still
//! active, and the OpenID Connect userinfo endpoint returns the profile the
//! token grants access to. Each call is a single request. Nothing is cached
//! or retried.

use crate::auth::jwks::DEFAULT_FETCH_TIMEOUT;
use crate::config::Config;
use crate::errors::{IdpClientError, KeySourceError};
use crate::observability::metrics;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::instrument;

#[derive(Deserialize)]
struct IntrospectionResponse {
    active: bool,
}

/// Profile returned by the userinfo endpoint.
///
/// The `sub` and `email` fields are redacted in Debug output.
#[derive(Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct UserInfo {
    pub sub: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
}

impl fmt::Debug for UserInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserInfo")
            .field("sub", &"[REDACTED]")
            .field("preferred_username", &self.preferred_username)
            .field("email", &self.email.as_ref().map(|_| "[REDACTED]"))
            .field("email_verified", &self.email_verified)
            .finish_non_exhaustive()
    }
}

/// Confidential client for the realm's introspection and userinfo endpoints.
pub struct IdpClient {
    introspect_url: String,
    userinfo_url: String,
    client_id: String,
    client_secret: SecretString,
    http_client: reqwest::Client,
}

impl fmt::Debug for IdpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdpClient")
            .field("introspect_url", &self.introspect_url)
            .field("userinfo_url", &self.userinfo_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl IdpClient {
    /// Create a client for `realm_url` (`{base}/realms/{realm}`) with the
    /// default request timeout.
    pub fn new(realm_url: &str, client_id: String, client_secret: SecretString) -> Self {
        Self::with_timeout(realm_url, client_id, client_secret, DEFAULT_FETCH_TIMEOUT)
    }

    /// Create a client with a custom request timeout.
    pub fn with_timeout(
        realm_url: &str,
        client_id: String,
        client_secret: SecretString,
        timeout: Duration,
    ) -> Self {
        let realm_url = realm_url.trim_end_matches('/');
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "auth.idp", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            introspect_url: format!("{}/protocol/openid-connect/token/introspect", realm_url),
            userinfo_url: format!("{}/protocol/openid-connect/userinfo", realm_url),
            client_id,
            client_secret,
            http_client,
        }
    }

    /// Build a client from configuration.
    ///
    /// Returns `None` when no client credentials are configured.
    pub fn from_config(config: &Config) -> Option<Self> {
        let client_id = config.client_id.clone()?;
        let client_secret = config.client_secret.clone()?;

        Some(Self::with_timeout(
            &config.realm_url(),
            client_id,
            client_secret,
            config.jwks_fetch_timeout,
        ))
    }

    /// Ask the provider whether `token` is still active.
    ///
    /// `Ok(false)` covers expired, revoked and unknown tokens alike.
    ///
    /// # Errors
    ///
    /// - `IdpClientError::MissingToken` if `token` is empty
    /// - `IdpClientError::Remote` on network failure, a non-2xx status (which
    ///   includes rejected client credentials) or a response without a
    ///   boolean `active` field
    #[instrument(skip_all)]
    pub async fn introspect(&self, token: &str) -> Result<bool, IdpClientError> {
        let start = Instant::now();
        let result = self.introspect_inner(token).await;
        record_outcome("introspect", &result, start.elapsed());
        result
    }

    async fn introspect_inner(&self, token: &str) -> Result<bool, IdpClientError> {
        if token.is_empty() {
            return Err(IdpClientError::MissingToken);
        }

        let form = [
            ("token", token),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
        ];

        let response = self
            .http_client
            .post(&self.introspect_url)
            .form(&form)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(target: "auth.idp", status = %status, "Introspection endpoint returned error");
            return Err(KeySourceError::RemoteStatus(status.as_u16()).into());
        }

        let introspection: IntrospectionResponse = read_json(response).await?;
        tracing::debug!(target: "auth.idp", active = introspection.active, "Token introspected");

        Ok(introspection.active)
    }

    /// Fetch the profile of the user `token` was issued to.
    ///
    /// # Errors
    ///
    /// - `IdpClientError::MissingToken` if `token` is empty
    /// - `IdpClientError::Rejected` if the provider answers 401 or 403
    /// - `IdpClientError::Remote` on network failure, any other non-2xx
    ///   status or an unparseable body
    #[instrument(skip_all)]
    pub async fn user_info(&self, token: &str) -> Result<UserInfo, IdpClientError> {
        let start = Instant::now();
        let result = self.user_info_inner(token).await;
        record_outcome("userinfo", &result, start.elapsed());
        result
    }

    async fn user_info_inner(&self, token: &str) -> Result<UserInfo, IdpClientError> {
        if token.is_empty() {
            return Err(IdpClientError::MissingToken);
        }

        let response = self
            .http_client
            .get(&self.userinfo_url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(network_error)?;

        match response.status().as_u16() {
            200..=299 => Ok(read_json(response).await?),
            status @ (401 | 403) => {
                tracing::debug!(target: "auth.idp", status = status, "Userinfo request rejected");
                Err(IdpClientError::Rejected(status))
            }
            status => {
                tracing::warn!(target: "auth.idp", status = status, "Userinfo endpoint returned error");
                Err(KeySourceError::RemoteStatus(status).into())
            }
        }
    }
}

fn network_error(e: reqwest::Error) -> KeySourceError {
    tracing::error!(target: "auth.idp", error = %e, "Identity provider request failed");
    KeySourceError::Network(e.to_string())
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, KeySourceError> {
    let body = response.bytes().await.map_err(network_error)?;

    serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!(target: "auth.idp", error = %e, "Failed to parse identity provider response");
        KeySourceError::Parse(e.to_string())
    })
}

fn record_outcome<T>(endpoint: &'static str, result: &Result<T, IdpClientError>, duration: Duration) {
    match result {
        Ok(_) => metrics::record_idp_request(endpoint, "success", None, duration),
        Err(e) => metrics::record_idp_request(endpoint, "error", Some(e.kind()), duration),
    }
}
