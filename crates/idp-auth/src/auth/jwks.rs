//! JWKS retrieval from the identity provider.
//!
//! The identity provider publishes its public signing keys as a JSON Web Key
//! Set. [`HttpKeySource`] fetches that document over HTTPS with a bounded
//! timeout. It never retries: retry policy belongs to the [`KeyCache`].
//!
//! [`KeyCache`]: crate::auth::KeyCache

use crate::errors::KeySourceError;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use tracing::instrument;

/// Default timeout for a JWKS fetch (connect + response).
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// JSON Web Key as published by the identity provider.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Jwk {
    /// Key type ("RSA" for the keys this crate accepts).
    pub kty: String,

    /// Key ID - used to select the correct key for verification.
    pub kid: String,

    /// Key use ("sig" for signing keys, "enc" for encryption keys).
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    /// RSA modulus (base64url, big-endian).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url, big-endian).
    #[serde(default)]
    pub e: Option<String>,

    /// Algorithm the key is pinned to, if the provider declares one.
    #[serde(default)]
    pub alg: Option<String>,
}

/// JWKS document.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksDocument {
    /// List of JSON Web Keys, in published order.
    ///
    /// Entries that do not decode as a [`Jwk`] (no `kid`, unexpected field
    /// types) are dropped so one foreign key cannot hide the rest of the set.
    #[serde(deserialize_with = "deserialize_usable_keys")]
    pub keys: Vec<Jwk>,
}

fn deserialize_usable_keys<'de, D>(deserializer: D) -> Result<Vec<Jwk>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = Vec::<serde_json::Value>::deserialize(deserializer)?;

    Ok(entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<Jwk>(entry) {
            Ok(jwk) => Some(jwk),
            Err(e) => {
                tracing::debug!(target: "auth.jwks", error = %e, "Ignoring undecodable JWKS entry");
                None
            }
        })
        .collect())
}

/// Source of the identity provider's key set.
///
/// Implementations are bound to a provider endpoint at construction time.
#[async_trait]
pub trait KeySource: Send + Sync {
    /// Fetch the current key set.
    ///
    /// # Errors
    ///
    /// - `KeySourceError::Network` on connection failure or timeout
    /// - `KeySourceError::RemoteStatus` on a non-2xx response
    /// - `KeySourceError::Parse` if the body is not a JWKS document
    async fn fetch(&self) -> Result<JwksDocument, KeySourceError>;
}

/// Fetches the JWKS document over HTTP(S).
pub struct HttpKeySource {
    /// URL to the JWKS endpoint.
    jwks_url: String,

    /// HTTP client for fetching JWKS.
    http_client: reqwest::Client,
}

impl HttpKeySource {
    /// Create a key source with the default fetch timeout.
    pub fn new(jwks_url: String) -> Self {
        Self::with_timeout(jwks_url, DEFAULT_FETCH_TIMEOUT)
    }

    /// Create a key source with a custom fetch timeout.
    pub fn with_timeout(jwks_url: String, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            jwks_url,
            http_client,
        }
    }

    /// The endpoint this source fetches from.
    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }
}

#[async_trait]
impl KeySource for HttpKeySource {
    #[instrument(skip(self), fields(url = %self.jwks_url))]
    async fn fetch(&self) -> Result<JwksDocument, KeySourceError> {
        tracing::debug!(target: "auth.jwks", "Fetching JWKS from identity provider");

        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "auth.jwks", error = %e, "Failed to fetch JWKS");
                KeySourceError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(target: "auth.jwks", status = %status, "JWKS endpoint returned error");
            return Err(KeySourceError::RemoteStatus(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| {
            tracing::error!(target: "auth.jwks", error = %e, "Failed to read JWKS response body");
            KeySourceError::Network(e.to_string())
        })?;

        let document: JwksDocument = serde_json::from_slice(&body).map_err(|e| {
            tracing::error!(target: "auth.jwks", error = %e, "Failed to parse JWKS response");
            KeySourceError::Parse(e.to_string())
        })?;

        tracing::debug!(target: "auth.jwks", key_count = document.keys.len(), "JWKS fetched");

        Ok(document)
    }
}
