//! End-to-end bearer token validation.

use crate::auth::claims::{ClaimsValidator, ValidatorConfig};
use crate::auth::context::AuthContext;
use crate::auth::jwks::{HttpKeySource, KeySource};
use crate::auth::key_cache::KeyCache;
use crate::auth::token::parse_token;
use crate::auth::verifier::SignatureVerifier;
use crate::config::Config;
use crate::errors::AuthError;
use crate::observability::metrics;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Validates bearer tokens issued by the identity provider.
///
/// Cheap to clone; clones share the same key cache.
#[derive(Clone)]
pub struct TokenValidator {
    verifier: SignatureVerifier,
    claims: ClaimsValidator,
}

impl TokenValidator {
    /// Create a validator from an existing key cache.
    pub fn new(key_cache: Arc<KeyCache>, config: ValidatorConfig) -> Self {
        Self {
            verifier: SignatureVerifier::new(key_cache),
            claims: ClaimsValidator::new(config),
        }
    }

    /// Build the production stack: HTTP key source, key cache and claims
    /// settings, all from configuration.
    pub fn from_config(config: &Config) -> Self {
        let http_source =
            HttpKeySource::with_timeout(config.jwks_url.clone(), config.jwks_fetch_timeout);
        tracing::info!(
            target: "auth.jwks",
            jwks_url = %http_source.jwks_url(),
            cache_ttl_secs = config.jwks_cache_ttl.as_secs(),
            "Token validator configured"
        );
        let source: Arc<dyn KeySource> = Arc::new(http_source);
        let key_cache = Arc::new(KeyCache::with_ttl(source, config.jwks_cache_ttl));

        Self::new(
            key_cache,
            ValidatorConfig {
                issuer: config.issuer.clone(),
                clock_skew: config.clock_skew,
            },
        )
    }

    /// Validate a compact bearer token and return the caller's identity.
    ///
    /// Stages run in order (parse, key resolution, signature, claims) and
    /// the first failure is returned. Nothing is retried within one call.
    ///
    /// # Errors
    ///
    /// Returns the `AuthError` variant of the first failing stage.
    #[instrument(skip_all, fields(status))]
    pub async fn validate(&self, token: &str) -> Result<AuthContext, AuthError> {
        let start = Instant::now();
        let result = self.validate_inner(token).await;
        let duration = start.elapsed();

        match &result {
            Ok(_) => {
                tracing::Span::current().record("status", "success");
                metrics::record_token_validation("success", None, duration);
            }
            Err(e) => {
                tracing::Span::current().record("status", "error");
                tracing::debug!(target: "auth.jwt", error_type = e.kind(), "Token validation failed");
                metrics::record_token_validation("error", Some(e.kind()), duration);
            }
        }

        result
    }

    async fn validate_inner(&self, token: &str) -> Result<AuthContext, AuthError> {
        let parsed = parse_token(token)?;
        self.verifier.verify(&parsed).await?;
        self.claims.validate(&parsed.payload)
    }
}
