//! Concurrent validation against a shared key cache.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use futures::future::join_all;
use idp_auth::auth::{HttpKeySource, KeyCache, KeySource, TokenValidator, ValidatorConfig};
use idp_auth::AuthError;
use idp_auth_test_utils::{
    rsa_jwk, shared_rsa_key, sign_token, MockIdentityProvider, TestClaimsBuilder,
};
use jsonwebtoken::Algorithm;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn validator_for(idp: &MockIdentityProvider) -> TokenValidator {
    let source: Arc<dyn KeySource> = Arc::new(HttpKeySource::new(idp.jwks_url()));
    TokenValidator::new(
        Arc::new(KeyCache::new(source)),
        ValidatorConfig {
            issuer: Some(idp.issuer()),
            ..ValidatorConfig::default()
        },
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_unknown_kid_triggers_single_fetch() {
    let idp = MockIdentityProvider::start().await;
    idp.serve_keys_with_delay(
        &[rsa_jwk(shared_rsa_key(0), "abc123")],
        Duration::from_millis(200),
    )
    .await;
    let validator = validator_for(&idp);

    let claims = TestClaimsBuilder::new().with_issuer(&idp.issuer()).build();
    let token = sign_token(shared_rsa_key(0), "unknown-kid", Algorithm::RS256, &claims);

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let validator = validator.clone();
            let token = token.clone();
            tokio::spawn(async move { validator.validate(&token).await })
        })
        .collect();

    for result in join_all(handles).await {
        assert_eq!(result.unwrap().unwrap_err(), AuthError::KeyNotFound);
    }
    assert_eq!(idp.jwks_request_count().await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cold_cache_burst_shares_one_fetch() {
    let idp = MockIdentityProvider::start().await;
    idp.serve_keys_with_delay(
        &[rsa_jwk(shared_rsa_key(0), "abc123")],
        Duration::from_millis(200),
    )
    .await;
    let validator = validator_for(&idp);

    let claims = TestClaimsBuilder::new()
        .for_user("user-42")
        .with_issuer(&idp.issuer())
        .build();
    let token = sign_token(shared_rsa_key(0), "abc123", Algorithm::RS256, &claims);

    let results = join_all((0..16).map(|_| validator.validate(&token))).await;

    for result in results {
        assert_eq!(result.unwrap().subject, "user-42");
    }
    assert_eq!(idp.jwks_request_count().await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failed_refresh_is_shared_by_waiters() {
    let idp = MockIdentityProvider::start().await;
    idp.fail_with_status_after(500, Duration::from_millis(200)).await;
    let validator = validator_for(&idp);

    let claims = TestClaimsBuilder::new().with_issuer(&idp.issuer()).build();
    let token = sign_token(shared_rsa_key(0), "abc123", Algorithm::RS256, &claims);

    let results = join_all((0..8).map(|_| validator.validate(&token))).await;

    for result in results {
        assert!(matches!(result, Err(AuthError::RemoteUnavailable(_))));
    }
    assert_eq!(
        idp.jwks_request_count().await,
        1,
        "waiters must not each retry after a shared failure"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_warm_cache_validations_run_in_parallel() {
    let idp = MockIdentityProvider::start().await;
    idp.serve_keys(&[rsa_jwk(shared_rsa_key(0), "abc123")]).await;
    let validator = validator_for(&idp);

    let claims = TestClaimsBuilder::new().with_issuer(&idp.issuer()).build();
    let token = sign_token(shared_rsa_key(0), "abc123", Algorithm::RS256, &claims);
    validator.validate(&token).await.unwrap();

    // Slow down the endpoint so any refresh would be visible in the timing
    idp.reset().await;
    idp.serve_keys_with_delay(&[rsa_jwk(shared_rsa_key(0), "abc123")], Duration::from_secs(5))
        .await;

    let start = Instant::now();
    let handles: Vec<_> = (0..64)
        .map(|_| {
            let validator = validator.clone();
            let token = token.clone();
            tokio::spawn(async move { validator.validate(&token).await })
        })
        .collect();
    for result in join_all(handles).await {
        assert!(result.unwrap().is_ok());
    }

    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(idp.jwks_request_count().await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancelled_request_does_not_cancel_refresh() {
    let idp = MockIdentityProvider::start().await;
    idp.serve_keys_with_delay(
        &[rsa_jwk(shared_rsa_key(0), "abc123")],
        Duration::from_millis(300),
    )
    .await;
    let validator = validator_for(&idp);

    let claims = TestClaimsBuilder::new().with_issuer(&idp.issuer()).build();
    let token = sign_token(shared_rsa_key(0), "abc123", Algorithm::RS256, &claims);

    let cancelled = tokio::time::timeout(Duration::from_millis(50), validator.validate(&token)).await;
    assert!(cancelled.is_err());

    tokio::time::sleep(Duration::from_millis(600)).await;

    // The refresh completed in the background; this is a cache hit
    validator.validate(&token).await.unwrap();
    assert_eq!(idp.jwks_request_count().await, 1);
}
