//! Process-wide cache of the identity provider's signing keys.
//!
//! Hits take the shared read lock only. Misses queue on a single refresh
//! gate so that at most one JWKS fetch is in flight at any time, regardless
//! of how many validations trigger it.
//!
//! # Refresh rules
//!
//! - An entry is served while it is younger than the TTL
//! - Once a refresh has succeeded, unknown kids are answered with
//!   `KeyNotFound` without another fetch until the TTL has elapsed
//! - Callers that waited behind a refresh attempt reuse its outcome instead of
//!   fetching again, including when that attempt failed
//! - The fetch runs in its own task; dropping the caller does not cancel it

use crate::auth::jwks::{JwksDocument, KeySource};
use crate::auth::verifier::{PublicKey, SigningAlgorithm};
use crate::errors::{AuthError, KeySourceError};
use crate::observability::metrics;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::instrument;

/// Default cache TTL (one hour).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// A resolved key and when it was last seen in a JWKS response.
///
/// Entries are replaced as a whole on refresh, never mutated in place.
#[derive(Debug, Clone)]
pub struct CachedKeyEntry {
    /// Reconstructed public key.
    pub key: Arc<PublicKey>,

    /// When the refresh that produced this entry completed.
    pub refreshed_at: Instant,
}

/// Shared state behind the read/write lock.
#[derive(Default)]
struct CacheState {
    /// Map of key ID to cached key.
    keys: HashMap<String, CachedKeyEntry>,

    /// When the last successful full refresh completed.
    last_refresh: Option<Instant>,

    /// Incremented every time a refresh attempt finishes, successful or not.
    generation: u64,

    /// Outcome of the most recent attempt if it failed.
    last_failure: Option<KeySourceError>,
}

impl CacheState {
    fn fresh_key(&self, kid: &str, ttl: Duration) -> Option<Arc<PublicKey>> {
        self.keys
            .get(kid)
            .filter(|entry| entry.refreshed_at.elapsed() < ttl)
            .map(|entry| Arc::clone(&entry.key))
    }

    fn refreshed_within(&self, ttl: Duration) -> bool {
        self.last_refresh
            .is_some_and(|refreshed| refreshed.elapsed() < ttl)
    }
}

/// Concurrency-safe cache of RSA public keys keyed by key ID.
pub struct KeyCache {
    /// Where keys come from on a miss.
    source: Arc<dyn KeySource>,

    /// Map, timestamps and refresh bookkeeping.
    state: Arc<RwLock<CacheState>>,

    /// Held for the whole duration of a refresh (single flight).
    refresh_gate: Arc<Mutex<()>>,

    /// How long entries and successful refreshes stay valid.
    ttl: Duration,
}

impl KeyCache {
    /// Create a cache with the default one-hour TTL.
    pub fn new(source: Arc<dyn KeySource>) -> Self {
        Self::with_ttl(source, DEFAULT_CACHE_TTL)
    }

    /// Create a cache with a custom TTL.
    pub fn with_ttl(source: Arc<dyn KeySource>, ttl: Duration) -> Self {
        Self {
            source,
            state: Arc::new(RwLock::new(CacheState::default())),
            refresh_gate: Arc::new(Mutex::new(())),
            ttl,
        }
    }

    /// Configured TTL.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the key for `kid` if it is cached and fresh. Never fetches.
    pub async fn lookup(&self, kid: &str) -> Option<Arc<PublicKey>> {
        let key = self.state.read().await.fresh_key(kid, self.ttl);
        metrics::record_key_cache_lookup(key.is_some());
        key
    }

    /// Return the key for `kid`, refreshing the key set on a miss.
    ///
    /// # Errors
    ///
    /// - `AuthError::KeyNotFound` if the kid is absent after a successful
    ///   refresh in the current TTL window
    /// - `AuthError::RemoteUnavailable` if the refresh this call depended on
    ///   failed
    #[instrument(skip(self))]
    pub async fn resolve(&self, kid: &str) -> Result<Arc<PublicKey>, AuthError> {
        let observed_generation = {
            let state = self.state.read().await;
            if let Some(key) = state.fresh_key(kid, self.ttl) {
                metrics::record_key_cache_lookup(true);
                tracing::debug!(target: "auth.cache", "JWKS cache hit");
                return Ok(key);
            }
            state.generation
        };
        metrics::record_key_cache_lookup(false);

        let gate = Arc::clone(&self.refresh_gate).lock_owned().await;

        // Double-check under the gate: another caller may have refreshed
        // while this one was waiting.
        {
            let state = self.state.read().await;
            if let Some(key) = state.fresh_key(kid, self.ttl) {
                return Ok(key);
            }

            if state.generation != observed_generation {
                return Err(match &state.last_failure {
                    Some(cause) => {
                        tracing::debug!(target: "auth.cache", error = %cause, "Concurrent JWKS refresh failed");
                        AuthError::RemoteUnavailable(cause.clone())
                    }
                    None => {
                        tracing::debug!(target: "auth.cache", "Key not found after concurrent JWKS refresh");
                        AuthError::KeyNotFound
                    }
                });
            }

            if state.refreshed_within(self.ttl) {
                tracing::debug!(target: "auth.cache", "Key not found, JWKS refreshed recently");
                return Err(AuthError::KeyNotFound);
            }
        }

        self.spawn_refresh(gate).await?;

        match self.state.read().await.fresh_key(kid, self.ttl) {
            Some(key) => Ok(key),
            None => {
                tracing::warn!(target: "auth.cache", "Key not found in JWKS after refresh");
                Err(AuthError::KeyNotFound)
            }
        }
    }

    /// Run a refresh to completion in its own task.
    ///
    /// The gate guard moves into the task, so the next refresh cannot start
    /// before this one has written its result, even if the caller is dropped.
    async fn spawn_refresh(&self, gate: OwnedMutexGuard<()>) -> Result<(), AuthError> {
        let source = Arc::clone(&self.source);
        let state = Arc::clone(&self.state);
        let ttl = self.ttl;

        let task = tokio::spawn(async move {
            let _gate = gate;
            refresh(source.as_ref(), &state, ttl).await
        });

        match task.await {
            Ok(result) => result.map_err(AuthError::RemoteUnavailable),
            Err(e) => {
                tracing::error!(target: "auth.cache", error = %e, "JWKS refresh task failed");
                Err(AuthError::RemoteUnavailable(KeySourceError::Network(
                    "refresh task aborted".to_string(),
                )))
            }
        }
    }

    /// Number of cached entries, fresh or not.
    pub async fn len(&self) -> usize {
        self.state.read().await.keys.len()
    }

    /// Whether the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.keys.is_empty()
    }
}

/// Fetch the key set and merge it into the cache. Caller holds the gate.
async fn refresh(
    source: &dyn KeySource,
    state: &RwLock<CacheState>,
    ttl: Duration,
) -> Result<(), KeySourceError> {
    let started = Instant::now();
    let fetched = source.fetch().await;
    metrics::record_jwks_refresh(
        if fetched.is_ok() { "success" } else { "error" },
        fetched.as_ref().err().map(KeySourceError::kind),
        started.elapsed(),
    );

    match fetched {
        Ok(document) => {
            let keys = build_entries(document);
            let now = Instant::now();

            let mut state = state.write().await;
            state.keys.extend(
                keys.into_iter()
                    .map(|(kid, key)| (kid, CachedKeyEntry { key, refreshed_at: now })),
            );
            // Keys no longer published age out here
            state
                .keys
                .retain(|_, entry| now.duration_since(entry.refreshed_at) < ttl);
            state.last_refresh = Some(now);
            state.last_failure = None;
            state.generation += 1;

            tracing::info!(
                target: "auth.cache",
                key_count = state.keys.len(),
                "JWKS cache refreshed"
            );
            Ok(())
        }
        Err(e) => {
            let mut state = state.write().await;
            state.last_failure = Some(e.clone());
            state.generation += 1;
            Err(e)
        }
    }
}

/// Reconstruct the usable signing keys of a JWKS document.
///
/// Non-RSA keys and encryption keys are ignored; keys that fail
/// reconstruction are skipped.
fn build_entries(document: JwksDocument) -> Vec<(String, Arc<PublicKey>)> {
    document
        .keys
        .into_iter()
        .filter(|jwk| {
            let usable =
                jwk.kty == "RSA" && jwk.key_use.as_deref().map_or(true, |u| u == "sig");
            if !usable {
                tracing::debug!(
                    target: "auth.cache",
                    kid = %jwk.kid,
                    kty = %jwk.kty,
                    key_use = ?jwk.key_use,
                    "Ignoring non-signing or non-RSA key"
                );
            }
            usable
        })
        .filter_map(|jwk| match PublicKey::from_jwk(&jwk) {
            Ok(key) => {
                tracing::debug!(
                    target: "auth.cache",
                    kid = %key.kid(),
                    alg = key.algorithm().map(SigningAlgorithm::as_str),
                    modulus_bits = key.modulus_bits(),
                    exponent = key.exponent(),
                    "Accepted JWK"
                );
                Some((jwk.kid, Arc::new(key)))
            }
            Err(e) => {
                tracing::warn!(target: "auth.cache", kid = %jwk.kid, error = %e, "Skipping unusable JWK");
                None
            }
        })
        .collect()
}
