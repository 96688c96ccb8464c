//! Claims validation.
//!
//! Runs only on payloads whose signature has already been verified. Checks
//! are applied in a fixed order and the first failure wins:
//!
//! 1. `exp` present and strictly in the future, else `Expired`
//! 2. `nbf`, if present, not in the future, else `NotYetValid`
//! 3. `iss` equal to the expected issuer, if one is configured
//! 4. `iat`, if present, no more than the clock skew in the future
//! 5. `sub` present and non-empty

use crate::auth::context::AuthContext;
use crate::errors::AuthError;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Default clock skew tolerance for `iat` (5 minutes).
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Maximum configurable clock skew tolerance (10 minutes).
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

/// `realm_access` / `resource_access.<client>` claim shape.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct RoleClaim {
    #[serde(default, deserialize_with = "null_as_default")]
    pub roles: Vec<String>,
}

/// Treat an explicit JSON `null` like an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Token payload as issued by the identity provider.
///
/// The `sub` and `email` fields are redacted in Debug output.
#[derive(Clone, Deserialize)]
pub struct Claims {
    /// Subject. Defaults to empty so a missing `sub` fails validation rather
    /// than decoding.
    #[serde(default)]
    pub sub: String,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: Option<i64>,

    /// Not-before timestamp (Unix epoch seconds).
    pub nbf: Option<i64>,

    /// Issued-at timestamp (Unix epoch seconds).
    pub iat: Option<i64>,

    pub iss: Option<String>,

    pub preferred_username: Option<String>,

    pub email: Option<String>,

    pub name: Option<String>,

    pub realm_access: Option<RoleClaim>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub resource_access: HashMap<String, RoleClaim>,
}

impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claims")
            .field("sub", &"[REDACTED]")
            .field("exp", &self.exp)
            .field("nbf", &self.nbf)
            .field("iat", &self.iat)
            .field("iss", &self.iss)
            .field("preferred_username", &self.preferred_username)
            .field("email", &self.email.as_ref().map(|_| "[REDACTED]"))
            .field("realm_access", &self.realm_access)
            .finish_non_exhaustive()
    }
}

/// Settings for [`ClaimsValidator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorConfig {
    /// Expected `iss`. `None` disables the issuer check.
    pub issuer: Option<String>,

    /// Tolerance for `iat` values in the future.
    pub clock_skew: Duration,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            issuer: None,
            clock_skew: DEFAULT_CLOCK_SKEW,
        }
    }
}

/// Checks time-based validity and issuer, then projects the claims into an
/// [`AuthContext`].
#[derive(Debug, Clone)]
pub struct ClaimsValidator {
    config: ValidatorConfig,
}

impl ClaimsValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Validate verified payload bytes against the current time.
    ///
    /// # Errors
    ///
    /// - `AuthError::ClaimsInvalid` - payload is not a claims object, issuer
    ///   mismatch, `iat` too far in the future, or missing `sub`
    /// - `AuthError::Expired` - `exp` missing or not in the future
    /// - `AuthError::NotYetValid` - `nbf` in the future
    pub fn validate(&self, payload: &[u8]) -> Result<AuthContext, AuthError> {
        self.validate_at(payload, chrono::Utc::now().timestamp())
    }

    /// Deterministic validation against an explicit `now` (Unix epoch seconds).
    pub(crate) fn validate_at(&self, payload: &[u8], now: i64) -> Result<AuthContext, AuthError> {
        let claims: Claims = serde_json::from_slice(payload).map_err(|e| {
            tracing::debug!(target: "auth.claims", error = %e, "Failed to decode token claims");
            AuthError::ClaimsInvalid
        })?;

        match claims.exp {
            Some(exp) if exp > now => {}
            exp => {
                tracing::debug!(target: "auth.claims", exp = ?exp, now = now, "Token rejected: expired");
                return Err(AuthError::Expired);
            }
        }

        if let Some(nbf) = claims.nbf {
            if nbf > now {
                tracing::debug!(target: "auth.claims", nbf = nbf, now = now, "Token rejected: not yet valid");
                return Err(AuthError::NotYetValid);
            }
        }

        if let Some(expected) = &self.config.issuer {
            if claims.iss.as_deref() != Some(expected.as_str()) {
                tracing::debug!(
                    target: "auth.claims",
                    iss = ?claims.iss,
                    expected = %expected,
                    "Token rejected: issuer mismatch"
                );
                return Err(AuthError::ClaimsInvalid);
            }
        }

        if let Some(iat) = claims.iat {
            validate_iat_at(iat, self.config.clock_skew, now)?;
        }

        if claims.sub.is_empty() {
            tracing::debug!(target: "auth.claims", "Token rejected: missing sub");
            return Err(AuthError::ClaimsInvalid);
        }

        Ok(AuthContext::from(claims))
    }
}

/// Reject an `iat` more than `clock_skew` after `now`.
fn validate_iat_at(iat: i64, clock_skew: Duration, now: i64) -> Result<(), AuthError> {
    // Safe cast: clock_skew is bounded to MAX_CLOCK_SKEW by configuration
    #[allow(clippy::cast_possible_wrap)]
    let clock_skew_secs = clock_skew.as_secs() as i64;
    let max_iat = now.saturating_add(clock_skew_secs);

    if iat > max_iat {
        tracing::debug!(
            target: "auth.claims",
            iat = iat,
            now = now,
            max_allowed = max_iat,
            clock_skew_secs = clock_skew_secs,
            "Token rejected: iat too far in the future"
        );
        return Err(AuthError::ClaimsInvalid);
    }

    Ok(())
}
