//! Metrics definitions for identity-provider token validation.
//!
//! All metrics follow Prometheus naming conventions:
//! - `auth_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `status`: 2 values (success, error)
//! - `error_type`: 8 values (`AuthError::kind`) or 3 values (`KeySourceError::kind`), plus "none"
//! - `result`: 2 values (hit, miss)
//! - `endpoint`: 2 values (introspect, userinfo)

use metrics::{counter, histogram};
use std::time::Duration;

// ============================================================================
// Validation Metrics
// ============================================================================

/// Record the outcome of one `validate` call.
///
/// Metric: `auth_token_validations_total`, `auth_token_validation_duration_seconds`
/// Labels: `status`, `error_type`
pub fn record_token_validation(status: &str, error_type: Option<&str>, duration: Duration) {
    histogram!("auth_token_validation_duration_seconds", "status" => status.to_string())
        .record(duration.as_secs_f64());

    let error_type = error_type.unwrap_or("none");
    counter!("auth_token_validations_total", "status" => status.to_string(), "error_type" => error_type.to_string())
        .increment(1);
}

// ============================================================================
// JWKS Metrics
// ============================================================================

/// Record a JWKS refresh attempt.
///
/// Metric: `auth_jwks_refresh_total`, `auth_jwks_refresh_duration_seconds`
/// Labels: `status`, `error_type`
pub fn record_jwks_refresh(status: &str, error_type: Option<&str>, duration: Duration) {
    histogram!("auth_jwks_refresh_duration_seconds").record(duration.as_secs_f64());

    let error_type = error_type.unwrap_or("none");
    counter!("auth_jwks_refresh_total", "status" => status.to_string(), "error_type" => error_type.to_string())
        .increment(1);
}

/// Record a key cache lookup.
///
/// Metric: `auth_jwks_cache_lookups_total`
/// Labels: `result` (hit, miss)
pub fn record_key_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("auth_jwks_cache_lookups_total", "result" => result).increment(1);
}

// ============================================================================
// Identity Provider Client Metrics
// ============================================================================

/// Record a call to the provider's introspection or userinfo endpoint.
///
/// Metric: `auth_idp_requests_total`, `auth_idp_request_duration_seconds`
/// Labels: `endpoint`, `status`, `error_type`
pub fn record_idp_request(
    endpoint: &'static str,
    status: &str,
    error_type: Option<&str>,
    duration: Duration,
) {
    histogram!("auth_idp_request_duration_seconds", "endpoint" => endpoint)
        .record(duration.as_secs_f64());

    let error_type = error_type.unwrap_or("none");
    counter!(
        "auth_idp_requests_total",
        "endpoint" => endpoint,
        "status" => status.to_string(),
        "error_type" => error_type.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    // These execute the recording functions against the global no-op recorder.
    // Values are not asserted; that would need a test recorder.

    #[test]
    fn test_record_token_validation() {
        record_token_validation("success", None, Duration::from_micros(350));
        record_token_validation("error", Some("expired"), Duration::from_micros(120));
        record_token_validation("error", Some("remote_unavailable"), Duration::from_secs(10));
    }

    #[test]
    fn test_record_jwks_refresh() {
        record_jwks_refresh("success", None, Duration::from_millis(40));
        record_jwks_refresh("error", Some("network"), Duration::from_secs(10));
        record_jwks_refresh("error", Some("parse"), Duration::from_millis(15));
    }

    #[test]
    fn test_record_idp_request() {
        record_idp_request("introspect", "success", None, Duration::from_millis(25));
        record_idp_request("userinfo", "error", Some("rejected"), Duration::from_millis(8));
    }

    #[test]
    fn test_record_key_cache_lookup() {
        record_key_cache_lookup(true);
        record_key_cache_lookup(false);
    }
}
