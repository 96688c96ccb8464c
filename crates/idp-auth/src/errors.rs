//! Token validation error types.
//!
//! Every validation stage fails with exactly one `AuthError` variant. Display
//! strings are intentionally generic so that the rejection stage is not leaked
//! to clients; the detailed cause is logged server-side at the point of
//! failure and is available through [`AuthError::kind`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Errors raised while talking to the identity provider: fetching its key
/// set, or calling its introspection and userinfo endpoints.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeySourceError {
    /// Connection failure or timeout.
    #[error("Identity provider request failed: {0}")]
    Network(String),

    /// The endpoint answered with an unexpected status.
    #[error("Identity provider returned status {0}")]
    RemoteStatus(u16),

    /// The response body did not have the expected shape.
    #[error("Identity provider response could not be parsed: {0}")]
    Parse(String),
}

impl KeySourceError {
    /// Bounded label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            KeySourceError::Network(_) => "network",
            KeySourceError::RemoteStatus(_) => "remote_status",
            KeySourceError::Parse(_) => "parse",
        }
    }
}

/// Errors from [`IdpClient`](crate::auth::IdpClient) calls.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdpClientError {
    /// Called with an empty token; no request was sent.
    #[error("A token is required")]
    MissingToken,

    /// The provider refused the token (401 or 403).
    #[error("Identity provider rejected the token with status {0}")]
    Rejected(u16),

    #[error(transparent)]
    Remote(#[from] KeySourceError),
}

impl IdpClientError {
    /// Bounded label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            IdpClientError::MissingToken => "missing_token",
            IdpClientError::Rejected(_) => "rejected",
            IdpClientError::Remote(cause) => cause.kind(),
        }
    }
}

/// Token validation error.
///
/// Maps to HTTP status codes:
/// - RemoteUnavailable: 503 Service Unavailable
/// - everything else: 401 Unauthorized
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("The access token is invalid or expired")]
    MalformedToken,

    #[error("The access token is invalid or expired")]
    UnsupportedAlgorithm,

    #[error("The access token is invalid or expired")]
    KeyNotFound,

    #[error("Authentication service unavailable")]
    RemoteUnavailable(#[source] KeySourceError),

    #[error("The access token is invalid or expired")]
    InvalidSignature,

    #[error("The access token is invalid or expired")]
    Expired,

    #[error("The access token is invalid or expired")]
    NotYetValid,

    #[error("The access token is invalid or expired")]
    ClaimsInvalid,
}

impl AuthError {
    /// Stable snake_case name of the failing stage, for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::MalformedToken => "malformed_token",
            AuthError::UnsupportedAlgorithm => "unsupported_algorithm",
            AuthError::KeyNotFound => "key_not_found",
            AuthError::RemoteUnavailable(_) => "remote_unavailable",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::Expired => "expired",
            AuthError::NotYetValid => "not_yet_valid",
            AuthError::ClaimsInvalid => "claims_invalid",
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::RemoteUnavailable(_) => 503,
            _ => 401,
        }
    }
}

impl From<KeySourceError> for AuthError {
    fn from(err: KeySourceError) -> Self {
        AuthError::RemoteUnavailable(err)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AuthError::RemoteUnavailable(cause) => {
                tracing::warn!(target: "auth.availability", error = %cause, "Identity provider unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE")
            }
            _ => (StatusCode::UNAUTHORIZED, "INVALID_TOKEN"),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        // Add WWW-Authenticate header for 401 responses
        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) = "Bearer realm=\"api\", error=\"invalid_token\"".parse() {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    async fn read_body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn all_credential_errors() -> Vec<AuthError> {
        vec![
            AuthError::MalformedToken,
            AuthError::UnsupportedAlgorithm,
            AuthError::KeyNotFound,
            AuthError::InvalidSignature,
            AuthError::Expired,
            AuthError::NotYetValid,
            AuthError::ClaimsInvalid,
        ]
    }

    #[test]
    fn test_credential_errors_share_generic_message() {
        for error in all_credential_errors() {
            assert_eq!(
                error.to_string(),
                "The access token is invalid or expired",
                "{} should not leak its stage",
                error.kind()
            );
        }
    }

    #[test]
    fn test_status_codes() {
        for error in all_credential_errors() {
            assert_eq!(error.status_code(), 401);
        }
        assert_eq!(
            AuthError::RemoteUnavailable(KeySourceError::RemoteStatus(502)).status_code(),
            503
        );
    }

    #[test]
    fn test_kinds_are_distinct() {
        let mut kinds: Vec<&str> = all_credential_errors().iter().map(AuthError::kind).collect();
        kinds.push(AuthError::RemoteUnavailable(KeySourceError::Network("x".into())).kind());
        let count = kinds.len();
        kinds.sort_unstable();
        kinds.dedup();
        assert_eq!(kinds.len(), count);
    }

    #[test]
    fn test_key_source_error_converts_to_remote_unavailable() {
        let err: AuthError = KeySourceError::Parse("eof".to_string()).into();
        assert!(matches!(err, AuthError::RemoteUnavailable(KeySourceError::Parse(_))));
    }

    #[test]
    fn test_key_source_error_display() {
        assert_eq!(
            KeySourceError::RemoteStatus(404).to_string(),
            "Identity provider returned status 404"
        );
        assert_eq!(KeySourceError::Network("timeout".into()).kind(), "network");
    }

    #[test]
    fn test_idp_client_error_kinds() {
        assert_eq!(IdpClientError::MissingToken.kind(), "missing_token");
        assert_eq!(IdpClientError::Rejected(401).kind(), "rejected");

        let remote: IdpClientError = KeySourceError::RemoteStatus(500).into();
        assert_eq!(remote.kind(), "remote_status");
        assert_eq!(remote.to_string(), "Identity provider returned status 500");
    }

    #[tokio::test]
    async fn test_into_response_invalid_token() {
        let response = AuthError::Expired.into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let www_auth = response.headers().get("WWW-Authenticate");
        assert!(www_auth.is_some());
        assert!(www_auth
            .unwrap()
            .to_str()
            .unwrap()
            .contains("error=\"invalid_token\""));

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "INVALID_TOKEN");
        assert_eq!(
            body_json["error"]["message"],
            "The access token is invalid or expired"
        );
    }

    #[tokio::test]
    async fn test_into_response_remote_unavailable() {
        let error = AuthError::RemoteUnavailable(KeySourceError::Network("refused".into()));
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.headers().get("WWW-Authenticate").is_none());

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "SERVICE_UNAVAILABLE");
        // Cause is logged, never returned
        assert!(!body_json.to_string().contains("refused"));
    }
}
