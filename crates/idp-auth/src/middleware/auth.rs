//! Authentication middleware for protected routes.
//!
//! Extracts the Bearer token from the Authorization header, validates it and
//! injects the resulting [`AuthContext`] into request extensions.

use crate::auth::{AuthContext, TokenValidator};
use crate::errors::AuthError;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    /// Shared token validator.
    pub validator: Arc<TokenValidator>,
}

impl AuthState {
    pub fn new(validator: Arc<TokenValidator>) -> Self {
        Self { validator }
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
///
/// The scheme name is matched case-insensitively (RFC 7235). Returns `None`
/// if the header is missing or not valid ASCII, uses another scheme or
/// carries an empty token.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    Some(token.trim()).filter(|token| !token.is_empty())
}

/// Authentication middleware that rejects unauthenticated requests.
///
/// # Response
///
/// - 401 Unauthorized with WWW-Authenticate header if the token is missing or
///   invalid
/// - 503 Service Unavailable if the identity provider's keys cannot be fetched
/// - Otherwise continues with the [`AuthContext`] in request extensions
#[instrument(skip_all, name = "auth.middleware.require")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, AuthError> {
    let token = extract_bearer_token(req.headers()).ok_or_else(|| {
        tracing::debug!(target: "auth.middleware", "Missing or malformed Authorization header");
        AuthError::MalformedToken
    })?;

    let context = state.validator.validate(token).await?;

    req.extensions_mut().insert(context);

    Ok(next.run(req).await)
}

/// Authentication middleware for routes that also serve anonymous callers.
///
/// A valid token puts an [`AuthContext`] into request extensions. A missing
/// or rejected token lets the request through without one.
#[instrument(skip_all, name = "auth.middleware.optional")]
pub async fn optional_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> impl IntoResponse {
    if let Some(token) = extract_bearer_token(req.headers()) {
        match state.validator.validate(token).await {
            Ok(context) => {
                req.extensions_mut().insert(context);
            }
            Err(e) => {
                tracing::debug!(
                    target: "auth.middleware",
                    error_type = e.kind(),
                    "Token rejected, continuing anonymously"
                );
            }
        }
    }

    next.run(req).await
}

/// Extension trait for reading the authenticated identity from a request.
pub trait AuthContextExt {
    /// Get the authenticated identity from request extensions.
    ///
    /// Returns `None` if no auth middleware ran or the caller is anonymous.
    fn auth_context(&self) -> Option<&AuthContext>;
}

impl<B> AuthContextExt for axum::http::Request<B> {
    fn auth_context(&self) -> Option<&AuthContext> {
        self.extensions().get::<AuthContext>()
    }
}
