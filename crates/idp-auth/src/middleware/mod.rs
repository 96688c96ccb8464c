//! Axum middleware for bearer token authentication.
//!
//! # Components
//!
//! - `auth` - `require_auth` / `optional_auth` layers and the
//!   `AuthContextExt` accessor for handlers

pub mod auth;

pub use auth::{extract_bearer_token, optional_auth, require_auth, AuthContextExt, AuthState};
