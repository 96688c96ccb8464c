//! Identity provider bearer token validation.
//!
//! Verifies RS*/PS* signed access tokens against the public keys the
//! identity provider publishes as a JWKS document, and turns them into a
//! typed [`AuthContext`].
//!
//! # Architecture
//!
//! ```text
//! token -> parse_token -> SignatureVerifier (-> KeyCache -> KeySource)
//!       -> ClaimsValidator -> AuthContext
//! ```
//!
//! # Modules
//!
//! - `auth` - the validation pipeline and key cache
//! - `config` - configuration from environment
//! - `errors` - error types with HTTP status code mapping
//! - `middleware` - axum adapters for protected and optional routes
//! - `observability` - metrics definitions
//!
//! # Usage
//!
//! ```rust,ignore
//! let config = Config::from_env()?;
//! let validator = TokenValidator::from_config(&config);
//!
//! let context = validator.validate(token).await?;
//! if context.has_role("project-admin") {
//!     // ...
//! }
//! ```

pub mod auth;
pub mod config;
pub mod errors;
pub mod middleware;
pub mod observability;

pub use auth::{AuthContext, IdpClient, KeyCache, TokenValidator};
pub use config::{Config, ConfigError};
pub use errors::{AuthError, IdpClientError, KeySourceError};
