//! # IdP Auth Test Utilities
//!
//! Shared test utilities for identity-provider token validation.
//!
//! This crate provides:
//! - RSA key fixtures (generated once per test binary)
//! - JWK rendering and token signing
//! - Claims builder (`TestClaimsBuilder`)
//! - Mock identity provider around `wiremock`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use idp_auth_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let idp = MockIdentityProvider::start().await;
//!     idp.serve_keys(&[rsa_jwk(shared_rsa_key(0), "abc123")]).await;
//!
//!     let claims = TestClaimsBuilder::new()
//!         .for_user("user-42")
//!         .with_issuer(&idp.issuer())
//!         .build();
//!     let token = sign_token(shared_rsa_key(0), "abc123", Algorithm::RS256, &claims);
//! }
//! ```

pub mod crypto_fixtures;
pub mod mock_idp;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use mock_idp::*;
pub use token_builders::*;
