//! Bearer token validation against the identity provider.
//!
//! # Components
//!
//! - `jwks` - JWKS document types and the HTTP key source
//! - `key_cache` - shared, single-flight cache of reconstructed keys
//! - `token` - compact JWS parsing and algorithm allow-list
//! - `verifier` - RSA key reconstruction and signature verification
//! - `claims` - time, issuer and subject checks
//! - `context` - the validated identity
//! - `validator` - the pipeline tying them together
//! - `idp_client` - introspection and userinfo calls to the provider

pub mod claims;
pub mod context;
pub mod idp_client;
pub mod jwks;
pub mod key_cache;
pub mod token;
pub mod validator;
pub mod verifier;

pub use claims::{Claims, ClaimsValidator, ValidatorConfig};
pub use context::AuthContext;
pub use idp_client::{IdpClient, UserInfo};
pub use jwks::{HttpKeySource, Jwk, JwksDocument, KeySource};
pub use key_cache::KeyCache;
pub use token::{parse_token, ParsedToken};
pub use validator::TokenValidator;
pub use verifier::{PublicKey, SignatureVerifier, SigningAlgorithm};
