//! Signature verification against the identity provider's RSA keys.
//!
//! # Security
//!
//! - Only the RSA algorithms in [`SigningAlgorithm`] are accepted; `none`,
//!   HMAC and other key families never reach verification
//! - JWK exponents are range-checked and moduli must be at least 2048 bits
//! - A key that pins an `alg` only verifies tokens declaring that algorithm

use crate::auth::jwks::Jwk;
use crate::auth::key_cache::KeyCache;
use crate::auth::token::ParsedToken;
use crate::errors::AuthError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{crypto, Algorithm, DecodingKey};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

/// Smallest RSA modulus accepted from a JWKS document.
pub const MIN_RSA_MODULUS_BITS: usize = 2048;

/// Allow-listed signing algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SigningAlgorithm {
    Rs256,
    Rs384,
    Rs512,
    Ps256,
    Ps384,
    Ps512,
}

impl SigningAlgorithm {
    /// Look up an algorithm by its JOSE name. Names are case-sensitive.
    ///
    /// Returns `None` for anything not on the allow-list, including `none`
    /// and every symmetric algorithm.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "RS256" => Some(Self::Rs256),
            "RS384" => Some(Self::Rs384),
            "RS512" => Some(Self::Rs512),
            "PS256" => Some(Self::Ps256),
            "PS384" => Some(Self::Ps384),
            "PS512" => Some(Self::Ps512),
            _ => None,
        }
    }

    /// JOSE name of the algorithm.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rs256 => "RS256",
            Self::Rs384 => "RS384",
            Self::Rs512 => "RS512",
            Self::Ps256 => "PS256",
            Self::Ps384 => "PS384",
            Self::Ps512 => "PS512",
        }
    }
}

impl From<SigningAlgorithm> for Algorithm {
    fn from(alg: SigningAlgorithm) -> Self {
        match alg {
            SigningAlgorithm::Rs256 => Algorithm::RS256,
            SigningAlgorithm::Rs384 => Algorithm::RS384,
            SigningAlgorithm::Rs512 => Algorithm::RS512,
            SigningAlgorithm::Ps256 => Algorithm::PS256,
            SigningAlgorithm::Ps384 => Algorithm::PS384,
            SigningAlgorithm::Ps512 => Algorithm::PS512,
        }
    }
}

/// Reasons a JWK cannot be turned into a verification key.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyReconstructionError {
    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),

    #[error("missing RSA component: {0}")]
    MissingComponent(&'static str),

    #[error("RSA component {0} is not valid base64url")]
    InvalidEncoding(&'static str),

    #[error("RSA modulus too short: {0} bits")]
    ModulusTooShort(usize),

    #[error("RSA exponent out of range")]
    ExponentOutOfRange,

    #[error("unsupported key algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

/// RSA public key reconstructed from a JWK.
#[derive(Clone)]
pub struct PublicKey {
    kid: String,
    algorithm: Option<SigningAlgorithm>,
    modulus_bits: usize,
    exponent: u32,
    decoding_key: DecodingKey,
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .field("modulus_bits", &self.modulus_bits)
            .field("exponent", &self.exponent)
            .finish_non_exhaustive()
    }
}

impl PublicKey {
    /// Reconstruct an RSA public key from a JWK's `n` and `e` components.
    ///
    /// Both components are base64url (unpadded) big-endian unsigned integers.
    /// Leading zero bytes are ignored.
    ///
    /// # Errors
    ///
    /// Returns `KeyReconstructionError` if the key is not RSA, a component is
    /// missing or badly encoded, the modulus is shorter than
    /// [`MIN_RSA_MODULUS_BITS`], the exponent is even, below 3 or wider than
    /// 32 bits, or the JWK pins an algorithm that is not allow-listed.
    pub fn from_jwk(jwk: &Jwk) -> Result<Self, KeyReconstructionError> {
        if jwk.kty != "RSA" {
            return Err(KeyReconstructionError::UnsupportedKeyType(jwk.kty.clone()));
        }

        let algorithm = match &jwk.alg {
            Some(alg) => Some(
                SigningAlgorithm::from_name(alg)
                    .ok_or_else(|| KeyReconstructionError::UnsupportedAlgorithm(alg.clone()))?,
            ),
            None => None,
        };

        let modulus = decode_component(jwk.n.as_deref(), "n")?;
        let exponent_bytes = decode_component(jwk.e.as_deref(), "e")?;

        let modulus_bits = bit_length(&modulus);
        if modulus_bits < MIN_RSA_MODULUS_BITS {
            return Err(KeyReconstructionError::ModulusTooShort(modulus_bits));
        }

        let exponent = parse_exponent(&exponent_bytes)?;

        Ok(Self {
            kid: jwk.kid.clone(),
            algorithm,
            modulus_bits,
            exponent,
            decoding_key: DecodingKey::from_rsa_raw_components(&modulus, &exponent_bytes),
        })
    }

    /// Key ID this key was published under.
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Algorithm the provider pinned this key to, if any.
    pub fn algorithm(&self) -> Option<SigningAlgorithm> {
        self.algorithm
    }

    /// Size of the modulus in bits.
    pub fn modulus_bits(&self) -> usize {
        self.modulus_bits
    }

    /// Public exponent.
    pub fn exponent(&self) -> u32 {
        self.exponent
    }
}

/// Decode a base64url component and strip leading zero bytes.
fn decode_component(
    value: Option<&str>,
    name: &'static str,
) -> Result<Vec<u8>, KeyReconstructionError> {
    let value = value
        .filter(|v| !v.is_empty())
        .ok_or(KeyReconstructionError::MissingComponent(name))?;

    let bytes = URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|_| KeyReconstructionError::InvalidEncoding(name))?;

    Ok(bytes.into_iter().skip_while(|b| *b == 0).collect())
}

/// Number of significant bits in a big-endian integer without leading zeros.
fn bit_length(bytes: &[u8]) -> usize {
    match bytes.first() {
        Some(first) => (bytes.len() - 1) * 8 + (8 - first.leading_zeros() as usize),
        None => 0,
    }
}

/// Range-check the exponent before use: it must fit in 32 bits, be odd and
/// be at least 3.
fn parse_exponent(bytes: &[u8]) -> Result<u32, KeyReconstructionError> {
    if bytes.is_empty() || bytes.len() > 4 {
        return Err(KeyReconstructionError::ExponentOutOfRange);
    }

    let exponent = bytes
        .iter()
        .fold(0u32, |acc, byte| (acc << 8) | u32::from(*byte));

    if exponent < 3 || exponent % 2 == 0 {
        return Err(KeyReconstructionError::ExponentOutOfRange);
    }

    Ok(exponent)
}

/// Verify a token's signature with an already resolved key.
///
/// # Errors
///
/// Returns `AuthError::InvalidSignature` if the key pins a different
/// algorithm, the signature is not valid base64url, or it does not verify.
pub fn verify_signature(token: &ParsedToken<'_>, key: &PublicKey) -> Result<(), AuthError> {
    let alg = token.header.alg;

    if let Some(pinned) = key.algorithm() {
        if pinned != alg {
            tracing::warn!(
                target: "auth.jwt",
                kid = %key.kid(),
                key_alg = pinned.as_str(),
                token_alg = alg.as_str(),
                "Token algorithm does not match key algorithm"
            );
            return Err(AuthError::InvalidSignature);
        }
    }

    match crypto::verify(
        token.signature,
        token.signing_input.as_bytes(),
        &key.decoding_key,
        alg.into(),
    ) {
        Ok(true) => Ok(()),
        Ok(false) => {
            tracing::debug!(target: "auth.jwt", kid = %key.kid, "Token signature mismatch");
            Err(AuthError::InvalidSignature)
        }
        Err(e) => {
            tracing::debug!(target: "auth.jwt", kid = %key.kid, error = %e, "Token signature verification failed");
            Err(AuthError::InvalidSignature)
        }
    }
}

/// Resolves signing keys through the [`KeyCache`] and verifies signatures.
#[derive(Clone)]
pub struct SignatureVerifier {
    key_cache: Arc<KeyCache>,
}

impl SignatureVerifier {
    /// Create a verifier backed by a shared key cache.
    pub fn new(key_cache: Arc<KeyCache>) -> Self {
        Self { key_cache }
    }

    /// Resolve the token's signing key and verify its signature.
    ///
    /// # Errors
    ///
    /// - `AuthError::KeyNotFound` / `AuthError::RemoteUnavailable` from key
    ///   resolution
    /// - `AuthError::InvalidSignature` if verification fails
    #[instrument(skip_all, fields(kid = %token.header.kid, alg = token.header.alg.as_str()))]
    pub async fn verify(&self, token: &ParsedToken<'_>) -> Result<(), AuthError> {
        let key = self.key_cache.resolve(&token.header.kid).await?;
        verify_signature(token, &key)
    }
}
