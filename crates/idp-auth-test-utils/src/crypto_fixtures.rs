//! RSA key fixtures for tests.
//!
//! RSA key generation is slow, so a small pool of 2048-bit keys is generated
//! lazily once per test binary and shared by index.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use std::sync::OnceLock;

/// Number of distinct shared keys.
pub const SHARED_KEY_COUNT: usize = 3;

/// Test RSA key pair.
pub struct TestRsaKey {
    private_key: RsaPrivateKey,
    private_pem: String,
}

impl TestRsaKey {
    /// Generate a fresh key with the given modulus size.
    pub fn generate(bits: usize) -> Self {
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, bits).expect("RSA key generation failed");
        let private_pem = private_key
            .to_pkcs1_pem(LineEnding::LF)
            .expect("PKCS#1 encoding failed")
            .to_string();

        Self {
            private_key,
            private_pem,
        }
    }

    /// Modulus as big-endian bytes.
    pub fn modulus_bytes(&self) -> Vec<u8> {
        self.private_key.n().to_bytes_be()
    }

    /// Public exponent as big-endian bytes.
    pub fn exponent_bytes(&self) -> Vec<u8> {
        self.private_key.e().to_bytes_be()
    }

    /// Signing key for `jsonwebtoken`.
    pub fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_rsa_pem(self.private_pem.as_bytes()).expect("invalid test RSA PEM")
    }
}

static SHARED_KEYS: [OnceLock<TestRsaKey>; SHARED_KEY_COUNT] =
    [OnceLock::new(), OnceLock::new(), OnceLock::new()];

/// Shared 2048-bit key by index (`0..SHARED_KEY_COUNT`).
///
/// # Panics
///
/// Panics if `index` is out of range.
pub fn shared_rsa_key(index: usize) -> &'static TestRsaKey {
    SHARED_KEYS
        .get(index)
        .unwrap_or_else(|| panic!("shared_rsa_key index {index} out of range"))
        .get_or_init(|| TestRsaKey::generate(2048))
}

/// Render the public half of `key` as a signing JWK (no `alg`).
pub fn rsa_jwk(key: &TestRsaKey, kid: &str) -> serde_json::Value {
    serde_json::json!({
        "kty": "RSA",
        "kid": kid,
        "use": "sig",
        "n": URL_SAFE_NO_PAD.encode(key.modulus_bytes()),
        "e": URL_SAFE_NO_PAD.encode(key.exponent_bytes()),
    })
}

/// Sign `claims` with `key`, putting `kid` and `alg` in the header.
pub fn sign_token(
    key: &TestRsaKey,
    kid: &str,
    alg: Algorithm,
    claims: &serde_json::Value,
) -> String {
    let mut header = Header::new(alg);
    header.typ = Some("JWT".to_string());
    header.kid = Some(kid.to_string());

    encode(&header, claims, &key.encoding_key()).expect("Failed to sign token")
}

/// Assemble a token from raw header and claims JSON with an arbitrary
/// signature segment. For tokens no real signer would produce.
pub fn unsigned_token(header: &serde_json::Value, claims: &serde_json::Value, signature: &str) -> String {
    format!(
        "{}.{}.{}",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(claims.to_string()),
        signature
    )
}
