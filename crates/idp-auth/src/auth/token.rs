//! Compact JWS parsing.
//!
//! Splits a bearer token into its three segments and decodes the header
//! without trusting any of its content. The declared algorithm is checked
//! against the allow-list here, before the key id is even looked at, so an
//! `alg: none` or HMAC token never reaches key resolution.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE any decoding (DoS prevention)
//! - The payload is decoded to bytes only; claims are not parsed until the
//!   signature has been verified

use crate::auth::verifier::SigningAlgorithm;
use crate::errors::AuthError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

/// Maximum allowed token size in bytes (8KB).
///
/// Typical provider access tokens are 1-2KB. Anything larger than this is
/// rejected before base64 decoding or JSON parsing.
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

/// Decoded token header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenHeader {
    /// Signing algorithm, already checked against the allow-list.
    pub alg: SigningAlgorithm,

    /// Key ID of the signing key.
    pub kid: String,
}

/// A token split into its segments. Nothing in it is trusted yet.
#[derive(Debug)]
pub struct ParsedToken<'a> {
    /// Decoded header.
    pub header: TokenHeader,

    /// `header.payload` exactly as received - the bytes the signature covers.
    pub signing_input: &'a str,

    /// Decoded payload bytes.
    pub payload: Vec<u8>,

    /// Signature segment, still base64url encoded.
    pub signature: &'a str,
}

/// Parse a compact JWS token.
///
/// # Errors
///
/// - `AuthError::MalformedToken` - oversized token, wrong segment count, bad
///   base64url, header that is not a JSON object, missing `alg` or `kid`
/// - `AuthError::UnsupportedAlgorithm` - `alg` is not on the allow-list
pub fn parse_token(token: &str) -> Result<ParsedToken<'_>, AuthError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "auth.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(AuthError::MalformedToken);
    }

    let mut segments = token.split('.');
    let (Some(header_b64), Some(payload_b64), Some(signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        tracing::debug!(target: "auth.jwt", "Token rejected: not exactly three segments");
        return Err(AuthError::MalformedToken);
    };

    let header_bytes = URL_SAFE_NO_PAD.decode(header_b64).map_err(|e| {
        tracing::debug!(target: "auth.jwt", error = %e, "Failed to decode token header base64");
        AuthError::MalformedToken
    })?;

    let header: serde_json::Value = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "auth.jwt", error = %e, "Failed to parse token header JSON");
        AuthError::MalformedToken
    })?;

    let alg = header
        .get("alg")
        .and_then(|v| v.as_str())
        .ok_or(AuthError::MalformedToken)?;

    let alg = SigningAlgorithm::from_name(alg).ok_or_else(|| {
        tracing::warn!(target: "auth.jwt", alg = %alg, "Token rejected: algorithm not allowed");
        AuthError::UnsupportedAlgorithm
    })?;

    // Extract kid as string, rejecting empty values
    let kid = header
        .get("kid")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or_else(|| {
            tracing::debug!(target: "auth.jwt", "Token rejected: missing kid");
            AuthError::MalformedToken
        })?;

    let payload = URL_SAFE_NO_PAD.decode(payload_b64).map_err(|e| {
        tracing::debug!(target: "auth.jwt", error = %e, "Failed to decode token payload base64");
        AuthError::MalformedToken
    })?;

    // header_b64 and payload_b64 are adjacent in `token`, separated by one '.'
    let signing_input = token
        .get(..header_b64.len() + 1 + payload_b64.len())
        .ok_or(AuthError::MalformedToken)?;

    Ok(ParsedToken {
        header: TokenHeader { alg, kid },
        signing_input,
        payload,
        signature,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn encode_segment(json: &str) -> String {
        URL_SAFE_NO_PAD.encode(json.as_bytes())
    }

    fn token_with_header(header: &str) -> String {
        format!(
            "{}.{}.c2lnbmF0dXJl",
            encode_segment(header),
            encode_segment(r#"{"sub":"user-42"}"#)
        )
    }

    #[test]
    fn test_parse_valid_token() {
        let token = token_with_header(r#"{"alg":"RS256","typ":"JWT","kid":"abc123"}"#);

        let parsed = parse_token(&token).unwrap();

        assert_eq!(parsed.header.alg, SigningAlgorithm::Rs256);
        assert_eq!(parsed.header.kid, "abc123");
        assert_eq!(parsed.payload, br#"{"sub":"user-42"}"#.to_vec());
        assert_eq!(parsed.signature, "c2lnbmF0dXJl");
        assert_eq!(
            format!("{}.c2lnbmF0dXJl", parsed.signing_input),
            token,
            "signing input must be the first two segments verbatim"
        );
    }

    #[test]
    fn test_parse_rejects_wrong_segment_count() {
        assert_eq!(parse_token("").unwrap_err(), AuthError::MalformedToken);
        assert_eq!(parse_token("single").unwrap_err(), AuthError::MalformedToken);
        assert_eq!(parse_token("only.two").unwrap_err(), AuthError::MalformedToken);
        assert_eq!(
            parse_token("not.a.valid.jwt").unwrap_err(),
            AuthError::MalformedToken
        );
    }

    #[test]
    fn test_parse_rejects_oversized_token() {
        let oversized = "a".repeat(MAX_JWT_SIZE_BYTES + 1);
        assert_eq!(parse_token(&oversized).unwrap_err(), AuthError::MalformedToken);
    }

    #[test]
    fn test_parse_accepts_token_at_size_limit() {
        let header = encode_segment(r#"{"alg":"RS256","kid":"key"}"#);
        let payload = encode_segment("{}");
        let sig_len = MAX_JWT_SIZE_BYTES - header.len() - payload.len() - 2;
        let token = format!("{}.{}.{}", header, payload, "b".repeat(sig_len));
        assert_eq!(token.len(), MAX_JWT_SIZE_BYTES);

        assert!(parse_token(&token).is_ok());
    }

    #[test]
    fn test_parse_rejects_invalid_base64_header() {
        assert_eq!(
            parse_token("!!!invalid!!!.e30.sig").unwrap_err(),
            AuthError::MalformedToken
        );
    }

    #[test]
    fn test_parse_rejects_invalid_json_header() {
        let token = format!("{}.e30.sig", encode_segment("not json"));
        assert_eq!(parse_token(&token).unwrap_err(), AuthError::MalformedToken);
    }

    #[test]
    fn test_parse_rejects_missing_alg() {
        let token = token_with_header(r#"{"typ":"JWT","kid":"abc123"}"#);
        assert_eq!(parse_token(&token).unwrap_err(), AuthError::MalformedToken);
    }

    #[test]
    fn test_parse_rejects_alg_none() {
        let token = format!(
            "{}.{}.",
            encode_segment(r#"{"alg":"none","typ":"JWT"}"#),
            encode_segment(r#"{"sub":"admin"}"#)
        );
        assert_eq!(
            parse_token(&token).unwrap_err(),
            AuthError::UnsupportedAlgorithm
        );
    }

    #[test]
    fn test_parse_rejects_symmetric_algorithms() {
        for alg in ["HS256", "HS384", "HS512"] {
            let token = token_with_header(&format!(r#"{{"alg":"{alg}","kid":"abc123"}}"#));
            assert_eq!(
                parse_token(&token).unwrap_err(),
                AuthError::UnsupportedAlgorithm,
                "{alg} must be rejected"
            );
        }
    }

    #[test]
    fn test_parse_rejects_other_asymmetric_families() {
        for alg in ["ES256", "EdDSA", "rs256"] {
            let token = token_with_header(&format!(r#"{{"alg":"{alg}","kid":"abc123"}}"#));
            assert_eq!(
                parse_token(&token).unwrap_err(),
                AuthError::UnsupportedAlgorithm,
                "{alg} must be rejected"
            );
        }
    }

    #[test]
    fn test_parse_checks_algorithm_before_kid() {
        // No kid at all, but the algorithm is the first thing rejected
        let token = token_with_header(r#"{"alg":"HS256"}"#);
        assert_eq!(
            parse_token(&token).unwrap_err(),
            AuthError::UnsupportedAlgorithm
        );
    }

    #[test]
    fn test_parse_rejects_missing_or_empty_kid() {
        for header in [
            r#"{"alg":"RS256"}"#,
            r#"{"alg":"RS256","kid":""}"#,
            r#"{"alg":"RS256","kid":12345}"#,
            r#"{"alg":"RS256","kid":null}"#,
        ] {
            let token = token_with_header(header);
            assert_eq!(
                parse_token(&token).unwrap_err(),
                AuthError::MalformedToken,
                "header {header} must be rejected"
            );
        }
    }

    #[test]
    fn test_parse_rejects_invalid_base64_payload() {
        let token = format!(
            "{}.!!!.sig",
            encode_segment(r#"{"alg":"RS256","kid":"abc123"}"#)
        );
        assert_eq!(parse_token(&token).unwrap_err(), AuthError::MalformedToken);
    }

    #[test]
    fn test_parse_does_not_interpret_payload() {
        // Payload is not JSON; parsing still succeeds because claims are only
        // decoded after signature verification.
        let token = format!(
            "{}.{}.sig",
            encode_segment(r#"{"alg":"PS256","kid":"abc123"}"#),
            encode_segment("opaque")
        );
        let parsed = parse_token(&token).unwrap();
        assert_eq!(parsed.header.alg, SigningAlgorithm::Ps256);
        assert_eq!(parsed.payload, b"opaque".to_vec());
    }
}
