//! JWT parsing utilities shared between the helpdesk API and the session client.
//!
//! This module provides the pieces of JWT handling that do not require a
//! verification key:
//! - Size limits for DoS prevention
//! - Clock skew constants for expiry/not-before validation
//! - Header field extraction (`alg`, `kid`) from unverified tokens
//! - Unverified payload decoding (client-side display use only)
//! - Public key decoding for RSA and Ed25519 JWKs
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Nothing in this module verifies a signature; callers that trust claim
//!   contents MUST verify the token first
//! - Error messages are generic to prevent information leakage

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// This limit prevents denial-of-service attacks via oversized tokens.
/// JWTs larger than this size are rejected BEFORE any parsing or cryptographic
/// operations.
///
/// Typical identity-provider tokens are 1-3KB (header + realm claims +
/// signature); 8KB allows for reasonable expansion while preventing abuse.
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Default clock skew tolerance for expiry and not-before validation.
///
/// Accounts for clock drift between the identity provider and this host.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(60);

/// Maximum allowed clock skew tolerance (10 minutes).
///
/// Prevents misconfiguration that would weaken expiry checking by allowing
/// an excessively large tolerance.
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while parsing a token's structure.
///
/// Note: Display messages are intentionally generic to prevent information
/// leakage. Detail is logged at debug level for troubleshooting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtParseError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token is not a structurally valid JWT.
    #[error("The access token is invalid or expired")]
    MalformedToken,

    /// Token header is missing the `kid` field.
    #[error("The access token is invalid or expired")]
    MissingKid,
}

// =============================================================================
// Header Parsing
// =============================================================================

/// Fields extracted from an unverified JWT header.
///
/// `alg` is kept as the raw string so that callers can distinguish `"none"`
/// and unknown algorithms from supported ones; parsing it into a concrete
/// algorithm type is the verifier's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderFields {
    /// Raw `alg` value from the header, if present.
    pub alg: Option<String>,

    /// Key ID (`kid`) from the header, if present and non-empty.
    pub kid: Option<String>,
}

/// Decode the header of a JWT without verifying the signature.
///
/// # Security
///
/// - Token size is checked BEFORE any parsing (denial-of-service prevention)
/// - This function does NOT validate the token signature
/// - The returned fields should only be used for key lookup and algorithm
///   screening; the token MUST still be verified afterwards
///
/// # Errors
///
/// - `TokenTooLarge` - Token exceeds `MAX_JWT_SIZE_BYTES`
/// - `MalformedToken` - Not three dot-separated parts, bad base64, or bad JSON
pub fn decode_header_fields(token: &str) -> Result<HeaderFields, JwtParseError> {
    let header = decode_part(token, 0)?;

    let alg = header
        .get("alg")
        .and_then(|v| v.as_str())
        .map(ToString::to_string);

    // Empty kid values are rejected the same as absent ones
    let kid = header
        .get("kid")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string);

    Ok(HeaderFields { alg, kid })
}

/// Extract the `kid` (key ID) from a JWT header without verifying the signature.
///
/// Used to look up the correct signing key when multiple keys may be valid
/// (e.g., during key rotation).
///
/// # Errors
///
/// - `TokenTooLarge` - Token exceeds size limit
/// - `MalformedToken` - Token format invalid
/// - `MissingKid` - Header has no `kid`, or `kid` is empty or not a string
pub fn extract_kid(token: &str) -> Result<String, JwtParseError> {
    decode_header_fields(token)?
        .kid
        .ok_or(JwtParseError::MissingKid)
}

/// Decode the payload of a JWT **without verifying the signature**.
///
/// This mirrors what browser identity-provider adapters do with
/// `tokenParsed`: the claims are used for display and role hints only, never
/// as an authorization decision of record. Server-side verification remains
/// the authority.
///
/// # Errors
///
/// Returns `TokenTooLarge` or `MalformedToken` as for header parsing.
pub fn decode_payload_unverified(token: &str) -> Result<serde_json::Value, JwtParseError> {
    decode_part(token, 1)
}

/// Decode one dot-separated part of a JWT as base64url JSON.
fn decode_part(token: &str, index: usize) -> Result<serde_json::Value, JwtParseError> {
    // Check token size first (DoS prevention)
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtParseError::TokenTooLarge);
    }

    // JWT format: header.payload.signature
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        tracing::debug!(
            target: "common.jwt",
            parts = parts.len(),
            "Token rejected: invalid JWT format"
        );
        return Err(JwtParseError::MalformedToken);
    }

    let part = parts.get(index).ok_or(JwtParseError::MalformedToken)?;
    let bytes = URL_SAFE_NO_PAD.decode(part).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT part base64");
        JwtParseError::MalformedToken
    })?;

    serde_json::from_slice(&bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT part JSON");
        JwtParseError::MalformedToken
    })
}

// =============================================================================
// Public Key Decoding
// =============================================================================

/// Decode an Ed25519 public key from a JWK `x` field (base64url format).
///
/// The `x` field in an OKP (Octet Key Pair) JWK contains the raw public key
/// in base64url encoding without padding. The resulting 32 bytes feed
/// `DecodingKey::from_ed_der` directly.
///
/// # Errors
///
/// Returns `base64::DecodeError` if the base64url content cannot be decoded.
pub fn decode_ed25519_public_key_jwk(x_b64url: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(x_b64url)
}

// =============================================================================
// Tests
// =============================================================================
