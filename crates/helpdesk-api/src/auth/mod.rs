//! Bearer token authentication: key resolution and token verification.

mod claims;
mod jwks;
mod verifier;

pub use claims::{RealmAccess, TokenClaims};
pub use jwks::{KeyResolver, SigningKey};
pub use verifier::TokenVerifier;

use thiserror::Error;

/// Reasons a bearer token can fail verification.
///
/// Display messages are what a client may see; they are intentionally generic
/// for every kind that could leak why exactly a forged token was rejected.
/// Detail is logged server-side at debug level.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Token is structurally invalid (format, base64, JSON, or signature).
    #[error("The access token is invalid or expired")]
    MalformedToken,

    /// Token header carries no usable `kid`.
    #[error("The access token is invalid or expired")]
    MissingKeyId,

    /// No signing key with the token's `kid` exists, even after a fresh
    /// fetch of the key set.
    #[error("The access token is invalid or expired")]
    KeyNotFound,

    /// The key set could not be fetched (network failure, non-success
    /// status, parse failure, or the fetch rate limit).
    #[error("Cannot verify tokens right now")]
    KeyFetchError(String),

    /// Token algorithm differs from the configured one (includes `none`).
    #[error("The access token is invalid or expired")]
    AlgorithmMismatch,

    /// Token expiry lies beyond the skew allowance.
    #[error("Token has expired")]
    Expired {
        /// The token's `exp` claim (Unix epoch seconds).
        expired_at: i64,
    },

    /// Token is not yet valid (`nbf` in the future beyond skew).
    #[error("The access token is invalid or expired")]
    NotYetValid,

    /// Token issuer differs from the configured issuer.
    #[error("The access token is invalid or expired")]
    IssuerMismatch,

    /// Configured audience is not among the token's audiences.
    #[error("The access token is invalid or expired")]
    AudienceMismatch,
}

impl AuthError {
    /// Short stable name for audit entries and logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::MalformedToken => "malformed_token",
            AuthError::MissingKeyId => "missing_key_id",
            AuthError::KeyNotFound => "key_not_found",
            AuthError::KeyFetchError(_) => "key_fetch_error",
            AuthError::AlgorithmMismatch => "algorithm_mismatch",
            AuthError::Expired { .. } => "expired",
            AuthError::NotYetValid => "not_yet_valid",
            AuthError::IssuerMismatch => "issuer_mismatch",
            AuthError::AudienceMismatch => "audience_mismatch",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_display_does_not_leak_kind() {
        // All rejection kinds that could help an attacker probe the verifier
        // share one client-visible message.
        let generic = AuthError::MalformedToken.to_string();

        assert_eq!(AuthError::MissingKeyId.to_string(), generic);
        assert_eq!(AuthError::KeyNotFound.to_string(), generic);
        assert_eq!(AuthError::AlgorithmMismatch.to_string(), generic);
        assert_eq!(AuthError::NotYetValid.to_string(), generic);
        assert_eq!(AuthError::IssuerMismatch.to_string(), generic);
        assert_eq!(AuthError::AudienceMismatch.to_string(), generic);
    }

    #[test]
    fn test_expired_display_is_distinct() {
        let err = AuthError::Expired {
            expired_at: 1_700_000_000,
        };
        assert_eq!(err.to_string(), "Token has expired");
        // But the timestamp itself is carried in the variant, not the message
        assert!(!err.to_string().contains("1700000000"));
    }

    #[test]
    fn test_kind_names_are_stable() {
        assert_eq!(AuthError::KeyNotFound.kind(), "key_not_found");
        assert_eq!(
            AuthError::KeyFetchError("timeout".to_string()).kind(),
            "key_fetch_error"
        );
        assert_eq!(AuthError::Expired { expired_at: 0 }.kind(), "expired");
    }
}
