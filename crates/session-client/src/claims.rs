//! Client-side claim parsing.
//!
//! The client decodes the token payload **without verifying the signature**,
//! exactly as browser identity-provider adapters expose `tokenParsed`. The
//! result drives display and role hints only; the server-side verifier is
//! the authority on every request.

use crate::error::SessionError;
use common::jwt::decode_payload_unverified;
use std::collections::HashSet;

/// Claims the client keeps for the current session.
#[derive(Debug, Clone)]
pub struct SessionClaims {
    /// Subject identifier, if present.
    pub sub: Option<String>,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Display username, if present.
    pub preferred_username: Option<String>,

    /// Email address, if present.
    pub email: Option<String>,

    /// Realm roles; an absent role claim parses as the empty set.
    pub roles: HashSet<String>,
}

impl SessionClaims {
    /// Parse the payload of a provider-issued token.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::SessionCheckFailed` when the token is not
    /// structurally a JWT or carries no usable `exp` claim; a token whose
    /// expiry the client cannot track cannot be refreshed on time.
    pub fn parse_unverified(token: &str) -> Result<Self, SessionError> {
        let payload = decode_payload_unverified(token).map_err(|e| {
            tracing::debug!(target: "session.claims", error = ?e, "Token payload parse failed");
            SessionError::SessionCheckFailed("provider returned an unreadable token".to_string())
        })?;

        let exp = payload.get("exp").and_then(serde_json::Value::as_i64).ok_or_else(|| {
            tracing::debug!(target: "session.claims", "Token payload has no exp claim");
            SessionError::SessionCheckFailed("provider token has no expiry".to_string())
        })?;

        let roles = payload
            .get("realm_access")
            .and_then(|ra| ra.get("roles"))
            .and_then(serde_json::Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let string_claim = |name: &str| {
            payload
                .get(name)
                .and_then(serde_json::Value::as_str)
                .map(ToString::to_string)
        };

        Ok(Self {
            sub: string_claim("sub"),
            exp,
            preferred_username: string_claim("preferred_username"),
            email: string_claim("email"),
            roles,
        })
    }

    /// Seconds of validity left at `now`.
    #[must_use]
    pub fn remaining_at(&self, now: i64) -> i64 {
        self.exp - now
    }
}
