//! Verified token claims.
//!
//! Contains the claim set extracted from validated bearer tokens. The `sub`
//! and `email` fields identify a person and are redacted in Debug output to
//! prevent exposure in logs.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Nested role container as published by the identity provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RealmAccess {
    /// Role names granted to the principal.
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Claim set of a verified bearer token.
///
/// Built strictly from a token whose signature has been verified; unverified
/// tokens must never be deserialized into this type outside the verifier.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (user identifier) - redacted in Debug output.
    pub sub: String,

    /// Issuer URL of the identity provider realm.
    pub iss: String,

    /// Audience(s) the token was minted for. The provider emits either a
    /// single string or an array; both deserialize to a list.
    #[serde(default, deserialize_with = "deserialize_audience")]
    pub aud: Vec<String>,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Not-before timestamp (Unix epoch seconds), if present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,

    /// Issued-at timestamp (Unix epoch seconds), if present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Display username, if the provider includes one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,

    /// Email address - redacted in Debug output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Realm role container. Absent when the token carries no roles.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realm_access: Option<RealmAccess>,
}

/// Custom Debug implementation that redacts `sub` and `email`.
impl fmt::Debug for TokenClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenClaims")
            .field("sub", &"[REDACTED]")
            .field("iss", &self.iss)
            .field("aud", &self.aud)
            .field("exp", &self.exp)
            .field("nbf", &self.nbf)
            .field("iat", &self.iat)
            .field("preferred_username", &self.preferred_username)
            .field("email", &"[REDACTED]")
            .field("realm_access", &self.realm_access)
            .finish()
    }
}

impl TokenClaims {
    /// Role names from the realm role claim; empty when the claim is absent.
    #[must_use]
    pub fn roles(&self) -> &[String] {
        self.realm_access
            .as_ref()
            .map(|ra| ra.roles.as_slice())
            .unwrap_or_default()
    }

    /// Check whether the principal holds a specific role (exact match).
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles().iter().any(|r| r == role)
    }

    /// Check whether the principal holds at least one of the given roles.
    #[must_use]
    pub fn has_any_role(&self, allowed: &[&str]) -> bool {
        allowed.iter().any(|role| self.has_role(role))
    }

    /// Name used for audit entries: the display username when present,
    /// otherwise the subject identifier.
    #[must_use]
    pub fn actor(&self) -> &str {
        self.preferred_username.as_deref().unwrap_or(&self.sub)
    }
}

/// Accept `aud` as either a single string or an array of strings.
fn deserialize_audience<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::String(s) => Ok(vec![s]),
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                serde_json::Value::String(s) => Ok(s),
                other => Err(serde::de::Error::custom(format!(
                    "audience entries must be strings, got {other}"
                ))),
            })
            .collect(),
        serde_json::Value::Null => Ok(Vec::new()),
        other => Err(serde::de::Error::custom(format!(
            "audience must be a string or array of strings, got {other}"
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn claims_with_roles(roles: &[&str]) -> TokenClaims {
        TokenClaims {
            sub: "user-1".to_string(),
            iss: "https://idp.example.com/realms/helpdesk".to_string(),
            aud: vec!["helpdesk-backend".to_string()],
            exp: 1_700_000_000,
            nbf: None,
            iat: Some(1_699_999_000),
            preferred_username: Some("alice".to_string()),
            email: Some("alice@example.com".to_string()),
            realm_access: Some(RealmAccess {
                roles: roles.iter().map(ToString::to_string).collect(),
            }),
        }
    }

    #[test]
    fn test_debug_redacts_sub_and_email() {
        let claims = claims_with_roles(&["user"]);
        let debug_str = format!("{claims:?}");

        assert!(!debug_str.contains("user-1"));
        assert!(!debug_str.contains("alice@example.com"));
        assert!(debug_str.contains("[REDACTED]"));
        // Non-sensitive fields stay visible
        assert!(debug_str.contains("helpdesk-backend"));
    }

    #[test]
    fn test_roles_default_to_empty() {
        let mut claims = claims_with_roles(&[]);
        claims.realm_access = None;

        assert!(claims.roles().is_empty());
        assert!(!claims.has_role("user"));
    }

    #[test]
    fn test_has_any_role_requires_intersection() {
        let claims = claims_with_roles(&["user", "manager"]);

        assert!(claims.has_any_role(&["admin", "manager"]));
        assert!(!claims.has_any_role(&["admin"]));
        assert!(!claims.has_any_role(&[]));
    }

    #[test]
    fn test_has_role_exact_match_only() {
        let claims = claims_with_roles(&["manager"]);

        assert!(claims.has_role("manager"));
        assert!(!claims.has_role("manage"));
        assert!(!claims.has_role("managers"));
    }

    #[test]
    fn test_actor_prefers_username() {
        let claims = claims_with_roles(&["user"]);
        assert_eq!(claims.actor(), "alice");

        let mut anonymous = claims_with_roles(&["user"]);
        anonymous.preferred_username = None;
        assert_eq!(anonymous.actor(), "user-1");
    }

    #[test]
    fn test_audience_accepts_single_string() {
        let json = r#"{
            "sub": "u1",
            "iss": "https://idp.example.com/realms/helpdesk",
            "aud": "helpdesk-backend",
            "exp": 1700000000
        }"#;

        let claims: TokenClaims = serde_json::from_str(json).unwrap();
        assert_eq!(claims.aud, vec!["helpdesk-backend".to_string()]);
    }

    #[test]
    fn test_audience_accepts_array() {
        let json = r#"{
            "sub": "u1",
            "iss": "https://idp.example.com/realms/helpdesk",
            "aud": ["account", "helpdesk-backend"],
            "exp": 1700000000
        }"#;

        let claims: TokenClaims = serde_json::from_str(json).unwrap();
        assert_eq!(claims.aud.len(), 2);
        assert!(claims.aud.iter().any(|a| a == "helpdesk-backend"));
    }

    #[test]
    fn test_audience_missing_is_empty() {
        let json = r#"{
            "sub": "u1",
            "iss": "https://idp.example.com/realms/helpdesk",
            "exp": 1700000000
        }"#;

        let claims: TokenClaims = serde_json::from_str(json).unwrap();
        assert!(claims.aud.is_empty());
    }

    #[test]
    fn test_audience_rejects_non_string_entries() {
        let json = r#"{
            "sub": "u1",
            "iss": "https://idp.example.com/realms/helpdesk",
            "aud": [42],
            "exp": 1700000000
        }"#;

        assert!(serde_json::from_str::<TokenClaims>(json).is_err());
    }

    #[test]
    fn test_missing_roles_claim_still_deserializes() {
        let json = r#"{
            "sub": "u1",
            "iss": "https://idp.example.com/realms/helpdesk",
            "aud": "helpdesk-backend",
            "exp": 1700000000
        }"#;

        let claims: TokenClaims = serde_json::from_str(json).unwrap();
        assert!(claims.realm_access.is_none());
        assert!(claims.roles().is_empty());
    }

    #[test]
    fn test_serialization_round_trip() {
        let claims = claims_with_roles(&["user", "admin"]);

        let json = serde_json::to_string(&claims).unwrap();
        let back: TokenClaims = serde_json::from_str(&json).unwrap();

        assert_eq!(back.sub, claims.sub);
        assert_eq!(back.roles(), claims.roles());
        assert_eq!(back.aud, claims.aud);
    }
}
