//! Current user handler.
//!
//! Returns information about the authenticated principal from the verified
//! token claims.

use crate::auth::TokenClaims;
use axum::{Extension, Json};
use serde::Serialize;
use tracing::instrument;

/// Response for `GET /api/me`.
#[derive(Debug, Clone, Serialize)]
pub struct MeResponse {
    /// Subject (user identifier).
    pub sub: String,

    /// Display username, if the provider includes one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,

    /// Email address, if present in the claims.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Realm roles held by the principal.
    pub roles: Vec<String>,

    /// Token expiration timestamp.
    pub exp: i64,
}

/// Handler for `GET /api/me`.
///
/// Any authenticated caller may ask who they are; no role requirement.
#[instrument(skip_all, name = "helpdesk.handlers.me")]
pub async fn current_user(Extension(claims): Extension<TokenClaims>) -> Json<MeResponse> {
    tracing::debug!(target: "helpdesk.handlers.me", "Returning current user claims");

    Json(MeResponse {
        roles: claims.roles().to_vec(),
        sub: claims.sub,
        preferred_username: claims.preferred_username,
        email: claims.email,
        exp: claims.exp,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_me_response_serialization() {
        let response = MeResponse {
            sub: "user-1".to_string(),
            preferred_username: Some("alice".to_string()),
            email: Some("alice@example.com".to_string()),
            roles: vec!["user".to_string(), "manager".to_string()],
            exp: 1_700_000_000,
        };

        let json = serde_json::to_string(&response).unwrap();

        assert!(json.contains("\"sub\":\"user-1\""));
        assert!(json.contains("\"roles\":[\"user\",\"manager\"]"));
        assert!(json.contains("\"exp\":1700000000"));
    }

    #[test]
    fn test_me_response_omits_absent_fields() {
        let response = MeResponse {
            sub: "user-1".to_string(),
            preferred_username: None,
            email: None,
            roles: vec![],
            exp: 1_700_000_000,
        };

        let json = serde_json::to_string(&response).unwrap();

        assert!(!json.contains("preferred_username"));
        assert!(!json.contains("email"));
    }
}
