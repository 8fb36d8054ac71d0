//! Admin-only route handlers.

use crate::auth::TokenClaims;
use axum::{Extension, Json};
use serde::Serialize;
use tracing::instrument;

/// Response for `GET /api/admin/data`.
#[derive(Debug, Clone, Serialize)]
pub struct AdminDataResponse {
    /// Confirmation the admin surface was reached.
    pub message: String,

    /// Display name of the acting administrator.
    pub actor: String,
}

/// Response for `GET /api/user/info`.
#[derive(Debug, Clone, Serialize)]
pub struct UserInfoResponse {
    /// Subject of the inspected token.
    pub sub: String,

    /// Issuer of the inspected token.
    pub iss: String,

    /// Audiences of the inspected token.
    pub aud: Vec<String>,

    /// Realm roles carried by the token.
    pub roles: Vec<String>,
}

/// Handler for `GET /api/admin/data` (roles: admin).
#[instrument(skip_all, name = "helpdesk.handlers.admin.data")]
pub async fn admin_data(Extension(claims): Extension<TokenClaims>) -> Json<AdminDataResponse> {
    tracing::debug!(target: "helpdesk.handlers.admin", "Serving admin data");
    Json(AdminDataResponse {
        message: "Admin data access granted".to_string(),
        actor: claims.actor().to_string(),
    })
}

/// Handler for `GET /api/user/info` (roles: admin).
///
/// Lets an administrator inspect the decoded claims of their own token, the
/// diagnostic view the original admin console exposed.
#[instrument(skip_all, name = "helpdesk.handlers.admin.user_info")]
pub async fn user_info(Extension(claims): Extension<TokenClaims>) -> Json<UserInfoResponse> {
    tracing::debug!(target: "helpdesk.handlers.admin", "Serving token info");
    Json(UserInfoResponse {
        roles: claims.roles().to_vec(),
        sub: claims.sub,
        iss: claims.iss,
        aud: claims.aud,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_data_response_serialization() {
        let response = AdminDataResponse {
            message: "Admin data access granted".to_string(),
            actor: "root".to_string(),
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"actor\":\"root\""));
    }

    #[test]
    fn test_user_info_response_serialization() {
        let response = UserInfoResponse {
            sub: "user-1".to_string(),
            iss: "https://idp.example.com/realms/helpdesk".to_string(),
            aud: vec!["helpdesk-backend".to_string()],
            roles: vec!["admin".to_string()],
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"roles\":[\"admin\"]"));
        assert!(json.contains("\"sub\":\"user-1\""));
    }
}
