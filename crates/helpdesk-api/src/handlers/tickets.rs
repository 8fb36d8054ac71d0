//! Ticket route handlers.
//!
//! Ticket persistence is an external collaborator; these handlers validate
//! nothing beyond what the middleware already attached and respond with the
//! acting principal so the pipeline is observable end to end.

use crate::auth::TokenClaims;
use axum::{http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Acknowledgment returned by ticket endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct TicketAck {
    /// The operation that was admitted.
    pub operation: String,

    /// Display name of the acting principal.
    pub actor: String,

    /// Roles the guard admitted the principal with.
    pub roles: Vec<String>,
}

impl TicketAck {
    fn new(operation: &str, claims: &TokenClaims) -> Self {
        Self {
            operation: operation.to_string(),
            actor: claims.actor().to_string(),
            roles: claims.roles().to_vec(),
        }
    }
}

/// Body for `POST /api/tickets`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTicketRequest {
    /// Short problem summary.
    pub title: String,

    /// Free-form description.
    #[serde(default)]
    pub description: String,
}

/// Handler for `GET /api/tickets` (roles: user, admin, manager).
#[instrument(skip_all, name = "helpdesk.handlers.tickets.list")]
pub async fn list_tickets(Extension(claims): Extension<TokenClaims>) -> Json<TicketAck> {
    tracing::debug!(target: "helpdesk.handlers.tickets", "Listing tickets");
    Json(TicketAck::new("list_tickets", &claims))
}

/// Handler for `POST /api/tickets` (roles: user).
#[instrument(skip_all, name = "helpdesk.handlers.tickets.create")]
pub async fn create_ticket(
    Extension(claims): Extension<TokenClaims>,
    Json(request): Json<CreateTicketRequest>,
) -> (StatusCode, Json<TicketAck>) {
    tracing::info!(
        target: "helpdesk.handlers.tickets",
        title = %request.title,
        "Ticket accepted"
    );
    (
        StatusCode::CREATED,
        Json(TicketAck::new("create_ticket", &claims)),
    )
}

/// Handler for `GET /api/tickets/my` (roles: user).
#[instrument(skip_all, name = "helpdesk.handlers.tickets.mine")]
pub async fn my_tickets(Extension(claims): Extension<TokenClaims>) -> Json<TicketAck> {
    tracing::debug!(target: "helpdesk.handlers.tickets", "Listing caller's tickets");
    Json(TicketAck::new("my_tickets", &claims))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::RealmAccess;

    fn claims() -> TokenClaims {
        TokenClaims {
            sub: "user-1".to_string(),
            iss: "https://idp.example.com/realms/helpdesk".to_string(),
            aud: vec!["helpdesk-backend".to_string()],
            exp: 1_700_000_000,
            nbf: None,
            iat: None,
            preferred_username: Some("alice".to_string()),
            email: None,
            realm_access: Some(RealmAccess {
                roles: vec!["user".to_string()],
            }),
        }
    }

    #[test]
    fn test_ack_uses_actor_and_roles() {
        let ack = TicketAck::new("list_tickets", &claims());

        assert_eq!(ack.operation, "list_tickets");
        assert_eq!(ack.actor, "alice");
        assert_eq!(ack.roles, vec!["user".to_string()]);
    }

    #[test]
    fn test_create_request_description_defaults_empty() {
        let request: CreateTicketRequest =
            serde_json::from_str(r#"{"title": "Printer on fire"}"#).unwrap();

        assert_eq!(request.title, "Printer on fire");
        assert!(request.description.is_empty());
    }
}
