//! Helpdesk API error types.
//!
//! All errors map to appropriate HTTP status codes via the `IntoResponse`
//! impl. Messages returned to clients are intentionally generic to avoid
//! leaking internal detail; actual errors are logged server-side.

use crate::auth::AuthError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Helpdesk API error type.
///
/// Maps to HTTP status codes:
/// - Unauthenticated, TokenRejected: 401 Unauthorized
/// - TokenRejected(KeyFetchError): 503 Service Unavailable (degraded, the
///   service cannot verify tokens right now)
/// - RoleMismatch: 403 Forbidden
/// - Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication required: {0}")]
    Unauthenticated(String),

    #[error("Token rejected: {0}")]
    TokenRejected(#[from] AuthError),

    #[error("Insufficient role")]
    RoleMismatch {
        required: Vec<String>,
        actual: Vec<String>,
    },

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::Unauthenticated(_) => 401,
            ApiError::TokenRejected(AuthError::KeyFetchError(_)) => 503,
            ApiError::TokenRejected(_) => 401,
            ApiError::RoleMismatch { .. } => 403,
            ApiError::Internal => 500,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,

    /// Hint for requests missing the bearer header entirely.
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,

    /// The token's expiry (Unix epoch seconds) when it was rejected as expired.
    #[serde(skip_serializing_if = "Option::is_none")]
    expired_at: Option<i64>,

    /// Roles the route requires, on a 403.
    #[serde(skip_serializing_if = "Option::is_none")]
    required_roles: Option<Vec<String>>,

    /// Roles the caller actually holds, on a 403.
    #[serde(skip_serializing_if = "Option::is_none")]
    your_roles: Option<Vec<String>>,
}

impl ErrorDetail {
    fn new(code: &str, message: String) -> Self {
        Self {
            code: code.to_string(),
            message,
            hint: None,
            expired_at: None,
            required_roles: None,
            your_roles: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::Unauthenticated(reason) => {
                let mut detail = ErrorDetail::new("UNAUTHENTICATED", reason);
                detail.hint = Some("Use header: Authorization: Bearer <token>".to_string());
                (StatusCode::UNAUTHORIZED, detail)
            }
            ApiError::TokenRejected(AuthError::KeyFetchError(reason)) => {
                // Log the actual reason server-side, keep the client generic
                tracing::warn!(
                    target: "helpdesk.availability",
                    reason = %reason,
                    "Token verification degraded: key fetch failed"
                );
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorDetail::new(
                        "VERIFICATION_UNAVAILABLE",
                        "Cannot verify tokens right now".to_string(),
                    ),
                )
            }
            ApiError::TokenRejected(AuthError::Expired { expired_at }) => {
                let mut detail =
                    ErrorDetail::new("TOKEN_EXPIRED", "Token has expired".to_string());
                detail.expired_at = Some(expired_at);
                (StatusCode::UNAUTHORIZED, detail)
            }
            ApiError::TokenRejected(err) => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("INVALID_TOKEN", err.to_string()),
            ),
            ApiError::RoleMismatch { required, actual } => {
                let mut detail = ErrorDetail::new(
                    "FORBIDDEN",
                    "You do not have access to this resource".to_string(),
                );
                detail.required_roles = Some(required);
                detail.your_roles = Some(actual);
                (StatusCode::FORBIDDEN, detail)
            }
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", "An internal error occurred".to_string()),
            ),
        };

        let mut response = (status, Json(ErrorResponse { error: detail })).into_response();

        // Add WWW-Authenticate header for 401 responses
        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) =
                "Bearer realm=\"helpdesk-api\", error=\"invalid_token\"".parse()
            {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}
