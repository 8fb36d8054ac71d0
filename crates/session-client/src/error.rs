//! Client error types.
//!
//! Session failures are recovered locally by transitioning the session to
//! `Unauthenticated`; these errors exist so callers can tell why a token is
//! not available, not to surface faults to the rendering layer.

use thiserror::Error;

/// Errors produced by the session controller and identity provider client.
#[derive(Error, Debug, Clone)]
pub enum SessionError {
    /// The silent session check did not complete.
    #[error("Session check failed: {0}")]
    SessionCheckFailed(String),

    /// A token refresh did not complete; the session has been reset.
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    /// No authenticated session is present.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The operation was aborted by teardown; session state is untouched.
    #[error("Session controller is shut down")]
    Cancelled,

    /// The controller could not be constructed.
    #[error("Configuration error: {0}")]
    Configuration(String),
}
