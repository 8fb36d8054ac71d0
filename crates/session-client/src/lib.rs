//! Client-side session management for the helpdesk frontend shell.
//!
//! Owns the browser-side token lifecycle: a silent session check at startup,
//! transparent refresh before expiry (serialized across concurrent
//! consumers), role queries, logout, and a declarative route guard.
//!
//! # Modules
//!
//! - `claims` - Unverified claim parsing for display and role hints
//! - `error` - Client error types
//! - `idp` - Identity provider endpoints (check, refresh, logout)
//! - `protector` - Route guard decisions
//! - `session` - The session controller state machine

pub mod claims;
pub mod error;
pub mod idp;
pub mod protector;
pub mod session;

pub use claims::SessionClaims;
pub use error::SessionError;
pub use protector::{RouteDecision, RouteProtector, RouteRule};
pub use session::{Profile, SessionConfig, SessionController, SessionStatus};
