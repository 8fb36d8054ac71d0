//! HTTP request handlers.
//!
//! Handlers receive verified [`crate::auth::TokenClaims`] via `Extension`
//! and never re-verify the token. Ticket storage and business rules live in
//! external collaborators; these handlers acknowledge the operation and echo
//! the acting principal.

pub mod admin;
pub mod me;
pub mod tickets;
