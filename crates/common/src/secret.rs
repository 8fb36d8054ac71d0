//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports from the [`secrecy`] crate. Use these types for all sensitive
//! values: bearer tokens, identity-provider client secrets, and anything else
//! that must never appear in logs.
//!
//! `SecretString` implements `Debug` with redaction, so any struct that
//! derives `Debug` while holding a secret gets safe logging behavior for
//! free, and the inner value is zeroized on drop. Reading the value requires
//! an explicit `expose_secret()` call.
//!
//! ```rust
//! use common::secret::SecretString;
//! use secrecy::ExposeSecret;
//!
//! #[derive(Debug)]
//! struct Session {
//!     user: String,
//!     token: SecretString, // Debug shows "[REDACTED]"
//! }
//!
//! let session = Session {
//!     user: "alice".to_string(),
//!     token: SecretString::from("eyJhbGciOi..."),
//! };
//!
//! // Safe: the token is redacted
//! println!("{:?}", session);
//!
//! // Explicit opt-in to read the value
//! let header = format!("Bearer {}", session.token.expose_secret());
//! ```

// Re-export the main types from secrecy
pub use secrecy::{ExposeSecret, SecretBox, SecretString};
