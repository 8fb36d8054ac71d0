//! Helpdesk API Service Library
//!
//! Secures the multi-role helpdesk service:
//!
//! - Bearer token verification against the identity provider's JWKS keys
//! - Read-through signing key cache with single-flight, rate-limited fetches
//! - Role-based authorization per route with audit entries on denial
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> middleware/auth.rs -> auth/{jwks,verifier}.rs -> handlers/*.rs
//! ```
//!
//! # Modules
//!
//! - `audit` - Structured denial audit entries
//! - `auth` - Key resolver, token verifier, verified claims
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Authentication and role-check pipeline stages
//! - `routes` - Axum router setup and the static route rule table

pub mod audit;
pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod routes;
