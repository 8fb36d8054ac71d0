//! Structured audit entries for authorization denials.
//!
//! Entries are tracing events on the `helpdesk.audit` target with
//! `{actor, outcome}` fields; the subscriber supplies timestamp and level.
//! The sink (file shipper, collector) is an external collaborator and the
//! emission is fire-and-forget.

/// Record a denied request.
///
/// `actor` is the display name of the principal when one is known;
/// unauthenticated requests record as `"anonymous"`.
pub fn record_denial(actor: Option<&str>, outcome: &str, message: &str) {
    tracing::warn!(
        target: "helpdesk.audit",
        actor = actor.unwrap_or("anonymous"),
        outcome = outcome,
        "{message}"
    );
}
