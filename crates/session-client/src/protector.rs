//! Declarative route guard.
//!
//! Maps the session state and a route's role rule to a rendering decision:
//! loading placeholder, redirect to the public entry point, access denied
//! (listing required vs. actual roles), or the protected view.

use crate::session::{SessionController, SessionStatus};
use std::collections::HashSet;
use std::sync::Arc;

/// Allowed roles for one protected view.
///
/// An empty role set admits any authenticated user.
#[derive(Debug, Clone, Default)]
pub struct RouteRule {
    /// Role names of which the session must hold at least one.
    pub allowed_roles: HashSet<String>,
}

impl RouteRule {
    /// Rule requiring one of the given roles.
    #[must_use]
    pub fn requiring(roles: &[&str]) -> Self {
        Self {
            allowed_roles: roles.iter().map(ToString::to_string).collect(),
        }
    }

    /// Rule admitting any authenticated user.
    #[must_use]
    pub fn authenticated_only() -> Self {
        Self::default()
    }
}

/// What the shell should render for a guarded route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Session state unknown yet; render a loading placeholder.
    Loading,

    /// No session; navigate to the public entry point.
    RedirectToEntry,

    /// Authenticated but no overlapping role; render access denied.
    Denied {
        /// Roles the route requires.
        required: Vec<String>,

        /// Roles the session actually holds.
        actual: Vec<String>,
    },

    /// Render the protected view.
    Allow,
}

/// Route guard bound to one session controller.
#[derive(Clone)]
pub struct RouteProtector {
    session: Arc<SessionController>,
}

impl RouteProtector {
    /// Create a guard over the given session controller.
    #[must_use]
    pub fn new(session: Arc<SessionController>) -> Self {
        Self { session }
    }

    /// Decide what to render for a route guarded by `rule`.
    pub async fn decide(&self, rule: &RouteRule) -> RouteDecision {
        match self.session.status().await {
            SessionStatus::Uninitialized | SessionStatus::Checking => RouteDecision::Loading,
            SessionStatus::Unauthenticated => RouteDecision::RedirectToEntry,
            SessionStatus::Authenticated => {
                let held = self.session.roles().await;
                if rule.allowed_roles.is_empty()
                    || rule.allowed_roles.iter().any(|r| held.contains(r))
                {
                    RouteDecision::Allow
                } else {
                    let mut required: Vec<String> =
                        rule.allowed_roles.iter().cloned().collect();
                    required.sort();
                    let mut actual: Vec<String> = held.into_iter().collect();
                    actual.sort();
                    RouteDecision::Denied { required, actual }
                }
            }
        }
    }
}
