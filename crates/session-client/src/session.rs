//! Session controller: the client-side token lifecycle state machine.
//!
//! One controller instance per application shell, created explicitly and
//! passed to consumers (no ambient singleton). The lifecycle:
//!
//! ```text
//! Uninitialized --init()--> Checking --+--> Authenticated
//!                                      +--> Unauthenticated
//! ```
//!
//! - `init` runs a silent session check; any failure or timeout recovers to
//!   `Unauthenticated`, never a fault.
//! - `bearer_token` refreshes transparently when remaining validity drops
//!   below the threshold; concurrent consumers await the single in-flight
//!   refresh instead of issuing parallel calls.
//! - Refresh failure resets the session (forced logout); explicit `logout`
//!   clears state and yields the provider's logout redirect URL.
//! - `teardown` cancels pending work; cancelled operations never mutate
//!   state afterwards.

use crate::claims::SessionClaims;
use crate::error::SessionError;
use crate::idp::IdpClient;
use common::secret::{ExposeSecret, SecretString};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Default refresh threshold: refresh when less than this much validity is
/// left before an outgoing use of the token.
pub const DEFAULT_REFRESH_THRESHOLD: Duration = Duration::from_secs(60);

/// Default HTTP timeout for session check and refresh calls; a call that
/// does not resolve within this window is treated as failure.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Session controller configuration.
#[derive(Clone)]
pub struct SessionConfig {
    /// Identity provider base URL (realm URL).
    pub idp_base_url: String,

    /// Where the provider should send the browser after logout.
    pub post_logout_redirect: String,

    /// Refresh the token when remaining validity drops below this.
    pub refresh_threshold: Duration,

    /// HTTP timeout for provider calls.
    pub http_timeout: Duration,
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("idp_base_url", &self.idp_base_url)
            .field("post_logout_redirect", &self.post_logout_redirect)
            .field("refresh_threshold", &self.refresh_threshold)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl SessionConfig {
    /// Create a configuration with default threshold and timeout.
    #[must_use]
    pub fn new(idp_base_url: String, post_logout_redirect: String) -> Self {
        Self {
            idp_base_url,
            post_logout_redirect,
            refresh_threshold: DEFAULT_REFRESH_THRESHOLD,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    /// Set the refresh threshold.
    #[must_use]
    pub fn with_refresh_threshold(mut self, threshold: Duration) -> Self {
        self.refresh_threshold = threshold;
        self
    }

    /// Set the HTTP timeout.
    #[must_use]
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }
}

/// Lifecycle states of the client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// `init` has not run yet.
    Uninitialized,

    /// The silent session check is in flight.
    Checking,

    /// A token and claims are present.
    Authenticated,

    /// No session; the shell should offer the public entry point.
    Unauthenticated,
}

/// The principal's profile, for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    /// Display username, if the provider includes one.
    pub preferred_username: Option<String>,

    /// Email address, if present.
    pub email: Option<String>,
}

/// Mutable session state; status transitions are the only path that touches
/// token and claims.
struct SessionState {
    status: SessionStatus,
    token: Option<SecretString>,
    claims: Option<SessionClaims>,
}

impl SessionState {
    fn reset_unauthenticated(&mut self) {
        self.status = SessionStatus::Unauthenticated;
        self.token = None;
        self.claims = None;
    }
}

/// Client-side session controller.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct SessionController {
    idp: IdpClient,
    refresh_threshold: Duration,
    post_logout_redirect: String,
    state: RwLock<SessionState>,

    /// Serializes refresh attempts: the first consumer past the expiry check
    /// performs the call, everyone else waits here and re-checks.
    refresh_guard: Mutex<()>,

    /// Cancelled on teardown; pending operations observe it and return
    /// without mutating state.
    cancel: CancellationToken,
}

impl SessionController {
    /// Create a controller in the `Uninitialized` state.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Configuration` if the HTTP client cannot be
    /// built.
    pub fn new(config: SessionConfig) -> Result<Self, SessionError> {
        let idp = IdpClient::new(config.idp_base_url, config.http_timeout)?;

        Ok(Self {
            idp,
            refresh_threshold: config.refresh_threshold,
            post_logout_redirect: config.post_logout_redirect,
            state: RwLock::new(SessionState {
                status: SessionStatus::Uninitialized,
                token: None,
                claims: None,
            }),
            refresh_guard: Mutex::new(()),
            cancel: CancellationToken::new(),
        })
    }

    /// Run the silent session check.
    ///
    /// Transitions `Uninitialized -> Checking`, then to `Authenticated` when
    /// the provider reports an active session, otherwise `Unauthenticated`.
    /// Calling `init` again after it completed is a no-op.
    #[instrument(skip_all)]
    pub async fn init(&self) {
        {
            let mut state = self.state.write().await;
            if state.status != SessionStatus::Uninitialized {
                tracing::debug!(target: "session.controller", "init called twice, ignoring");
                return;
            }
            state.status = SessionStatus::Checking;
        }

        let outcome = tokio::select! {
            () = self.cancel.cancelled() => {
                tracing::debug!(target: "session.controller", "Teardown during session check");
                return;
            }
            result = self.idp.check_session() => result,
        };

        match outcome {
            Ok(Some(token)) => match SessionClaims::parse_unverified(token.expose_secret()) {
                Ok(claims) => {
                    tracing::info!(
                        target: "session.controller",
                        roles = claims.roles.len(),
                        "Silent session check succeeded"
                    );
                    let mut state = self.state.write().await;
                    state.status = SessionStatus::Authenticated;
                    state.token = Some(token);
                    state.claims = Some(claims);
                }
                Err(e) => {
                    tracing::warn!(
                        target: "session.controller",
                        error = %e,
                        "Provider token unusable, treating as unauthenticated"
                    );
                    self.state.write().await.reset_unauthenticated();
                }
            },
            Ok(None) => {
                tracing::info!(target: "session.controller", "No existing provider session");
                self.state.write().await.reset_unauthenticated();
            }
            Err(e) => {
                // Recovered locally; the rendering layer only sees the state
                tracing::warn!(
                    target: "session.controller",
                    error = %e,
                    "Silent session check failed"
                );
                self.state.write().await.reset_unauthenticated();
            }
        }
    }

    /// Current lifecycle state.
    pub async fn status(&self) -> SessionStatus {
        self.state.read().await.status
    }

    /// The current bearer token, refreshing first when its remaining
    /// validity is below the threshold.
    ///
    /// Concurrent callers during a pending refresh await its result; exactly
    /// one provider call is made.
    ///
    /// # Errors
    ///
    /// - `SessionError::NotAuthenticated` - no session
    /// - `SessionError::RefreshFailed` - refresh failed; session was reset
    /// - `SessionError::Cancelled` - controller torn down mid-refresh
    #[instrument(skip_all)]
    pub async fn bearer_token(&self) -> Result<SecretString, SessionError> {
        if self.needs_refresh().await? {
            let _guard = self.refresh_guard.lock().await;

            // A refresh that completed while this consumer waited for the
            // guard already replaced the token.
            if self.needs_refresh().await? {
                self.refresh_holding_guard().await?;
            }
        }

        let state = self.state.read().await;
        state.token.clone().ok_or(SessionError::NotAuthenticated)
    }

    /// Whether the current token's remaining validity is below the
    /// refresh threshold.
    async fn needs_refresh(&self) -> Result<bool, SessionError> {
        let state = self.state.read().await;
        if state.status != SessionStatus::Authenticated {
            return Err(SessionError::NotAuthenticated);
        }
        let claims = state.claims.as_ref().ok_or(SessionError::NotAuthenticated)?;

        let now = chrono::Utc::now().timestamp();
        #[allow(clippy::cast_possible_wrap)]
        let threshold = self.refresh_threshold.as_secs() as i64;
        Ok(claims.remaining_at(now) < threshold)
    }

    /// Perform the refresh call. Caller must hold `refresh_guard`.
    async fn refresh_holding_guard(&self) -> Result<(), SessionError> {
        let current = {
            let state = self.state.read().await;
            state.token.clone().ok_or(SessionError::NotAuthenticated)?
        };

        let outcome = tokio::select! {
            () = self.cancel.cancelled() => {
                tracing::debug!(target: "session.controller", "Teardown during refresh");
                return Err(SessionError::Cancelled);
            }
            result = self.idp.refresh(&current) => result,
        };

        match outcome {
            Ok(token) => {
                let claims = SessionClaims::parse_unverified(token.expose_secret()).map_err(|e| {
                    tracing::warn!(
                        target: "session.controller",
                        error = %e,
                        "Refreshed token unusable, forcing logout"
                    );
                    SessionError::RefreshFailed("provider returned an unreadable token".to_string())
                });

                match claims {
                    Ok(claims) => {
                        tracing::debug!(target: "session.controller", "Token refreshed");
                        let mut state = self.state.write().await;
                        state.token = Some(token);
                        state.claims = Some(claims);
                        Ok(())
                    }
                    Err(e) => {
                        self.state.write().await.reset_unauthenticated();
                        Err(e)
                    }
                }
            }
            Err(e) => {
                // Equivalent to a forced logout
                tracing::warn!(
                    target: "session.controller",
                    error = %e,
                    "Token refresh failed, resetting session"
                );
                self.state.write().await.reset_unauthenticated();
                Err(e)
            }
        }
    }

    /// Role names of the current session; empty when not authenticated.
    pub async fn roles(&self) -> HashSet<String> {
        let state = self.state.read().await;
        state
            .claims
            .as_ref()
            .map(|c| c.roles.clone())
            .unwrap_or_default()
    }

    /// Whether the current session holds a role. O(1) over current claims.
    pub async fn has_role(&self, role: &str) -> bool {
        let state = self.state.read().await;
        state
            .claims
            .as_ref()
            .is_some_and(|c| c.roles.contains(role))
    }

    /// The principal's profile, when authenticated.
    pub async fn profile(&self) -> Option<Profile> {
        let state = self.state.read().await;
        state.claims.as_ref().map(|c| Profile {
            preferred_username: c.preferred_username.clone(),
            email: c.email.clone(),
        })
    }

    /// Explicit logout: clears local state and returns the provider's
    /// logout redirect URL for the shell to navigate to.
    #[instrument(skip_all)]
    pub async fn logout(&self) -> String {
        self.state.write().await.reset_unauthenticated();
        tracing::info!(target: "session.controller", "Logged out");
        self.idp.logout_url(&self.post_logout_redirect)
    }

    /// Cancel pending checks and refreshes. Cancelled operations return
    /// without mutating state; the controller is then inert.
    pub fn teardown(&self) {
        tracing::debug!(target: "session.controller", "Session controller teardown");
        self.cancel.cancel();
    }
}
