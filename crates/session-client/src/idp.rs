//! Identity provider endpoints consumed by the session controller.
//!
//! Three calls: a silent session check, a token refresh, and the logout
//! redirect URL. Check and refresh exchange an opaque bearer token; the
//! controller derives the validity window from the token itself.
//!
//! # Security
//!
//! - Tokens are stored as `SecretString` and never logged
//! - HTTP timeouts bound every call; a hung provider is a failed call

use crate::error::SessionError;
use common::secret::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::instrument;

/// Session state response from the provider's check and refresh endpoints.
#[derive(Deserialize)]
struct SessionEnvelope {
    /// Whether the provider still holds an active session.
    active: bool,

    /// Current bearer token, present when `active`.
    #[serde(default)]
    access_token: Option<String>,

    /// Advisory lifetime in seconds; the token's own `exp` is authoritative.
    #[allow(dead_code)]
    #[serde(default)]
    expires_in: Option<u64>,
}

impl fmt::Debug for SessionEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionEnvelope")
            .field("active", &self.active)
            .field("access_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// HTTP client for the identity provider's session endpoints.
pub struct IdpClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl IdpClient {
    /// Create a client with the given per-call timeout.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Configuration` if the HTTP client cannot be
    /// built.
    pub fn new(base_url: String, http_timeout: Duration) -> Result<Self, SessionError> {
        let http_client = reqwest::Client::builder()
            .timeout(http_timeout)
            .build()
            .map_err(|e| {
                SessionError::Configuration(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            base_url,
            http_client,
        })
    }

    /// Silently check for an existing provider session.
    ///
    /// Returns the current token when the provider reports an active
    /// session, `None` when there is none.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::SessionCheckFailed` on transport errors,
    /// timeouts, non-success statuses, and unreadable responses.
    #[instrument(skip_all)]
    pub async fn check_session(&self) -> Result<Option<SecretString>, SessionError> {
        let url = format!("{}/session/check", self.base_url);
        tracing::debug!(target: "session.idp", url = %url, "Silent session check");

        let envelope = self
            .post_for_envelope(&url, None)
            .await
            .map_err(SessionError::SessionCheckFailed)?;

        match (envelope.active, envelope.access_token) {
            (true, Some(token)) => Ok(Some(SecretString::from(token))),
            _ => {
                tracing::debug!(target: "session.idp", "No active provider session");
                Ok(None)
            }
        }
    }

    /// Exchange the current token for a fresh one.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::RefreshFailed` on transport errors, timeouts,
    /// non-success statuses, and when the provider reports the session gone.
    #[instrument(skip_all)]
    pub async fn refresh(&self, current: &SecretString) -> Result<SecretString, SessionError> {
        let url = format!("{}/session/refresh", self.base_url);
        tracing::debug!(target: "session.idp", url = %url, "Refreshing token");

        let envelope = self
            .post_for_envelope(&url, Some(current))
            .await
            .map_err(SessionError::RefreshFailed)?;

        match (envelope.active, envelope.access_token) {
            (true, Some(token)) => Ok(SecretString::from(token)),
            _ => Err(SessionError::RefreshFailed(
                "provider reports the session is gone".to_string(),
            )),
        }
    }

    /// Build the provider's logout redirect URL.
    #[must_use]
    pub fn logout_url(&self, post_logout_redirect: &str) -> String {
        let base = format!("{}/logout", self.base_url);
        match reqwest::Url::parse_with_params(
            &base,
            &[("post_logout_redirect_uri", post_logout_redirect)],
        ) {
            Ok(url) => url.to_string(),
            Err(e) => {
                tracing::warn!(target: "session.idp", error = %e, "Failed to build logout URL");
                base
            }
        }
    }

    async fn post_for_envelope(
        &self,
        url: &str,
        bearer: Option<&SecretString>,
    ) -> Result<SessionEnvelope, String> {
        let mut request = self.http_client.post(url);
        if let Some(token) = bearer {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await.map_err(|e| {
            tracing::debug!(target: "session.idp", error = %e, "Provider request failed");
            e.to_string()
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(target: "session.idp", status = %status, "Provider returned error");
            return Err(format!("provider returned {status}"));
        }

        response.json().await.map_err(|e| {
            tracing::debug!(target: "session.idp", error = %e, "Provider response unreadable");
            e.to_string()
        })
    }
}
