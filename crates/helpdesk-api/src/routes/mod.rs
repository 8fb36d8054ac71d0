//! HTTP routes for the helpdesk API.
//!
//! Defines the Axum router, the application state, and the static role rules
//! for every protected route.

use crate::auth::{KeyResolver, TokenVerifier};
use crate::config::Config;
use crate::handlers::{admin, me, tickets};
use crate::middleware::auth::{authenticate, require_roles, AuthState, RouteRule};
use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::{routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across the service.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Token verifier backing the authentication middleware.
    pub verifier: Arc<TokenVerifier>,
}

impl AppState {
    /// Wire the key resolver and token verifier from configuration.
    #[must_use]
    pub fn from_config(config: Config) -> Self {
        let resolver = Arc::new(KeyResolver::with_limits(
            config.jwks_url.clone(),
            Duration::from_secs(config.jwks_cache_ttl_seconds),
            config.jwks_fetches_per_minute,
            config.jwks_max_keys,
        ));
        let verifier = Arc::new(TokenVerifier::new(
            resolver,
            config.issuer.clone(),
            config.audience.clone(),
            config.allowed_algorithm,
            config.clock_skew_seconds,
        ));

        Self { config, verifier }
    }
}

/// Static role requirements per protected route.
///
/// `/api/me` carries an empty role list: any authenticated caller.
pub const ROUTE_RULES: &[RouteRule] = &[
    RouteRule {
        method: "GET",
        path: "/api/tickets",
        allowed_roles: &["user", "admin", "manager"],
    },
    RouteRule {
        method: "POST",
        path: "/api/tickets",
        allowed_roles: &["user"],
    },
    RouteRule {
        method: "GET",
        path: "/api/tickets/my",
        allowed_roles: &["user"],
    },
    RouteRule {
        method: "GET",
        path: "/api/admin/data",
        allowed_roles: &["admin"],
    },
    RouteRule {
        method: "GET",
        path: "/api/user/info",
        allowed_roles: &["admin"],
    },
    RouteRule {
        method: "GET",
        path: "/api/me",
        allowed_roles: &[],
    },
];

/// Build the application routes.
///
/// Every route below is protected: `authenticate` runs first, then
/// `require_roles` consults [`ROUTE_RULES`] for the matched path. Unprotected
/// content (health, static assets) is served by external collaborators.
///
/// Layer order (outermost first): trace, timeout, authenticate, role check.
pub fn build_routes(state: &Arc<AppState>) -> Router {
    let auth_state = Arc::new(AuthState {
        verifier: Arc::clone(&state.verifier),
    });

    Router::new()
        .route(
            "/api/tickets",
            get(tickets::list_tickets).post(tickets::create_ticket),
        )
        .route("/api/tickets/my", get(tickets::my_tickets))
        .route("/api/admin/data", get(admin::admin_data))
        .route("/api/user/info", get(admin::user_info))
        .route("/api/me", get(me::current_user))
        .route_layer(middleware::from_fn(|req: Request, next: Next| {
            require_roles(ROUTE_RULES, req, next)
        }))
        .route_layer(middleware::from_fn_with_state(auth_state, authenticate))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
}
