//! HTTP routes for Room Controller.
//!
//! Defines the Axum router and application state.

use crate::auth::IdentityResolver;
use crate::config::Config;
use crate::handlers::{self, HealthState};
use crate::middleware::require_identity;
use crate::network::NetworkHandler;
use crate::recording::RecordingClient;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// HTTP request timeout (WebSocket sessions are exempt once upgraded).
pub const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Session token verification and minting.
    pub identity: Arc<IdentityResolver>,

    /// Topology selected at startup.
    pub network: Arc<dyn NetworkHandler>,

    /// Recording backend client used by the join proxy.
    pub recording: RecordingClient,

    /// Liveness and readiness.
    pub health: Arc<HealthState>,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/ws` - Signaling socket (403 without a valid session cookie)
/// - `/call`, `/call/:call_id` - Call allocation and bootstrap
/// - `/api/sessions/:room/join/:user` - Recording join proxy
/// - `/probes/liveness`, `/probes/health` - Health probes
/// - TraceLayer for request logging
/// - 30 second request timeout on plain HTTP routes
pub fn build_routes(state: Arc<AppState>) -> Router {
    // Identity is enforced before the upgrade
    let socket_routes = Router::new()
        .route("/ws", get(handlers::ws_handler))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state.identity),
            require_identity,
        ))
        .with_state(Arc::clone(&state));

    let http_routes = Router::new()
        .route("/call", post(handlers::new_call))
        .route("/call/:call_id", get(handlers::get_call))
        .route(
            "/api/sessions/:room/join/:user",
            post(handlers::join_recording),
        )
        .route("/probes/liveness", get(handlers::liveness_handler))
        .route("/probes/health", get(handlers::health_handler))
        .with_state(state)
        .layer(TimeoutLayer::new(HTTP_REQUEST_TIMEOUT));

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout plain HTTP requests (innermost)
    // 2. TraceLayer - Log request details
    socket_routes
        .merge(http_routes)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    #[test]
    fn test_config_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<Config>();
    }
}
