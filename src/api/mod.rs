//! API layer for the traffic logger.
//!
//! Every path is proxied to the upstream except `GET /health` and `OPTIONS`
//! preflights, which are answered locally.

pub mod handlers;
pub mod proxy;
pub mod upstream;

use axum::routing::{get, options, MethodRouter};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

// Re-export commonly used types
pub use handlers::{health, preflight, AppState, HealthResponse};
pub use proxy::proxy_request;
pub use upstream::{create_http_client, send_upstream, UpstreamReply};

/// OPTIONS answered locally, every other method forwarded.
fn passthrough() -> MethodRouter<Arc<AppState>> {
    options(preflight).fallback(proxy_request)
}

/// Build the router with all endpoints.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/health",
            get(health).options(preflight).fallback(proxy_request),
        )
        .route("/", passthrough())
        .route("/*path", passthrough())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
