//! Connection limit middleware for WebSocket connections
//!
//! Rejects WebSocket upgrades early with 503 when the connection registry is
//! full. The handler still registers atomically, so this is only the fast
//! path.
//!
//! # Example
//!
//! ```ignore
//! use axum::Router;
//! use askademia_gateway::middleware::connection_limit_middleware;
//!
//! let app = Router::new()
//!     .route("/ws", get(relay_handler))
//!     .layer(axum::middleware::from_fn_with_state(
//!         state.clone(),
//!         connection_limit_middleware,
//!     ));
//! ```

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::state::AppState;

/// Whether the request asks for a WebSocket upgrade.
pub fn is_websocket_upgrade(request: &Request<Body>) -> bool {
    request
        .headers()
        .get("upgrade")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false)
}

/// Middleware that enforces the global WebSocket connection limit.
///
/// Non-WebSocket requests pass through without limit checks.
pub async fn connection_limit_middleware(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !is_websocket_upgrade(&request) {
        return next.run(request).await;
    }

    if !state.registry.has_capacity() {
        tracing::warn!(
            client = %addr,
            active = state.registry.len(),
            "Rejecting connection: global limit reached"
        );
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            "Server at capacity. Please try again later.",
        )
            .into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_websocket_upgrade() {
        let request = Request::builder()
            .uri("/ws")
            .header("Upgrade", "WebSocket")
            .body(Body::empty())
            .unwrap();
        assert!(is_websocket_upgrade(&request));

        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        assert!(!is_websocket_upgrade(&request));

        let request = Request::builder()
            .uri("/")
            .header("Upgrade", "h2c")
            .body(Body::empty())
            .unwrap();
        assert!(!is_websocket_upgrade(&request));
    }
}
