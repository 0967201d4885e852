use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::ServerConfig;
use crate::state::AppState;

pub mod api;
pub mod relay;

/// Combine all routes into the application router.
///
/// Callers serving real traffic must use
/// `into_make_service_with_connect_info::<SocketAddr>()`; the relay route
/// reads the peer address.
pub fn create_app(state: Arc<AppState>) -> Router {
    // Security headers
    let security_headers = tower::ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            http::header::X_CONTENT_TYPE_OPTIONS,
            http::HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            http::header::X_FRAME_OPTIONS,
            http::HeaderValue::from_static("DENY"),
        ));

    api::create_api_router()
        .merge(relay::create_relay_router(state.clone()))
        .with_state(state)
        .layer(security_headers)
}

/// Bind the server listener. `host` may be an IP address or a hostname.
pub async fn bind(config: &ServerConfig) -> std::io::Result<TcpListener> {
    TcpListener::bind(config.address()).await
}
