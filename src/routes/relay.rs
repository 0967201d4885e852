//! Relay WebSocket route configuration

use axum::{Router, middleware, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::relay::relay_handler;
use crate::middleware::connection_limit_middleware;
use crate::state::AppState;
use std::sync::Arc;

/// Create the relay WebSocket router
///
/// # Endpoint
///
/// `GET /ws` - WebSocket upgrade for the multimodal relay
///
/// # Example
///
/// ```json
/// // Client sends setup
/// {"voice": "Puck", "language_code": "en-US"}
///
/// // Client streams microphone audio
/// {"realtime_input": {"media_chunks": [{"mime_type": "audio/pcm", "data": "..."}]}}
///
/// // Server streams back audio, text and transcriptions
/// {"audio": "..."}
/// {"transcription": {"text": "Hello!", "sender": "Gemini", "finished": false}}
/// ```
pub fn create_relay_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/ws", get(relay_handler))
        .layer(middleware::from_fn_with_state(
            state,
            connection_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}
