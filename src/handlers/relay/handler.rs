//! Relay WebSocket handler
//!
//! Upgrades the client connection, registers it, and hands the socket to a
//! [`RelaySession`]. The socket's write half is owned by a sender task that
//! drains [`RelayMessageRoute`]s; a heartbeat task pings the client and
//! cancels the session when the client stops answering.

use axum::{
    extract::{
        ConnectInfo, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::core::registry::ConnectionGuard;
use crate::state::AppState;

use super::messages::RelayMessageRoute;
use super::session::RelaySession;

/// Optimized channel buffer size for audio workloads
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Maximum WebSocket frame size (10 MB)
const MAX_WS_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Maximum WebSocket message size (10 MB)
const MAX_WS_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Time allowed for the sender task to flush the close frame
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Relay WebSocket handler
///
/// Registers the connection before upgrading so over-capacity clients get a
/// plain 503 instead of an upgraded socket that is closed immediately.
pub async fn relay_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Response {
    let guard = match state.registry.register(Some(addr)) {
        Ok(guard) => guard,
        Err(e) => {
            warn!(client = %addr, "Rejecting relay connection: {}", e);
            return (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response();
        }
    };

    info!(
        session_id = %guard.id(),
        client = %addr,
        "Relay WebSocket connection upgrade requested"
    );

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_relay_socket(socket, state, guard, addr))
}

/// Handle the relay WebSocket connection
async fn handle_relay_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    guard: ConnectionGuard,
    addr: SocketAddr,
) {
    let session_id = guard.id();
    info!(%session_id, client = %addr, "Relay WebSocket connection established");

    let (mut sender, receiver) = socket.split();
    let (message_tx, mut message_rx) = mpsc::channel::<RelayMessageRoute>(CHANNEL_BUFFER_SIZE);

    // Sender task for outgoing messages
    let mut sender_task = tokio::spawn(async move {
        while let Some(route) = message_rx.recv().await {
            let should_close = matches!(route, RelayMessageRoute::Close);

            let result = match route {
                RelayMessageRoute::Outgoing(message) => match serde_json::to_string(&message) {
                    Ok(json_str) => sender.send(Message::Text(json_str.into())).await,
                    Err(e) => {
                        error!("Failed to serialize outgoing message: {}", e);
                        continue;
                    }
                },
                RelayMessageRoute::Ping(payload) => sender.send(Message::Ping(payload)).await,
                RelayMessageRoute::Close => {
                    debug!("Closing relay WebSocket connection");
                    sender.send(Message::Close(None)).await
                }
            };

            if let Err(e) = result {
                debug!("Failed to send WebSocket message: {}", e);
                break;
            }

            if should_close {
                break;
            }
        }
    });

    // Any inbound frame, including pongs, counts as liveness.
    let last_seen = Arc::new(Mutex::new(Instant::now()));
    let incoming = {
        let last_seen = last_seen.clone();
        receiver.inspect(move |_| *last_seen.lock() = Instant::now())
    };

    let shutdown = guard.shutdown_token();
    let heartbeat_task = tokio::spawn(heartbeat(
        message_tx.clone(),
        last_seen,
        state.config.keepalive_interval(),
        state.config.keepalive_timeout(),
        shutdown.clone(),
        session_id,
    ));

    let session = RelaySession::new(
        session_id,
        state.connector.clone(),
        state.session_store.clone(),
        state.session_defaults(),
        shutdown,
    );
    let end = session.run(incoming, message_tx).await;

    heartbeat_task.abort();
    let _ = heartbeat_task.await;

    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut sender_task)
        .await
        .is_err()
    {
        sender_task.abort();
    }

    drop(guard);
    info!(
        %session_id,
        client = %addr,
        reason = %end,
        active = state.registry.len(),
        "Relay WebSocket connection closed"
    );
}

/// Ping the client every `interval`; cancel the session once nothing has
/// been received for `interval + timeout`.
async fn heartbeat(
    tx: mpsc::Sender<RelayMessageRoute>,
    last_seen: Arc<Mutex<Instant>>,
    interval: Duration,
    timeout: Duration,
    shutdown: CancellationToken,
    session_id: Uuid,
) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let silent_for = last_seen.lock().elapsed();
                if silent_for > interval + timeout {
                    warn!(%session_id, ?silent_for, "Client stopped responding to keepalive pings");
                    shutdown.cancel();
                    break;
                }
                if tx.send(RelayMessageRoute::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
        }
    }
}
