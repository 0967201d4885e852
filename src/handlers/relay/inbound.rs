//! Client to upstream forwarding.
//!
//! Reads client frames in order and forwards every accepted chunk to the
//! upstream session in the same order. Malformed frames, unsupported media
//! and failed sends are logged and skipped; only the client transport ending
//! stops the loop.

use std::fmt::Display;
use std::sync::Arc;

use axum::extract::ws::Message;
use futures::{Stream, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::realtime::{RealtimeInput, UpstreamSender};

use super::messages::ClientMessage;

/// Why the inbound loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundExit {
    /// Client sent a close frame or the stream ended
    ClientClosed,
    /// Client transport failed
    ClientError(String),
}

/// Forward client frames until the client goes away.
pub async fn run<S, E>(
    mut incoming: S,
    upstream: Arc<dyn UpstreamSender>,
    session_id: Uuid,
) -> InboundExit
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    while let Some(msg) = incoming.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                forward_frame(text.as_str(), upstream.as_ref(), session_id).await;
            }
            Ok(Message::Binary(data)) => {
                debug!(%session_id, len = data.len(), "Ignoring binary frame from client");
            }
            Ok(Message::Close(_)) => {
                info!(%session_id, "Client sent close frame");
                return InboundExit::ClientClosed;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(%session_id, "Client WebSocket error: {}", e);
                return InboundExit::ClientError(e.to_string());
            }
        }
    }

    InboundExit::ClientClosed
}

/// Parse one text frame and forward its contents.
async fn forward_frame(text: &str, upstream: &dyn UpstreamSender, session_id: Uuid) {
    match ClientMessage::parse(text) {
        Ok(Some(message)) => forward_message(message, upstream, session_id).await,
        Ok(None) => debug!(%session_id, "Client message carried no input"),
        Err(e) => warn!(%session_id, "Failed to parse client message: {}", e),
    }
}

/// Forward a parsed client message.
pub async fn forward_message(message: ClientMessage, upstream: &dyn UpstreamSender, session_id: Uuid) {
    match message {
        ClientMessage::RealtimeInput(chunks) => {
            for chunk in chunks {
                let Some(kind) = chunk.kind() else {
                    debug!(%session_id, mime_type = %chunk.mime_type, "Dropping unsupported media chunk");
                    continue;
                };
                if let Err(e) = upstream.send(RealtimeInput::Media(chunk)).await {
                    warn!(%session_id, %kind, "Failed to forward media chunk: {}", e);
                }
            }
        }
        ClientMessage::TextInput(text) => {
            if let Err(e) = upstream.send(RealtimeInput::Text(text)).await {
                warn!(%session_id, "Failed to forward text input: {}", e);
            }
        }
    }
}
