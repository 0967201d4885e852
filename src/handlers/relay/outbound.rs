//! Upstream to client forwarding.
//!
//! Consumes the upstream event sequence and emits client notifications in
//! event order. Resumption handles are persisted here as they arrive.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::realtime::{ModelTurnPart, RealtimeError, UpstreamEvent, UpstreamEvents};
use crate::core::session_store::SessionHandleStore;

use super::messages::{ClientNotification, RelayMessageRoute, TranscriptSender};

/// Why the outbound loop stopped.
#[derive(Debug)]
pub enum OutboundExit {
    /// Upstream ended its event sequence
    UpstreamClosed,
    /// Upstream transport failed
    UpstreamError(RealtimeError),
    /// The client writer is gone
    ClientGone,
}

/// Map one upstream event to the notification the client should see.
pub fn notification_for(event: &UpstreamEvent) -> Option<ClientNotification> {
    match event {
        UpstreamEvent::Interrupted => Some(ClientNotification::interrupted()),
        UpstreamEvent::OutputTranscription { text, finished } => Some(
            ClientNotification::transcription(text.clone(), TranscriptSender::Gemini, *finished),
        ),
        UpstreamEvent::InputTranscription { text, finished } => Some(
            ClientNotification::transcription(text.clone(), TranscriptSender::User, *finished),
        ),
        UpstreamEvent::ModelTurnPart(ModelTurnPart::Text(text)) => {
            Some(ClientNotification::Text(text.clone()))
        }
        UpstreamEvent::ModelTurnPart(ModelTurnPart::Audio(data)) => {
            Some(ClientNotification::audio(data))
        }
        UpstreamEvent::TurnComplete => Some(ClientNotification::end_of_turn()),
        UpstreamEvent::UsageMetadata { .. }
        | UpstreamEvent::SessionResumptionUpdate { .. }
        | UpstreamEvent::GoAway { .. } => None,
    }
}

/// Forward upstream events until either side goes away.
pub async fn run(
    mut events: UpstreamEvents,
    outgoing: mpsc::Sender<RelayMessageRoute>,
    store: Arc<SessionHandleStore>,
    session_id: Uuid,
) -> OutboundExit {
    while let Some(item) = events.next().await {
        let event = match item {
            Ok(event) => event,
            Err(e) => {
                warn!(%session_id, "Upstream session failed: {}", e);
                return OutboundExit::UpstreamError(e);
            }
        };

        match &event {
            UpstreamEvent::Interrupted => debug!(%session_id, "Model output interrupted"),
            UpstreamEvent::UsageMetadata { total_token_count } => {
                info!(%session_id, "Used {} tokens in total.", total_token_count);
            }
            UpstreamEvent::SessionResumptionUpdate {
                resumable: true,
                new_handle: Some(handle),
            } if !handle.is_empty() => match store.save(handle).await {
                Ok(()) => info!(%session_id, "Stored new session resumption handle"),
                Err(e) => warn!(%session_id, "Failed to persist session handle: {}", e),
            },
            UpstreamEvent::GoAway { time_left } => {
                warn!(%session_id, time_left = ?time_left, "Upstream will disconnect soon");
            }
            UpstreamEvent::TurnComplete => debug!(%session_id, "Model turn complete"),
            _ => {}
        }

        if let Some(notification) = notification_for(&event)
            && outgoing
                .send(RelayMessageRoute::Outgoing(notification))
                .await
                .is_err()
        {
            debug!(%session_id, "Client writer closed, stopping outbound relay");
            return OutboundExit::ClientGone;
        }
    }

    info!(%session_id, "Upstream session ended");
    OutboundExit::UpstreamClosed
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tempfile::TempDir;

    fn events_from(items: Vec<Result<UpstreamEvent, RealtimeError>>) -> UpstreamEvents {
        Box::pin(futures::stream::iter(items))
    }

    fn drain(rx: &mut mpsc::Receiver<RelayMessageRoute>) -> Vec<ClientNotification> {
        let mut out = Vec::new();
        while let Ok(route) = rx.try_recv() {
            if let RelayMessageRoute::Outgoing(n) = route {
                out.push(n);
            }
        }
        out
    }

    #[test]
    fn test_notification_mapping() {
        assert_eq!(
            notification_for(&UpstreamEvent::Interrupted),
            Some(ClientNotification::interrupted())
        );
        assert_eq!(
            notification_for(&UpstreamEvent::InputTranscription {
                text: "hi".to_string(),
                finished: true
            }),
            Some(ClientNotification::transcription(
                "hi",
                TranscriptSender::User,
                true
            ))
        );
        assert_eq!(
            notification_for(&UpstreamEvent::ModelTurnPart(ModelTurnPart::Audio(
                Bytes::from_static(&[0x41, 0x42])
            ))),
            Some(ClientNotification::Audio("QUI=".to_string()))
        );
        assert_eq!(
            notification_for(&UpstreamEvent::TurnComplete),
            Some(ClientNotification::end_of_turn())
        );
        assert_eq!(
            notification_for(&UpstreamEvent::UsageMetadata {
                total_token_count: 5
            }),
            None
        );
        assert_eq!(
            notification_for(&UpstreamEvent::GoAway { time_left: None }),
            None
        );
    }

    #[tokio::test]
    async fn test_run_preserves_order_and_persists_handle() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SessionHandleStore::open(dir.path().join("h.json")));
        let (tx, mut rx) = mpsc::channel(16);

        let events = events_from(vec![
            Ok(UpstreamEvent::OutputTranscription {
                text: "a".to_string(),
                finished: false,
            }),
            Ok(UpstreamEvent::SessionResumptionUpdate {
                resumable: true,
                new_handle: Some("H".to_string()),
            }),
            Ok(UpstreamEvent::ModelTurnPart(ModelTurnPart::Text(
                "b".to_string(),
            ))),
            Ok(UpstreamEvent::TurnComplete),
        ]);

        let exit = run(events, tx, store.clone(), Uuid::new_v4()).await;
        assert!(matches!(exit, OutboundExit::UpstreamClosed));
        assert_eq!(store.current().as_deref(), Some("H"));

        assert_eq!(
            drain(&mut rx),
            vec![
                ClientNotification::transcription("a", TranscriptSender::Gemini, false),
                ClientNotification::Text("b".to_string()),
                ClientNotification::end_of_turn(),
            ]
        );
    }

    #[tokio::test]
    async fn test_non_resumable_or_empty_handles_are_not_persisted() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SessionHandleStore::open(dir.path().join("h.json")));
        let (tx, _rx) = mpsc::channel(16);

        let events = events_from(vec![
            Ok(UpstreamEvent::SessionResumptionUpdate {
                resumable: false,
                new_handle: Some("nope".to_string()),
            }),
            Ok(UpstreamEvent::SessionResumptionUpdate {
                resumable: true,
                new_handle: Some(String::new()),
            }),
            Ok(UpstreamEvent::SessionResumptionUpdate {
                resumable: true,
                new_handle: None,
            }),
        ]);

        run(events, tx, store.clone(), Uuid::new_v4()).await;
        assert!(store.current().is_none());
    }

    #[tokio::test]
    async fn test_upstream_error_ends_run() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SessionHandleStore::open(dir.path().join("h.json")));
        let (tx, mut rx) = mpsc::channel(16);

        let events = events_from(vec![
            Ok(UpstreamEvent::Interrupted),
            Err(RealtimeError::WebSocketError("reset".to_string())),
            Ok(UpstreamEvent::TurnComplete),
        ]);

        let exit = run(events, tx, store, Uuid::new_v4()).await;
        assert!(matches!(exit, OutboundExit::UpstreamError(_)));
        assert_eq!(drain(&mut rx), vec![ClientNotification::interrupted()]);
    }

    #[tokio::test]
    async fn test_client_gone_ends_run() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SessionHandleStore::open(dir.path().join("h.json")));
        let (tx, rx) = mpsc::channel(16);
        drop(rx);

        let events = events_from(vec![Ok(UpstreamEvent::TurnComplete)]);
        let exit = run(events, tx, store, Uuid::new_v4()).await;
        assert!(matches!(exit, OutboundExit::ClientGone));
    }
}
