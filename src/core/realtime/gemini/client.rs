//! Gemini Live API client implementation.
//!
//! # API Reference
//!
//! - Endpoint: `wss://generativelanguage.googleapis.com/ws/...BidiGenerateContent?key=<key>`
//! - Protocol: WebSocket with JSON messages (the server may send them in binary frames)
//! - Input audio: PCM 16-bit, 16kHz, mono, base64 encoded
//! - Output audio: PCM 16-bit, 24kHz, mono, base64 encoded
//!
//! The connection is opened with a `setup` message and is usable once the
//! server replies with `setupComplete`. After that a background task owns the
//! socket: it writes queued input, answers pings and decodes server messages
//! into [`UpstreamEvent`]s.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::config::GeminiLiveSettings;
use super::messages::{RealtimeInputMessage, ServerMessage, SetupMessage};
use crate::core::realtime::base::{
    LiveConfig, RealtimeConnector, RealtimeError, RealtimeInput, RealtimeResult, UpstreamEvent,
    UpstreamEvents, UpstreamSender, UpstreamSession,
};

/// Channel capacity for outgoing WebSocket messages.
const WS_CHANNEL_CAPACITY: usize = 256;

/// Channel capacity for decoded upstream events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

type GeminiSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type GeminiSink = SplitSink<GeminiSocket, Message>;
type GeminiSource = SplitStream<GeminiSocket>;

// =============================================================================
// Connector
// =============================================================================

/// Opens Gemini Live sessions.
#[derive(Debug)]
pub struct GeminiLiveConnector {
    settings: GeminiLiveSettings,
}

impl GeminiLiveConnector {
    /// Create a new connector. Fails if the settings are unusable.
    pub fn new(settings: GeminiLiveSettings) -> RealtimeResult<Self> {
        settings.validate()?;
        Ok(Self { settings })
    }

    /// Build the WebSocket URL with the API key attached.
    fn build_ws_url(&self) -> RealtimeResult<String> {
        let mut url = Url::parse(&self.settings.endpoint)
            .map_err(|e| RealtimeError::InvalidConfiguration(format!("invalid endpoint: {e}")))?;
        url.query_pairs_mut()
            .append_pair("key", &self.settings.api_key);
        Ok(url.into())
    }
}

#[async_trait]
impl RealtimeConnector for GeminiLiveConnector {
    async fn open(&self, config: LiveConfig) -> RealtimeResult<UpstreamSession> {
        let url = self.build_ws_url()?;
        let resuming = config.resume_handle.is_some();

        let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;

        let (mut ws_sink, mut ws_source) = ws_stream.split();

        let setup = SetupMessage::new(&self.settings.model, &config, self.settings.transcribe_input);
        let json = serde_json::to_string(&setup)
            .map_err(|e| RealtimeError::SerializationError(e.to_string()))?;
        ws_sink
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| RealtimeError::WebSocketError(e.to_string()))?;

        tokio::time::timeout(
            self.settings.setup_timeout,
            wait_for_setup_complete(&mut ws_sink, &mut ws_source),
        )
        .await
        .map_err(|_| {
            RealtimeError::Timeout(format!(
                "no setupComplete within {:?}",
                self.settings.setup_timeout
            ))
        })??;

        tracing::info!(
            model = %self.settings.model,
            voice = %config.voice,
            resuming,
            "Connected to Gemini Live API"
        );

        let shutdown = CancellationToken::new();
        let (input_tx, input_rx) = mpsc::channel::<String>(WS_CHANNEL_CAPACITY);
        let (event_tx, mut event_rx) =
            mpsc::channel::<RealtimeResult<UpstreamEvent>>(EVENT_CHANNEL_CAPACITY);

        tokio::spawn(run_connection(
            ws_sink,
            ws_source,
            input_rx,
            event_tx,
            shutdown.clone(),
        ));

        let events: UpstreamEvents = Box::pin(async_stream::stream! {
            while let Some(item) = event_rx.recv().await {
                yield item;
            }
        });

        Ok(UpstreamSession::new(
            Arc::new(GeminiLiveSender { tx: input_tx }),
            events,
            shutdown,
        ))
    }

    fn provider_name(&self) -> &'static str {
        "gemini"
    }
}

// =============================================================================
// Sender
// =============================================================================

/// Sending half of a Gemini Live session.
#[derive(Debug, Clone)]
pub struct GeminiLiveSender {
    tx: mpsc::Sender<String>,
}

#[async_trait]
impl UpstreamSender for GeminiLiveSender {
    async fn send(&self, input: RealtimeInput) -> RealtimeResult<()> {
        let message = RealtimeInputMessage::from(input);
        let json = serde_json::to_string(&message)
            .map_err(|e| RealtimeError::SerializationError(e.to_string()))?;
        self.tx
            .send(json)
            .await
            .map_err(|_| RealtimeError::NotConnected)
    }
}

// =============================================================================
// Connection Task
// =============================================================================

/// Read frames until the server acknowledges setup.
async fn wait_for_setup_complete(
    sink: &mut GeminiSink,
    source: &mut GeminiSource,
) -> RealtimeResult<()> {
    while let Some(msg) = source.next().await {
        let payload = match msg {
            Ok(Message::Text(text)) => text.as_str().as_bytes().to_vec(),
            Ok(Message::Binary(data)) => data.to_vec(),
            Ok(Message::Ping(data)) => {
                sink.send(Message::Pong(data))
                    .await
                    .map_err(|e| RealtimeError::WebSocketError(e.to_string()))?;
                continue;
            }
            Ok(Message::Close(frame)) => {
                let reason = frame
                    .map(|f| format!("{} {}", u16::from(f.code), f.reason.as_str()))
                    .unwrap_or_else(|| "connection closed".to_string());
                return Err(RealtimeError::SetupRejected(reason));
            }
            Ok(_) => continue,
            Err(e) => return Err(RealtimeError::WebSocketError(e.to_string())),
        };

        match serde_json::from_slice::<ServerMessage>(&payload) {
            Ok(message) if message.is_setup_complete() => return Ok(()),
            Ok(_) => tracing::debug!("Ignoring Gemini message received before setupComplete"),
            Err(e) => tracing::warn!("Failed to parse Gemini setup response: {}", e),
        }
    }

    Err(RealtimeError::SetupRejected(
        "connection closed before setupComplete".to_string(),
    ))
}

/// Decode one server payload and forward its events.
///
/// Returns `false` once the event consumer is gone.
async fn forward_payload(
    payload: &[u8],
    event_tx: &mpsc::Sender<RealtimeResult<UpstreamEvent>>,
) -> bool {
    let message = match serde_json::from_slice::<ServerMessage>(payload) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!("Failed to parse Gemini message: {}", e);
            return true;
        }
    };

    for event in message.into_events() {
        if event_tx.send(Ok(event)).await.is_err() {
            return false;
        }
    }
    true
}

/// Own the socket until shutdown, upstream close, or the consumer goes away.
async fn run_connection(
    mut sink: GeminiSink,
    mut source: GeminiSource,
    mut input_rx: mpsc::Receiver<String>,
    event_tx: mpsc::Sender<RealtimeResult<UpstreamEvent>>,
    shutdown: CancellationToken,
) {
    let mut inputs_open = true;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::debug!("Closing Gemini Live connection");
                let _ = sink.send(Message::Close(None)).await;
                break;
            }

            _ = event_tx.closed() => {
                tracing::debug!("Gemini event consumer dropped, closing connection");
                let _ = sink.send(Message::Close(None)).await;
                break;
            }

            input = input_rx.recv(), if inputs_open => {
                match input {
                    Some(json) => {
                        if let Err(e) = sink.send(Message::Text(json.into())).await {
                            tracing::error!("Failed to send message to Gemini: {}", e);
                            let _ = event_tx
                                .send(Err(RealtimeError::WebSocketError(e.to_string())))
                                .await;
                            break;
                        }
                    }
                    None => inputs_open = false,
                }
            }

            msg = source.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if !forward_payload(text.as_str().as_bytes(), &event_tx).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        if !forward_payload(&data, &event_tx).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = sink.send(Message::Pong(data)).await {
                            tracing::warn!("Failed to answer Gemini ping: {}", e);
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        match frame {
                            Some(frame) if frame.code != CloseCode::Normal => {
                                let reason = format!(
                                    "closed by upstream: {} {}",
                                    u16::from(frame.code),
                                    frame.reason.as_str()
                                );
                                tracing::warn!("Gemini Live {}", reason);
                                let _ = event_tx
                                    .send(Err(RealtimeError::WebSocketError(reason)))
                                    .await;
                            }
                            _ => tracing::info!("Gemini Live connection closed"),
                        }
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("Gemini WebSocket error: {}", e);
                        let _ = event_tx
                            .send(Err(RealtimeError::WebSocketError(e.to_string())))
                            .await;
                        break;
                    }
                    None => {
                        tracing::info!("Gemini Live stream ended");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::realtime::gemini::config::GEMINI_LIVE_URL;

    #[test]
    fn test_new_rejects_empty_key() {
        let result = GeminiLiveConnector::new(GeminiLiveSettings::new(""));
        assert!(matches!(
            result,
            Err(RealtimeError::AuthenticationFailed(_))
        ));
    }

    #[test]
    fn test_build_ws_url() {
        let connector = GeminiLiveConnector::new(GeminiLiveSettings::new("abc 123")).unwrap();
        let url = connector.build_ws_url().unwrap();
        assert!(url.starts_with(GEMINI_LIVE_URL));
        assert!(url.ends_with("?key=abc+123"));
    }

    #[test]
    fn test_build_ws_url_keeps_existing_query() {
        let settings =
            GeminiLiveSettings::new("k").with_endpoint("ws://127.0.0.1:9000/live?alt=json");
        let connector = GeminiLiveConnector::new(settings).unwrap();
        assert_eq!(
            connector.build_ws_url().unwrap(),
            "ws://127.0.0.1:9000/live?alt=json&key=k"
        );
    }

    #[test]
    fn test_provider_name() {
        let connector = GeminiLiveConnector::new(GeminiLiveSettings::new("k")).unwrap();
        assert_eq!(connector.provider_name(), "gemini");
    }

    #[tokio::test]
    async fn test_sender_reports_closed_connection() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = GeminiLiveSender { tx };
        let result = sender.send(RealtimeInput::Text("hi".to_string())).await;
        assert!(matches!(result, Err(RealtimeError::NotConnected)));
    }

    #[tokio::test]
    async fn test_sender_serializes_input() {
        let (tx, mut rx) = mpsc::channel(1);
        let sender = GeminiLiveSender { tx };
        sender
            .send(RealtimeInput::Text("hi".to_string()))
            .await
            .unwrap();
        assert_eq!(
            rx.recv().await.unwrap(),
            r#"{"realtimeInput":{"text":"hi"}}"#
        );
    }

    #[tokio::test]
    async fn test_open_fails_fast_when_unreachable() {
        let settings = GeminiLiveSettings::new("k").with_endpoint("ws://127.0.0.1:1/live");
        let connector = GeminiLiveConnector::new(settings).unwrap();
        let result = connector.open(LiveConfig::default()).await;
        assert!(matches!(result, Err(RealtimeError::ConnectionFailed(_))));
    }
}
