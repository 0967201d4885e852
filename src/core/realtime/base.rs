//! Base traits and types for upstream realtime dialogue sessions.
//!
//! This module defines the provider-agnostic surface the relay depends on:
//! a connector that opens one session per client, a cloneable sender for
//! multimodal input, and a lazy sequence of decoded upstream events.
//!
//! Wire formats stay inside provider modules; everything here is already
//! decoded into [`UpstreamEvent`] so the relay can match on variants instead
//! of re-inspecting optional fields.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// MIME type of raw PCM audio accepted from clients.
pub const PCM_AUDIO_MIME_TYPE: &str = "audio/pcm";

/// MIME prefix shared by all accepted image payloads.
pub const IMAGE_MIME_PREFIX: &str = "image/";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while talking to the upstream session.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Connection to the provider failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The provider closed the connection before acknowledging setup
    #[error("Setup rejected: {0}")]
    SetupRejected(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Operation timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Not connected
    #[error("Not connected")]
    NotConnected,
}

/// Result type for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

// =============================================================================
// Input Types
// =============================================================================

/// Kind of media a client chunk carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Raw PCM audio (`audio/pcm`)
    Audio,
    /// Any `image/*` payload
    Image,
}

impl MediaKind {
    /// Classify a MIME type. Returns `None` for kinds the relay never forwards.
    pub fn classify(mime_type: &str) -> Option<Self> {
        if mime_type == PCM_AUDIO_MIME_TYPE {
            Some(Self::Audio)
        } else if mime_type.starts_with(IMAGE_MIME_PREFIX) {
            Some(Self::Image)
        } else {
            None
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Audio => write!(f, "audio"),
            MediaKind::Image => write!(f, "image"),
        }
    }
}

/// A single media chunk as sent by the client.
///
/// `data` is kept in its transport encoding (base64) and forwarded verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaChunk {
    /// MIME type, e.g. `audio/pcm` or `image/jpeg`
    pub mime_type: String,
    /// Base64 payload
    pub data: String,
}

impl MediaChunk {
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Kind of this chunk, if it is one the relay forwards.
    pub fn kind(&self) -> Option<MediaKind> {
        MediaKind::classify(&self.mime_type)
    }
}

/// Input forwarded to the upstream session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RealtimeInput {
    /// Audio or image chunk
    Media(MediaChunk),
    /// Text typed by the user
    Text(String),
}

// =============================================================================
// Upstream Events
// =============================================================================

/// One part of a model turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelTurnPart {
    /// Text produced by the model
    Text(String),
    /// Decoded audio bytes (PCM 16-bit, 24kHz, mono)
    Audio(Bytes),
}

/// Events produced by an upstream session, decoded once at the adapter boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamEvent {
    /// The model's current generation was interrupted by user activity
    Interrupted,
    /// Token accounting
    UsageMetadata {
        /// Total tokens used so far in the session
        total_token_count: u64,
    },
    /// A new resumption handle was issued
    SessionResumptionUpdate {
        /// Whether the session can be resumed at this point
        resumable: bool,
        /// Handle to resume from, if any
        new_handle: Option<String>,
    },
    /// Transcription of the model's spoken output
    OutputTranscription {
        /// Transcribed text chunk
        text: String,
        /// Whether the transcription is final
        finished: bool,
    },
    /// Transcription of the user's spoken input
    InputTranscription {
        /// Transcribed text chunk
        text: String,
        /// Whether the transcription is final
        finished: bool,
    },
    /// A piece of the model's turn
    ModelTurnPart(ModelTurnPart),
    /// The model finished its turn
    TurnComplete,
    /// The provider will close the connection soon
    GoAway {
        /// Remaining time before disconnect, as reported by the provider
        time_left: Option<String>,
    },
}

// =============================================================================
// Session Configuration
// =============================================================================

/// Response modality requested from the upstream model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseModality {
    /// Spoken audio responses
    #[default]
    Audio,
    /// Text responses
    Text,
}

impl ResponseModality {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "AUDIO",
            Self::Text => "TEXT",
        }
    }
}

/// Prebuilt voice presets offered by the upstream service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VoicePreset {
    Puck,
    Charon,
    /// Default voice
    #[default]
    Kore,
    Fenrir,
    Aoede,
    Leda,
    Orus,
    Zephyr,
}

impl VoicePreset {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Puck => "Puck",
            Self::Charon => "Charon",
            Self::Kore => "Kore",
            Self::Fenrir => "Fenrir",
            Self::Aoede => "Aoede",
            Self::Leda => "Leda",
            Self::Orus => "Orus",
            Self::Zephyr => "Zephyr",
        }
    }

    /// Parse a voice name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|voice| voice.as_str().eq_ignore_ascii_case(s.trim()))
    }

    /// Get all available voices.
    pub fn all() -> &'static [VoicePreset] {
        &[
            Self::Puck,
            Self::Charon,
            Self::Kore,
            Self::Fenrir,
            Self::Aoede,
            Self::Leda,
            Self::Orus,
            Self::Zephyr,
        ]
    }
}

impl fmt::Display for VoicePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-session configuration used to open an upstream session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveConfig {
    /// Response modality (audio for voice conversations)
    pub response_modality: ResponseModality,
    /// Voice preset
    pub voice: VoicePreset,
    /// BCP-47 language code, e.g. `en-US`
    pub language_code: String,
    /// System instruction text
    pub system_instruction: String,
    /// Handle of a previous conversation to continue; `None` starts fresh
    pub resume_handle: Option<String>,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            response_modality: ResponseModality::Audio,
            voice: VoicePreset::default(),
            language_code: "en-US".to_string(),
            system_instruction: "You are a helpful assistant.".to_string(),
            resume_handle: None,
        }
    }
}

// =============================================================================
// Session Traits
// =============================================================================

/// Lazy, non-restartable sequence of upstream events.
///
/// The stream ends when the upstream closes normally. A transport failure is
/// yielded as an `Err` item, after which the stream ends.
pub type UpstreamEvents = Pin<Box<dyn Stream<Item = RealtimeResult<UpstreamEvent>> + Send>>;

/// Sending half of an upstream session.
#[async_trait]
pub trait UpstreamSender: Send + Sync {
    /// Send one input to the upstream session.
    async fn send(&self, input: RealtimeInput) -> RealtimeResult<()>;
}

/// Handle used to close an upstream session from outside its event loop.
#[derive(Debug, Clone)]
pub struct UpstreamHandle {
    shutdown: CancellationToken,
}

impl UpstreamHandle {
    pub fn new(shutdown: CancellationToken) -> Self {
        Self { shutdown }
    }

    /// Request the upstream session to close. Idempotent.
    pub fn close(&self) {
        self.shutdown.cancel();
    }
}

/// An open upstream session.
pub struct UpstreamSession {
    sender: Arc<dyn UpstreamSender>,
    events: UpstreamEvents,
    handle: UpstreamHandle,
}

impl UpstreamSession {
    pub fn new(
        sender: Arc<dyn UpstreamSender>,
        events: UpstreamEvents,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            sender,
            events,
            handle: UpstreamHandle::new(shutdown),
        }
    }

    /// Split into the sending half, the event sequence and the close handle so
    /// each can be owned by a different task.
    pub fn split(self) -> (Arc<dyn UpstreamSender>, UpstreamEvents, UpstreamHandle) {
        (self.sender, self.events, self.handle)
    }
}

/// Opens upstream sessions.
///
/// Implementations encode and decode the provider wire format only; they do
/// not retry, and a failed open is reported immediately.
#[async_trait]
pub trait RealtimeConnector: Send + Sync {
    /// Open a new upstream session.
    async fn open(&self, config: LiveConfig) -> RealtimeResult<UpstreamSession>;

    /// Provider name used in logs and health output.
    fn provider_name(&self) -> &'static str;
}

/// Shared connector trait object.
pub type BoxedConnector = Arc<dyn RealtimeConnector>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_kind_classification() {
        assert_eq!(MediaKind::classify("audio/pcm"), Some(MediaKind::Audio));
        assert_eq!(MediaKind::classify("image/jpeg"), Some(MediaKind::Image));
        assert_eq!(MediaKind::classify("image/png"), Some(MediaKind::Image));
        assert_eq!(MediaKind::classify("audio/wav"), None);
        assert_eq!(MediaKind::classify("audio/pcm;rate=16000"), None);
        assert_eq!(MediaKind::classify("text/plain"), None);
        assert_eq!(MediaKind::classify(""), None);
    }

    #[test]
    fn test_media_chunk_kind() {
        let chunk = MediaChunk::new("image/webp", "AAAA");
        assert_eq!(chunk.kind(), Some(MediaKind::Image));

        let chunk = MediaChunk::new("video/mp4", "AAAA");
        assert_eq!(chunk.kind(), None);
    }

    #[test]
    fn test_voice_preset_parse() {
        assert_eq!(VoicePreset::parse("Kore"), Some(VoicePreset::Kore));
        assert_eq!(VoicePreset::parse("zephyr"), Some(VoicePreset::Zephyr));
        assert_eq!(VoicePreset::parse(" PUCK "), Some(VoicePreset::Puck));
        assert_eq!(VoicePreset::parse("alloy"), None);
        assert_eq!(VoicePreset::all().len(), 8);
    }

    #[test]
    fn test_default_live_config() {
        let config = LiveConfig::default();
        assert_eq!(config.response_modality, ResponseModality::Audio);
        assert_eq!(config.voice, VoicePreset::Kore);
        assert_eq!(config.language_code, "en-US");
        assert!(config.resume_handle.is_none());
    }

    #[test]
    fn test_upstream_handle_close_is_idempotent() {
        let token = CancellationToken::new();
        let handle = UpstreamHandle::new(token.clone());
        assert!(!token.is_cancelled());

        handle.close();
        handle.close();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_error_display() {
        let err = RealtimeError::ConnectionFailed("refused".to_string());
        assert!(err.to_string().contains("Connection failed"));

        let err = RealtimeError::NotConnected;
        assert_eq!(err.to_string(), "Not connected");
    }
}
