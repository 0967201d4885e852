//! Relay WebSocket message types
//!
//! Client frames are untagged JSON objects: the first one configures the
//! session, every later one carries either `realtime_input` or `text`.
//! Notifications sent back are single-key objects (`interrupted`,
//! `transcription`, `text`, `audio`, `error`).

use base64::prelude::*;
use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::core::realtime::{MediaChunk, VoicePreset};

/// Maximum allowed size for the system instruction (100 KB)
pub const MAX_INSTRUCTIONS_SIZE: usize = 100 * 1024;

/// Maximum allowed length of a language code
pub const MAX_LANGUAGE_CODE_SIZE: usize = 35;

/// Error code sent when the upstream session cannot be opened
pub const ERROR_UPSTREAM_CONNECT: &str = "upstream_connect_failed";

/// Error code sent when the setup frame is not valid JSON
pub const ERROR_INVALID_SETUP: &str = "invalid_setup";

// =============================================================================
// Incoming Messages (Client -> Server)
// =============================================================================

/// First frame sent by the client, overriding configured session defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SessionSetup {
    /// Voice preset name
    #[serde(default, alias = "voice_name")]
    pub voice: Option<String>,

    /// BCP-47 language code
    #[serde(default)]
    pub language_code: Option<String>,

    /// System instruction text
    #[serde(default)]
    pub system_instruction: Option<String>,
}

impl SessionSetup {
    /// Parse the setup frame. Any JSON object is accepted; unknown fields
    /// are ignored.
    pub fn parse(text: &str) -> Result<Self, String> {
        let setup: Self =
            serde_json::from_str(text).map_err(|e| format!("invalid setup message: {e}"))?;
        setup.validate_size()?;
        Ok(setup)
    }

    /// Validate field sizes.
    pub fn validate_size(&self) -> Result<(), String> {
        if let Some(ref instruction) = self.system_instruction
            && instruction.len() > MAX_INSTRUCTIONS_SIZE
        {
            return Err(format!(
                "system_instruction exceeds maximum size of {} bytes",
                MAX_INSTRUCTIONS_SIZE
            ));
        }
        if let Some(ref code) = self.language_code
            && code.len() > MAX_LANGUAGE_CODE_SIZE
        {
            return Err(format!(
                "language_code exceeds maximum size of {} bytes",
                MAX_LANGUAGE_CODE_SIZE
            ));
        }
        Ok(())
    }

    /// Resolve the requested voice. Unknown names are logged and ignored.
    pub fn voice_preset(&self) -> Option<VoicePreset> {
        let name = self.voice.as_deref()?;
        let preset = VoicePreset::parse(name);
        if preset.is_none() {
            tracing::warn!(voice = %name, "Unknown voice requested, using default");
        }
        preset
    }
}

#[derive(Debug, Deserialize)]
struct ClientEnvelope {
    /// `Some` whenever the key is present, even if its value is `null`.
    #[serde(default, deserialize_with = "present")]
    realtime_input: Option<Value>,
    #[serde(default)]
    text: Option<String>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Decode `realtime_input.media_chunks` one chunk at a time so a malformed
/// chunk only costs itself.
fn media_chunks(input: Value) -> Vec<MediaChunk> {
    let Value::Object(mut input) = input else {
        return Vec::new();
    };
    let Some(Value::Array(chunks)) = input.remove("media_chunks") else {
        return Vec::new();
    };

    chunks
        .into_iter()
        .filter_map(|chunk| match serde_json::from_value::<MediaChunk>(chunk) {
            Ok(chunk) => Some(chunk),
            Err(e) => {
                tracing::warn!("Dropping malformed media chunk: {}", e);
                None
            }
        })
        .collect()
}

/// A multiplexed frame from the client after setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Ordered media chunks
    RealtimeInput(Vec<MediaChunk>),
    /// Typed text
    TextInput(String),
}

impl ClientMessage {
    /// Parse a client frame.
    ///
    /// `realtime_input` wins over `text` whenever its key is present, even
    /// when it is `null` or holds no usable chunks. A valid JSON object
    /// carrying neither yields `Ok(None)`.
    pub fn parse(text: &str) -> Result<Option<Self>, serde_json::Error> {
        let envelope: ClientEnvelope = serde_json::from_str(text)?;
        if let Some(input) = envelope.realtime_input {
            return Ok(Some(Self::RealtimeInput(media_chunks(input))));
        }
        Ok(envelope.text.map(Self::TextInput))
    }
}

// =============================================================================
// Outgoing Messages (Server -> Client)
// =============================================================================

/// Who produced a transcription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TranscriptSender {
    Gemini,
    User,
}

/// Error details sent to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// Notifications sent to the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientNotification {
    /// Model output was interrupted; always `true`
    Interrupted(bool),

    /// Transcription chunk
    Transcription {
        text: String,
        sender: TranscriptSender,
        finished: bool,
    },

    /// Model text
    Text(String),

    /// Base64-encoded PCM audio
    Audio(String),

    /// Session error
    Error(ErrorBody),
}

impl ClientNotification {
    pub fn interrupted() -> Self {
        Self::Interrupted(true)
    }

    pub fn transcription(text: impl Into<String>, sender: TranscriptSender, finished: bool) -> Self {
        Self::Transcription {
            text: text.into(),
            sender,
            finished,
        }
    }

    /// Synthetic marker closing a model turn.
    pub fn end_of_turn() -> Self {
        Self::transcription("", TranscriptSender::Gemini, true)
    }

    /// Encode audio bytes for transport.
    pub fn audio(data: &Bytes) -> Self {
        Self::Audio(BASE64_STANDARD.encode(data))
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error(ErrorBody {
            code: code.into(),
            message: message.into(),
        })
    }
}

/// Routing for frames handed to the socket writer task
#[derive(Debug)]
pub enum RelayMessageRoute {
    /// JSON notification
    Outgoing(ClientNotification),
    /// Keepalive ping
    Ping(Bytes),
    /// Close the connection
    Close,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_setup_parsing() {
        let setup = SessionSetup::parse(
            r#"{"voice_name":"Puck","language_code":"fr-FR","system_instruction":"Hi","extra":1}"#,
        )
        .unwrap();
        assert_eq!(setup.voice.as_deref(), Some("Puck"));
        assert_eq!(setup.language_code.as_deref(), Some("fr-FR"));
        assert_eq!(setup.system_instruction.as_deref(), Some("Hi"));
        assert_eq!(setup.voice_preset(), Some(VoicePreset::Puck));

        let setup = SessionSetup::parse("{}").unwrap();
        assert_eq!(setup, SessionSetup::default());
        assert!(setup.voice_preset().is_none());
    }

    #[test]
    fn test_session_setup_rejects_invalid() {
        assert!(SessionSetup::parse("not json").is_err());
        assert!(SessionSetup::parse("[1,2]").is_err());

        let huge = "x".repeat(MAX_INSTRUCTIONS_SIZE + 1);
        let json = serde_json::json!({ "system_instruction": huge }).to_string();
        let err = SessionSetup::parse(&json).unwrap_err();
        assert!(err.contains("system_instruction"));
    }

    #[test]
    fn test_unknown_voice_falls_back() {
        let setup = SessionSetup {
            voice: Some("alloy".to_string()),
            ..Default::default()
        };
        assert!(setup.voice_preset().is_none());
    }

    #[test]
    fn test_client_message_parsing() {
        let msg = ClientMessage::parse(
            r#"{"realtime_input":{"media_chunks":[{"mime_type":"audio/pcm","data":"QUJD"},{"mime_type":"image/jpeg","data":"/9j/"}]}}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            Some(ClientMessage::RealtimeInput(vec![
                MediaChunk::new("audio/pcm", "QUJD"),
                MediaChunk::new("image/jpeg", "/9j/"),
            ]))
        );

        let msg = ClientMessage::parse(r#"{"text":"hello"}"#).unwrap();
        assert_eq!(msg, Some(ClientMessage::TextInput("hello".to_string())));

        assert_eq!(ClientMessage::parse(r#"{"other":true}"#).unwrap(), None);
        assert!(ClientMessage::parse("{broken").is_err());
    }

    #[test]
    fn test_realtime_input_takes_precedence() {
        let msg =
            ClientMessage::parse(r#"{"realtime_input":{"media_chunks":[]},"text":"ignored"}"#)
                .unwrap();
        assert_eq!(msg, Some(ClientMessage::RealtimeInput(vec![])));
    }

    #[test]
    fn test_malformed_chunk_drops_only_itself() {
        let msg = ClientMessage::parse(
            r#"{"realtime_input":{"media_chunks":[
                {"mime_type":"audio/pcm","data":"QUJD"},
                {"mime_type":"audio/pcm"},
                "not an object",
                {"mime_type":"image/png","data":"iVBO"}
            ]}}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            Some(ClientMessage::RealtimeInput(vec![
                MediaChunk::new("audio/pcm", "QUJD"),
                MediaChunk::new("image/png", "iVBO"),
            ]))
        );
    }

    #[test]
    fn test_null_realtime_input_forwards_nothing() {
        let msg = ClientMessage::parse(r#"{"realtime_input":null,"text":"x"}"#).unwrap();
        assert_eq!(msg, Some(ClientMessage::RealtimeInput(vec![])));

        let msg = ClientMessage::parse(r#"{"realtime_input":{},"text":"x"}"#).unwrap();
        assert_eq!(msg, Some(ClientMessage::RealtimeInput(vec![])));
    }

    #[test]
    fn test_notification_serialization() {
        let json = serde_json::to_string(&ClientNotification::interrupted()).unwrap();
        assert_eq!(json, r#"{"interrupted":true}"#);

        let json = serde_json::to_string(&ClientNotification::end_of_turn()).unwrap();
        assert_eq!(
            json,
            r#"{"transcription":{"text":"","sender":"Gemini","finished":true}}"#
        );

        let json = serde_json::to_string(&ClientNotification::transcription(
            "hey",
            TranscriptSender::User,
            false,
        ))
        .unwrap();
        assert_eq!(
            json,
            r#"{"transcription":{"text":"hey","sender":"User","finished":false}}"#
        );

        let json = serde_json::to_string(&ClientNotification::Text("hi".to_string())).unwrap();
        assert_eq!(json, r#"{"text":"hi"}"#);

        let json =
            serde_json::to_string(&ClientNotification::audio(&Bytes::from_static(b"AB"))).unwrap();
        assert_eq!(json, r#"{"audio":"QUI="}"#);

        let json = serde_json::to_string(&ClientNotification::error(
            ERROR_UPSTREAM_CONNECT,
            "refused",
        ))
        .unwrap();
        assert!(json.contains(r#""code":"upstream_connect_failed""#));
        assert!(json.starts_with(r#"{"error":"#));
    }
}
