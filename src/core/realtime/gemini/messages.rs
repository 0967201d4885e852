//! Gemini Live wire messages.
//!
//! Client messages are serialized as camelCase JSON objects with a single
//! top-level key (`setup` or `realtimeInput`). Server messages carry any
//! combination of optional top-level fields and are decoded into
//! [`UpstreamEvent`]s by [`ServerMessage::into_events`].

use base64::prelude::*;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::core::realtime::base::{
    LiveConfig, MediaChunk, ModelTurnPart, RealtimeInput, UpstreamEvent,
};

// =============================================================================
// Client -> Server
// =============================================================================

/// First message sent on a new connection.
#[derive(Debug, Clone, Serialize)]
pub struct SetupMessage {
    pub setup: Setup,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    pub model: String,
    pub generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    pub session_resumption: SessionResumptionConfig,
    pub output_audio_transcription: AudioTranscriptionConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<AudioTranscriptionConfig>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
    pub speech_config: SpeechConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
    pub language_code: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Content {
    pub parts: Vec<TextPart>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextPart {
    pub text: String,
}

/// Session resumption request. An absent handle asks for a fresh session
/// that still issues resumption updates.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionResumptionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
}

/// Empty object enabling a transcription stream.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AudioTranscriptionConfig {}

impl SetupMessage {
    /// Build the setup message for a session.
    pub fn new(model: &str, config: &LiveConfig, transcribe_input: bool) -> Self {
        let system_instruction = if config.system_instruction.trim().is_empty() {
            None
        } else {
            Some(Content {
                parts: vec![TextPart {
                    text: config.system_instruction.clone(),
                }],
            })
        };

        Self {
            setup: Setup {
                model: model.to_string(),
                generation_config: GenerationConfig {
                    response_modalities: vec![config.response_modality.as_str().to_string()],
                    speech_config: SpeechConfig {
                        voice_config: VoiceConfig {
                            prebuilt_voice_config: PrebuiltVoiceConfig {
                                voice_name: config.voice.as_str().to_string(),
                            },
                        },
                        language_code: config.language_code.clone(),
                    },
                },
                system_instruction,
                session_resumption: SessionResumptionConfig {
                    handle: config
                        .resume_handle
                        .clone()
                        .filter(|handle| !handle.is_empty()),
                },
                output_audio_transcription: AudioTranscriptionConfig {},
                input_audio_transcription: transcribe_input.then(AudioTranscriptionConfig::default),
            },
        }
    }
}

/// Streaming input message.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInputMessage {
    pub realtime_input: RealtimeInputPayload,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInputPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_chunks: Option<Vec<Blob>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Base64 media blob as carried on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    #[serde(default)]
    pub mime_type: String,
    pub data: String,
}

impl From<MediaChunk> for Blob {
    fn from(chunk: MediaChunk) -> Self {
        Self {
            mime_type: chunk.mime_type,
            data: chunk.data,
        }
    }
}

impl From<RealtimeInput> for RealtimeInputMessage {
    fn from(input: RealtimeInput) -> Self {
        let realtime_input = match input {
            RealtimeInput::Media(chunk) => RealtimeInputPayload {
                media_chunks: Some(vec![chunk.into()]),
                text: None,
            },
            RealtimeInput::Text(text) => RealtimeInputPayload {
                media_chunks: None,
                text: Some(text),
            },
        };
        Self { realtime_input }
    }
}

// =============================================================================
// Server -> Client
// =============================================================================

/// A message received from Gemini Live.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(default)]
    pub setup_complete: Option<serde_json::Value>,
    #[serde(default)]
    pub server_content: Option<ServerContent>,
    #[serde(default)]
    pub usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    pub session_resumption_update: Option<SessionResumptionUpdate>,
    #[serde(default)]
    pub go_away: Option<GoAway>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(default)]
    pub model_turn: Option<ModelContent>,
    #[serde(default)]
    pub turn_complete: Option<bool>,
    #[serde(default)]
    pub interrupted: Option<bool>,
    #[serde(default)]
    pub input_transcription: Option<Transcription>,
    #[serde(default)]
    pub output_transcription: Option<Transcription>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelContent {
    #[serde(default)]
    pub parts: Vec<ServerPart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerPart {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub inline_data: Option<Blob>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Transcription {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub finished: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub total_token_count: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResumptionUpdate {
    #[serde(default)]
    pub new_handle: Option<String>,
    #[serde(default)]
    pub resumable: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoAway {
    #[serde(default)]
    pub time_left: Option<String>,
}

impl ServerMessage {
    /// Whether this message acknowledges the setup request.
    pub fn is_setup_complete(&self) -> bool {
        self.setup_complete.is_some()
    }

    /// Decode into relay events, in the order they should be delivered.
    ///
    /// An interruption is emitted first; the rest of the message is still
    /// decoded. Inline audio that fails to decode is logged and dropped.
    pub fn into_events(self) -> Vec<UpstreamEvent> {
        let mut events = Vec::new();
        let content = self.server_content.unwrap_or_default();

        if content.interrupted.unwrap_or(false) {
            events.push(UpstreamEvent::Interrupted);
        }

        if let Some(usage) = self.usage_metadata {
            events.push(UpstreamEvent::UsageMetadata {
                total_token_count: usage.total_token_count.unwrap_or(0),
            });
        }

        if let Some(update) = self.session_resumption_update {
            events.push(UpstreamEvent::SessionResumptionUpdate {
                resumable: update.resumable.unwrap_or(false),
                new_handle: update.new_handle,
            });
        }

        if let Some(transcription) = content.output_transcription {
            events.push(UpstreamEvent::OutputTranscription {
                text: transcription.text.unwrap_or_default(),
                finished: transcription.finished.unwrap_or(false),
            });
        }

        if let Some(transcription) = content.input_transcription {
            events.push(UpstreamEvent::InputTranscription {
                text: transcription.text.unwrap_or_default(),
                finished: transcription.finished.unwrap_or(false),
            });
        }

        if let Some(turn) = content.model_turn {
            for part in turn.parts {
                if let Some(text) = part.text {
                    events.push(UpstreamEvent::ModelTurnPart(ModelTurnPart::Text(text)));
                }
                if let Some(blob) = part.inline_data {
                    match BASE64_STANDARD.decode(blob.data.as_bytes()) {
                        Ok(audio) => events.push(UpstreamEvent::ModelTurnPart(
                            ModelTurnPart::Audio(Bytes::from(audio)),
                        )),
                        Err(e) => {
                            tracing::warn!(
                                mime_type = %blob.mime_type,
                                "Failed to decode inline audio from Gemini: {}",
                                e
                            );
                        }
                    }
                }
            }
        }

        if content.turn_complete.unwrap_or(false) {
            events.push(UpstreamEvent::TurnComplete);
        }

        if let Some(go_away) = self.go_away {
            events.push(UpstreamEvent::GoAway {
                time_left: go_away.time_left,
            });
        }

        events
    }
}
