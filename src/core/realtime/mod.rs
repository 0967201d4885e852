//! Upstream realtime dialogue sessions.
//!
//! The relay talks to the upstream service only through the traits in
//! [`base`]: a [`RealtimeConnector`] opens one [`UpstreamSession`] per client,
//! which splits into a cloneable [`UpstreamSender`], a lazy
//! [`UpstreamEvents`] sequence and an [`UpstreamHandle`] used for closing.
//!
//! # Supported Providers
//!
//! - **Gemini Live** - native audio dialog with session resumption

mod base;
pub mod gemini;

pub use base::{
    BoxedConnector, IMAGE_MIME_PREFIX, LiveConfig, MediaChunk, MediaKind, ModelTurnPart,
    PCM_AUDIO_MIME_TYPE, RealtimeConnector, RealtimeError, RealtimeInput, RealtimeResult,
    ResponseModality, UpstreamEvent, UpstreamEvents, UpstreamHandle, UpstreamSender,
    UpstreamSession, VoicePreset,
};
pub use gemini::{GeminiLiveConnector, GeminiLiveSettings};
