//! Gemini Live API module.
//!
//! Bidirectional audio, image and text streaming with Google's Gemini Live
//! (`BidiGenerateContent`) service.
//!
//! # Features
//!
//! - Native audio dialog with prebuilt voices
//! - Transcription of both model output and user input
//! - Session resumption through opaque handles
//!
//! # Supported Voices
//!
//! Puck, Charon, Kore, Fenrir, Aoede, Leda, Orus, Zephyr
//!
//! # Example
//!
//! ```rust,ignore
//! use askademia_gateway::core::realtime::{
//!     GeminiLiveConnector, GeminiLiveSettings, LiveConfig, RealtimeConnector,
//! };
//!
//! let connector = GeminiLiveConnector::new(GeminiLiveSettings::new(api_key))?;
//! let session = connector.open(LiveConfig::default()).await?;
//! let (sender, events, handle) = session.split();
//! ```

mod client;
mod config;
mod messages;

pub use client::{GeminiLiveConnector, GeminiLiveSender};
pub use config::{
    DEFAULT_GEMINI_MODEL, DEFAULT_SETUP_TIMEOUT, GEMINI_LIVE_URL, GeminiLiveSettings,
    normalize_model_name,
};
pub use messages::{RealtimeInputMessage, ServerMessage, SetupMessage};
