//! Relay WebSocket handlers
//!
//! Bridges one client WebSocket to one upstream Gemini Live session.
//!
//! # Protocol
//!
//! ## Client → Server
//!
//! - **setup** (first frame): `{"voice": "Kore", "language_code": "en-US", "system_instruction": "..."}`,
//!   every field optional
//! - **realtime_input**: `{"realtime_input": {"media_chunks": [{"mime_type": "audio/pcm", "data": "<base64>"}]}}`;
//!   only `audio/pcm` and `image/*` chunks are forwarded
//! - **text**: `{"text": "..."}`
//!
//! ## Server → Client
//!
//! - **interrupted**: `{"interrupted": true}`
//! - **transcription**: `{"transcription": {"text": "...", "sender": "Gemini" | "User", "finished": bool}}`;
//!   an empty finished `Gemini` transcription marks the end of a model turn
//! - **text**: `{"text": "..."}`
//! - **audio**: `{"audio": "<base64 PCM 24kHz>"}`
//! - **error**: `{"error": {"code": "...", "message": "..."}}`

mod handler;
pub mod inbound;
pub mod messages;
pub mod outbound;
mod session;

pub use handler::relay_handler;
pub use messages::{ClientMessage, ClientNotification, RelayMessageRoute, SessionSetup};
pub use session::{RelaySession, SessionDefaults, SessionEnd};
