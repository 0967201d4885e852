//! Configuration from environment variables.

use std::path::PathBuf;

use crate::core::realtime::VoicePreset;
use crate::core::realtime::gemini::normalize_model_name;

use super::utils::{env_var, parse_env, parse_env_bool};
use super::{ConfigError, ServerConfig};

/// Build a configuration from environment variables, falling back to defaults.
pub(crate) fn from_env() -> Result<ServerConfig, ConfigError> {
    let mut config = ServerConfig::default();

    if let Some(host) = env_var("HOST") {
        config.host = host;
    }
    if let Some(port) = parse_env::<u16>("PORT")? {
        config.port = port;
    }
    if let Some(interval) = parse_env::<u64>("KEEPALIVE_INTERVAL_SECONDS")? {
        config.keepalive_interval_seconds = interval;
    }
    if let Some(timeout) = parse_env::<u64>("KEEPALIVE_TIMEOUT_SECONDS")? {
        config.keepalive_timeout_seconds = timeout;
    }

    config.google_api_key = env_var("GOOGLE_API_KEY");

    if let Some(model) = env_var("GEMINI_MODEL") {
        config.gemini.model = normalize_model_name(&model);
    }
    if let Some(endpoint) = env_var("GEMINI_LIVE_URL") {
        config.gemini.endpoint = endpoint;
    }
    if let Some(voice) = env_var("GEMINI_VOICE") {
        config.gemini.voice = parse_voice("GEMINI_VOICE", &voice)?;
    }
    if let Some(language_code) = env_var("GEMINI_LANGUAGE_CODE") {
        config.gemini.language_code = language_code;
    }
    if let Some(instruction) = env_var("GEMINI_SYSTEM_INSTRUCTION") {
        config.gemini.system_instruction = instruction;
    }
    if let Some(timeout) = parse_env::<u64>("GEMINI_SETUP_TIMEOUT_SECONDS")? {
        config.gemini.setup_timeout_seconds = timeout;
    }
    if let Some(enabled) = parse_env_bool("GEMINI_TRANSCRIBE_INPUT")? {
        config.gemini.transcribe_input = enabled;
    }

    if let Some(path) = env_var("SESSION_HANDLE_PATH") {
        config.session_handle_path = PathBuf::from(path);
    }

    config.max_websocket_connections = parse_env::<usize>("MAX_WEBSOCKET_CONNECTIONS")?;
    config.cors_allowed_origins = env_var("CORS_ALLOWED_ORIGINS");

    Ok(config)
}

/// Parse a voice preset name.
pub(crate) fn parse_voice(name: &str, value: &str) -> Result<VoicePreset, ConfigError> {
    VoicePreset::parse(value).ok_or_else(|| ConfigError::InvalidValue {
        name: name.to_string(),
        value: value.to_string(),
        reason: format!(
            "unknown voice, expected one of: {}",
            VoicePreset::all()
                .iter()
                .map(|voice| voice.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    })
}
