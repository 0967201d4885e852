//! Gemini Live API configuration types.

use std::fmt;
use std::time::Duration;

use zeroize::Zeroize;

use crate::core::realtime::base::{RealtimeError, RealtimeResult};

/// Gemini Live bidirectional streaming endpoint.
pub const GEMINI_LIVE_URL: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// Default native-audio dialog model.
pub const DEFAULT_GEMINI_MODEL: &str = "models/gemini-2.5-flash-preview-native-audio-dialog";

/// Default time allowed for the upstream to acknowledge setup.
pub const DEFAULT_SETUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Prefix every model resource name carries on the wire.
const MODEL_PREFIX: &str = "models/";

/// Ensure the model name carries the `models/` resource prefix.
pub fn normalize_model_name(model: &str) -> String {
    let model = model.trim();
    if model.starts_with(MODEL_PREFIX) {
        model.to_string()
    } else {
        format!("{MODEL_PREFIX}{model}")
    }
}

/// Connection settings for the Gemini Live adapter.
///
/// Per-conversation options (voice, language, instruction, resume handle)
/// live in [`LiveConfig`](crate::core::realtime::LiveConfig); these settings
/// are fixed for the lifetime of the process.
#[derive(Clone)]
pub struct GeminiLiveSettings {
    /// API key appended to the endpoint as the `key` query parameter
    pub api_key: String,
    /// WebSocket endpoint
    pub endpoint: String,
    /// Model resource name, always `models/`-prefixed
    pub model: String,
    /// Time allowed for `setupComplete` to arrive
    pub setup_timeout: Duration,
    /// Request transcription of the user's speech
    pub transcribe_input: bool,
}

impl GeminiLiveSettings {
    /// Create settings with the default endpoint and model.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: GEMINI_LIVE_URL.to_string(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            setup_timeout: DEFAULT_SETUP_TIMEOUT,
            transcribe_input: true,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = normalize_model_name(model);
        self
    }

    pub fn with_setup_timeout(mut self, timeout: Duration) -> Self {
        self.setup_timeout = timeout;
        self
    }

    pub fn with_input_transcription(mut self, enabled: bool) -> Self {
        self.transcribe_input = enabled;
        self
    }

    /// Check that the settings can be used to open a connection.
    pub fn validate(&self) -> RealtimeResult<()> {
        if self.api_key.trim().is_empty() {
            return Err(RealtimeError::AuthenticationFailed(
                "Gemini API key is empty".to_string(),
            ));
        }
        if !(self.endpoint.starts_with("wss://") || self.endpoint.starts_with("ws://")) {
            return Err(RealtimeError::InvalidConfiguration(format!(
                "endpoint must be a ws:// or wss:// URL, got '{}'",
                self.endpoint
            )));
        }
        if self.setup_timeout.is_zero() {
            return Err(RealtimeError::InvalidConfiguration(
                "setup timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for GeminiLiveSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiLiveSettings")
            .field("api_key", &"[REDACTED]")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("setup_timeout", &self.setup_timeout)
            .field("transcribe_input", &self.transcribe_input)
            .finish()
    }
}

impl Drop for GeminiLiveSettings {
    fn drop(&mut self) {
        self.api_key.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_model_name() {
        assert_eq!(
            normalize_model_name("gemini-2.0-flash-live-001"),
            "models/gemini-2.0-flash-live-001"
        );
        assert_eq!(
            normalize_model_name("models/gemini-2.0-flash-live-001"),
            "models/gemini-2.0-flash-live-001"
        );
        assert_eq!(normalize_model_name("  custom "), "models/custom");
    }

    #[test]
    fn test_settings_defaults() {
        let settings = GeminiLiveSettings::new("key");
        assert_eq!(settings.endpoint, GEMINI_LIVE_URL);
        assert_eq!(settings.model, DEFAULT_GEMINI_MODEL);
        assert_eq!(settings.setup_timeout, DEFAULT_SETUP_TIMEOUT);
        assert!(settings.transcribe_input);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_settings_validation() {
        let settings = GeminiLiveSettings::new("   ");
        assert!(matches!(
            settings.validate(),
            Err(RealtimeError::AuthenticationFailed(_))
        ));

        let settings = GeminiLiveSettings::new("key").with_endpoint("https://example.com");
        assert!(matches!(
            settings.validate(),
            Err(RealtimeError::InvalidConfiguration(_))
        ));

        let settings = GeminiLiveSettings::new("key").with_setup_timeout(Duration::ZERO);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let settings = GeminiLiveSettings::new("super-secret");
        let debug = format!("{settings:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_with_model_normalizes() {
        let settings = GeminiLiveSettings::new("key").with_model("gemini-live-2.5-flash");
        assert_eq!(settings.model, "models/gemini-live-2.5-flash");
    }
}
