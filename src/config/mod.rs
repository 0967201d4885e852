//! Configuration module for the Askademia gateway
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//! - `utils`: Utility functions for configuration parsing
//!
//! # Example
//! ```rust,no_run
//! use askademia_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config = ServerConfig::from_file(&PathBuf::from("config.yaml"))?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

mod env;
mod merge;
mod utils;
mod validation;
mod yaml;

pub use yaml::YamlConfig;

use crate::core::realtime::gemini::{DEFAULT_GEMINI_MODEL, GEMINI_LIVE_URL, GeminiLiveSettings};
use crate::core::realtime::{LiveConfig, VoicePreset};
use crate::core::session_store::DEFAULT_SESSION_HANDLE_PATH;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid value '{value}' for {name}: {reason}")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Invalid configuration: {0}")]
    Validation(String),

    #[error("GOOGLE_API_KEY is not set (or providers.google_api_key in the config file)")]
    MissingApiKey,
}

/// Gemini Live settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeminiConfig {
    /// Model resource name (`models/` prefixed)
    pub model: String,
    /// Live API WebSocket endpoint
    pub endpoint: String,
    /// Default voice when the client does not pick one
    pub voice: VoicePreset,
    /// Default BCP-47 language code
    pub language_code: String,
    /// Default system instruction
    pub system_instruction: String,
    /// Seconds allowed for the upstream to acknowledge setup
    pub setup_timeout_seconds: u64,
    /// Ask the upstream to transcribe the user's speech
    pub transcribe_input: bool,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        let live = LiveConfig::default();
        Self {
            model: DEFAULT_GEMINI_MODEL.to_string(),
            endpoint: GEMINI_LIVE_URL.to_string(),
            voice: live.voice,
            language_code: live.language_code,
            system_instruction: live.system_instruction,
            setup_timeout_seconds: 10,
            transcribe_input: true,
        }
    }
}

/// Server configuration
///
/// Contains all configuration needed to run the relay:
/// - Listen address and keepalive timing
/// - Google API key for Gemini Live
/// - Gemini session defaults
/// - Location of the persisted session resumption handle
/// - Security settings (CORS, connection limits)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    /// Seconds between WebSocket pings sent to clients
    pub keepalive_interval_seconds: u64,
    /// Extra seconds of silence tolerated after a ping before the client is dropped
    pub keepalive_timeout_seconds: u64,

    /// Google AI Studio API key
    pub google_api_key: Option<String>,

    pub gemini: GeminiConfig,

    /// JSON file holding the last resumable session handle
    pub session_handle_path: PathBuf,

    // Security settings
    /// Maximum concurrent WebSocket connections (None = unlimited)
    pub max_websocket_connections: Option<usize>,
    /// Comma-separated allowed origins, or "*" for any
    pub cors_allowed_origins: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            keepalive_interval_seconds: 20,
            keepalive_timeout_seconds: 20,
            google_api_key: None,
            gemini: GeminiConfig::default(),
            session_handle_path: PathBuf::from(DEFAULT_SESSION_HANDLE_PATH),
            max_websocket_connections: None,
            cors_allowed_origins: None,
        }
    }
}

/// Zeroize the API key when the configuration is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.google_api_key {
            key.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables only.
    ///
    /// The .env file is loaded in main.rs at application startup, so its
    /// values are visible here as ordinary environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = merge::merge_config(None)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let yaml_config = YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The Google API key, required to serve.
    pub fn require_google_api_key(&self) -> Result<&str, ConfigError> {
        self.google_api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)
    }

    /// Settings for the Gemini Live connector.
    pub fn gemini_settings(&self) -> Result<GeminiLiveSettings, ConfigError> {
        let api_key = self.require_google_api_key()?;
        Ok(GeminiLiveSettings::new(api_key)
            .with_endpoint(self.gemini.endpoint.clone())
            .with_model(&self.gemini.model)
            .with_setup_timeout(Duration::from_secs(self.gemini.setup_timeout_seconds))
            .with_input_transcription(self.gemini.transcribe_input))
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_seconds)
    }

    pub fn keepalive_timeout(&self) -> Duration {
        Duration::from_secs(self.keepalive_timeout_seconds)
    }
}
