use serde::Deserialize;
use std::path::Path;

use super::ConfigError;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present in
/// the file override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 8080
///   keepalive_interval_seconds: 20
///   keepalive_timeout_seconds: 20
///
/// providers:
///   google_api_key: "your-google-api-key"
///
/// gemini:
///   model: "models/gemini-2.5-flash-preview-native-audio-dialog"
///   voice: "Kore"
///   language_code: "en-US"
///   system_instruction: "You are a helpful assistant."
///   setup_timeout_seconds: 10
///   transcribe_input: true
///
/// session:
///   handle_path: "session_handle.json"
///
/// security:
///   max_websocket_connections: 100
///   cors_allowed_origins: "https://askademia.example.com"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub providers: Option<ProvidersYaml>,
    pub gemini: Option<GeminiYaml>,
    pub session: Option<SessionYaml>,
    pub security: Option<SecurityYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub keepalive_interval_seconds: Option<u64>,
    pub keepalive_timeout_seconds: Option<u64>,
}

/// Provider credentials from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ProvidersYaml {
    /// Google AI Studio API key for Gemini Live
    pub google_api_key: Option<String>,
}

/// Gemini Live session options from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GeminiYaml {
    pub model: Option<String>,
    pub endpoint: Option<String>,
    pub voice: Option<String>,
    pub language_code: Option<String>,
    pub system_instruction: Option<String>,
    pub setup_timeout_seconds: Option<u64>,
    pub transcribe_input: Option<bool>,
}

/// Session persistence from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SessionYaml {
    pub handle_path: Option<String>,
}

/// Security settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    pub max_websocket_connections: Option<usize>,
    pub cors_allowed_origins: Option<String>,
}

impl YamlConfig {
    /// Load YAML configuration from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        serde_yaml::from_str(&contents).map_err(ConfigError::Parse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_yaml_config_full() {
        let yaml = r#"
server:
  host: "127.0.0.1"
  port: 9000
  keepalive_interval_seconds: 15
  keepalive_timeout_seconds: 5

providers:
  google_api_key: "yaml-google-key"

gemini:
  model: "gemini-live-2.5-flash"
  endpoint: "ws://localhost:9999/live"
  voice: "Puck"
  language_code: "de-DE"
  system_instruction: "Antworte kurz."
  setup_timeout_seconds: 3
  transcribe_input: false

session:
  handle_path: "/var/lib/askademia/handle.json"

security:
  max_websocket_connections: 50
  cors_allowed_origins: "*"
"#;

        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();

        let server = config.server.unwrap();
        assert_eq!(server.host.as_deref(), Some("127.0.0.1"));
        assert_eq!(server.port, Some(9000));
        assert_eq!(server.keepalive_interval_seconds, Some(15));
        assert_eq!(server.keepalive_timeout_seconds, Some(5));

        let providers = config.providers.unwrap();
        assert_eq!(providers.google_api_key.as_deref(), Some("yaml-google-key"));

        let gemini = config.gemini.unwrap();
        assert_eq!(gemini.model.as_deref(), Some("gemini-live-2.5-flash"));
        assert_eq!(gemini.voice.as_deref(), Some("Puck"));
        assert_eq!(gemini.setup_timeout_seconds, Some(3));
        assert_eq!(gemini.transcribe_input, Some(false));

        assert_eq!(
            config.session.unwrap().handle_path.as_deref(),
            Some("/var/lib/askademia/handle.json")
        );

        let security = config.security.unwrap();
        assert_eq!(security.max_websocket_connections, Some(50));
        assert_eq!(security.cors_allowed_origins.as_deref(), Some("*"));
    }

    #[test]
    fn test_yaml_config_partial() {
        let config: YamlConfig = serde_yaml::from_str("server:\n  port: 4000\n").unwrap();
        assert_eq!(config.server.unwrap().port, Some(4000));
        assert!(config.gemini.is_none());
        assert!(config.providers.is_none());
    }

    #[test]
    fn test_yaml_config_empty() {
        let config: YamlConfig = serde_yaml::from_str("{}").unwrap();
        assert!(config.server.is_none());
        assert!(config.session.is_none());
    }

    #[test]
    fn test_from_file_errors() {
        let temp_dir = TempDir::new().unwrap();

        let missing = temp_dir.path().join("missing.yaml");
        let err = YamlConfig::from_file(&missing).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));

        let invalid = temp_dir.path().join("invalid.yaml");
        fs::write(&invalid, "server: [unclosed").unwrap();
        let err = YamlConfig::from_file(&invalid).unwrap_err();
        assert!(err.to_string().contains("Failed to parse YAML"));
    }
}
