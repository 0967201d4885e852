//! Configuration validation.

use super::{ConfigError, ServerConfig};

/// Validate a merged configuration.
pub(crate) fn validate(config: &ServerConfig) -> Result<(), ConfigError> {
    if config.host.trim().is_empty() {
        return Err(ConfigError::Validation("host must not be empty".to_string()));
    }
    if config.port == 0 {
        return Err(ConfigError::Validation("port must be non-zero".to_string()));
    }
    if config.keepalive_interval_seconds == 0 {
        return Err(ConfigError::Validation(
            "keepalive_interval_seconds must be greater than zero".to_string(),
        ));
    }
    if config.keepalive_timeout_seconds == 0 {
        return Err(ConfigError::Validation(
            "keepalive_timeout_seconds must be greater than zero".to_string(),
        ));
    }
    if config.gemini.setup_timeout_seconds == 0 {
        return Err(ConfigError::Validation(
            "gemini setup_timeout_seconds must be greater than zero".to_string(),
        ));
    }
    if !(config.gemini.endpoint.starts_with("wss://") || config.gemini.endpoint.starts_with("ws://"))
    {
        return Err(ConfigError::Validation(format!(
            "gemini endpoint must be a ws:// or wss:// URL, got '{}'",
            config.gemini.endpoint
        )));
    }
    if config.max_websocket_connections == Some(0) {
        return Err(ConfigError::Validation(
            "max_websocket_connections must be greater than zero when set".to_string(),
        ));
    }
    if config.session_handle_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "session handle path must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn test_rejects_zero_values() {
        let mut config = ServerConfig::default();
        config.port = 0;
        assert!(validate(&config).is_err());

        let mut config = ServerConfig::default();
        config.keepalive_interval_seconds = 0;
        assert!(validate(&config).is_err());

        let mut config = ServerConfig::default();
        config.keepalive_timeout_seconds = 0;
        assert!(validate(&config).is_err());

        let mut config = ServerConfig::default();
        config.gemini.setup_timeout_seconds = 0;
        assert!(validate(&config).is_err());

        let mut config = ServerConfig::default();
        config.max_websocket_connections = Some(0);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_rejects_non_websocket_endpoint() {
        let mut config = ServerConfig::default();
        config.gemini.endpoint = "https://generativelanguage.googleapis.com".to_string();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("ws://"));
    }
}
