//! Merging YAML configuration over environment configuration.

use std::path::PathBuf;

use crate::core::realtime::gemini::normalize_model_name;

use super::env::{from_env, parse_voice};
use super::yaml::YamlConfig;
use super::{ConfigError, ServerConfig};

/// Load the environment configuration and apply YAML overrides on top.
pub(crate) fn merge_config(yaml: Option<YamlConfig>) -> Result<ServerConfig, ConfigError> {
    let mut config = from_env()?;

    let Some(yaml) = yaml else {
        return Ok(config);
    };

    if let Some(server) = yaml.server {
        if let Some(host) = server.host {
            config.host = host;
        }
        if let Some(port) = server.port {
            config.port = port;
        }
        if let Some(interval) = server.keepalive_interval_seconds {
            config.keepalive_interval_seconds = interval;
        }
        if let Some(timeout) = server.keepalive_timeout_seconds {
            config.keepalive_timeout_seconds = timeout;
        }
    }

    if let Some(providers) = yaml.providers
        && let Some(key) = providers.google_api_key
    {
        config.google_api_key = Some(key);
    }

    if let Some(gemini) = yaml.gemini {
        if let Some(model) = gemini.model {
            config.gemini.model = normalize_model_name(&model);
        }
        if let Some(endpoint) = gemini.endpoint {
            config.gemini.endpoint = endpoint;
        }
        if let Some(voice) = gemini.voice {
            config.gemini.voice = parse_voice("gemini.voice", &voice)?;
        }
        if let Some(language_code) = gemini.language_code {
            config.gemini.language_code = language_code;
        }
        if let Some(instruction) = gemini.system_instruction {
            config.gemini.system_instruction = instruction;
        }
        if let Some(timeout) = gemini.setup_timeout_seconds {
            config.gemini.setup_timeout_seconds = timeout;
        }
        if let Some(enabled) = gemini.transcribe_input {
            config.gemini.transcribe_input = enabled;
        }
    }

    if let Some(session) = yaml.session
        && let Some(path) = session.handle_path
    {
        config.session_handle_path = PathBuf::from(path);
    }

    if let Some(security) = yaml.security {
        if let Some(max) = security.max_websocket_connections {
            config.max_websocket_connections = Some(max);
        }
        if let Some(origins) = security.cors_allowed_origins {
            config.cors_allowed_origins = Some(origins);
        }
    }

    Ok(config)
}
