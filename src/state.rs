//! Shared application state.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::core::realtime::{BoxedConnector, GeminiLiveConnector};
use crate::core::registry::ConnectionRegistry;
use crate::core::session_store::SessionHandleStore;
use crate::errors::AppResult;
use crate::handlers::relay::SessionDefaults;

/// State shared by every request handler.
///
/// Built once at startup and passed to handlers explicitly; nothing here is
/// process-global.
pub struct AppState {
    pub config: ServerConfig,
    pub registry: ConnectionRegistry,
    pub session_store: Arc<SessionHandleStore>,
    pub connector: BoxedConnector,
}

impl AppState {
    /// Assemble state from already-built parts.
    pub fn new(
        config: ServerConfig,
        connector: BoxedConnector,
        session_store: Arc<SessionHandleStore>,
    ) -> Arc<Self> {
        let registry = ConnectionRegistry::new(config.max_websocket_connections);
        Arc::new(Self {
            config,
            registry,
            session_store,
            connector,
        })
    }

    /// Build state for serving: opens the handle store and the Gemini connector.
    pub fn from_config(config: ServerConfig) -> AppResult<Arc<Self>> {
        let connector = GeminiLiveConnector::new(config.gemini_settings()?)?;
        let session_store = Arc::new(SessionHandleStore::open(&config.session_handle_path));
        Ok(Self::new(config, Arc::new(connector), session_store))
    }

    /// Session defaults taken from configuration.
    pub fn session_defaults(&self) -> SessionDefaults {
        SessionDefaults {
            voice: self.config.gemini.voice,
            language_code: self.config.gemini.language_code.clone(),
            system_instruction: self.config.gemini.system_instruction.clone(),
        }
    }
}
