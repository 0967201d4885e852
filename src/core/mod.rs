pub mod realtime;
pub mod registry;
pub mod session_store;

// Re-export commonly used types for convenience
pub use realtime::{
    BoxedConnector, GeminiLiveConnector, GeminiLiveSettings, LiveConfig, RealtimeConnector,
    RealtimeError, RealtimeResult, UpstreamEvent, UpstreamSession,
};

pub use registry::{ConnectionGuard, ConnectionRegistry, RegistryError, SessionInfo};

pub use session_store::{SessionHandleStore, SessionStoreError};
