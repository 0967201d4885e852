//! Relay session coordinator.
//!
//! One [`RelaySession`] drives one client connection:
//!
//! 1. read the setup frame
//! 2. open the upstream session, resuming from the last persisted handle
//! 3. run the inbound and outbound relays as two tasks
//! 4. when either finishes, cancel the other, close upstream and ask the
//!    writer to close the client connection
//!
//! Registry bookkeeping is owned by the caller through a
//! [`ConnectionGuard`](crate::core::registry::ConnectionGuard).

use std::fmt;
use std::fmt::Display;
use std::sync::Arc;

use axum::extract::ws::Message;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::core::realtime::{LiveConfig, RealtimeConnector, VoicePreset};
use crate::core::session_store::SessionHandleStore;

use super::inbound::{self, InboundExit};
use super::messages::{
    ClientNotification, ERROR_INVALID_SETUP, ERROR_UPSTREAM_CONNECT, RelayMessageRoute,
    SessionSetup,
};
use super::outbound::{self, OutboundExit};

/// Configured defaults the client setup frame may override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDefaults {
    pub voice: VoicePreset,
    pub language_code: String,
    pub system_instruction: String,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        let config = LiveConfig::default();
        Self {
            voice: config.voice,
            language_code: config.language_code,
            system_instruction: config.system_instruction,
        }
    }
}

impl SessionDefaults {
    /// Build the upstream configuration for a session.
    pub fn live_config(&self, setup: &SessionSetup, resume_handle: Option<String>) -> LiveConfig {
        LiveConfig {
            voice: setup.voice_preset().unwrap_or(self.voice),
            language_code: setup
                .language_code
                .clone()
                .filter(|code| !code.trim().is_empty())
                .unwrap_or_else(|| self.language_code.clone()),
            system_instruction: setup
                .system_instruction
                .clone()
                .unwrap_or_else(|| self.system_instruction.clone()),
            resume_handle,
            ..Default::default()
        }
    }
}

/// How a relay session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// Client closed its connection
    ClientClosed,
    /// Client transport failed
    ClientError(String),
    /// Upstream ended the conversation
    UpstreamClosed,
    /// Upstream transport failed
    UpstreamError(String),
    /// The setup frame was unusable
    SetupFailed(String),
    /// The upstream session could not be opened
    ConnectFailed(String),
    /// The session was cancelled from outside
    Shutdown,
    /// A relay task panicked
    TaskFailed(String),
}

impl SessionEnd {
    pub fn is_error(&self) -> bool {
        !matches!(self, Self::ClientClosed | Self::UpstreamClosed | Self::Shutdown)
    }
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientClosed => write!(f, "client closed"),
            Self::ClientError(e) => write!(f, "client error: {e}"),
            Self::UpstreamClosed => write!(f, "upstream closed"),
            Self::UpstreamError(e) => write!(f, "upstream error: {e}"),
            Self::SetupFailed(e) => write!(f, "setup failed: {e}"),
            Self::ConnectFailed(e) => write!(f, "upstream connect failed: {e}"),
            Self::Shutdown => write!(f, "shutdown"),
            Self::TaskFailed(e) => write!(f, "relay task failed: {e}"),
        }
    }
}

impl From<InboundExit> for SessionEnd {
    fn from(exit: InboundExit) -> Self {
        match exit {
            InboundExit::ClientClosed => Self::ClientClosed,
            InboundExit::ClientError(e) => Self::ClientError(e),
        }
    }
}

impl From<OutboundExit> for SessionEnd {
    fn from(exit: OutboundExit) -> Self {
        match exit {
            OutboundExit::UpstreamClosed => Self::UpstreamClosed,
            OutboundExit::UpstreamError(e) => Self::UpstreamError(e.to_string()),
            OutboundExit::ClientGone => Self::ClientClosed,
        }
    }
}

fn from_join<T: Into<SessionEnd>>(result: Result<T, JoinError>) -> SessionEnd {
    match result {
        Ok(exit) => exit.into(),
        Err(e) => SessionEnd::TaskFailed(e.to_string()),
    }
}

/// Outcome of waiting for the setup frame.
enum SetupFrame {
    Received(SessionSetup),
    Invalid(String),
    Closed,
    Failed(String),
}

/// One client connection relayed to one upstream session.
pub struct RelaySession {
    id: Uuid,
    connector: Arc<dyn RealtimeConnector>,
    store: Arc<SessionHandleStore>,
    defaults: SessionDefaults,
    shutdown: CancellationToken,
}

impl RelaySession {
    pub fn new(
        id: Uuid,
        connector: Arc<dyn RealtimeConnector>,
        store: Arc<SessionHandleStore>,
        defaults: SessionDefaults,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            id,
            connector,
            store,
            defaults,
            shutdown,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Run the session to completion.
    ///
    /// `incoming` is the client's read half. `outgoing` feeds the task that
    /// owns the client's write half; a `Close` route is always sent last.
    pub async fn run<S, E>(
        self,
        incoming: S,
        outgoing: mpsc::Sender<RelayMessageRoute>,
    ) -> SessionEnd
    where
        S: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
        E: Display + Send + 'static,
    {
        let session_id = self.id;
        let end = self.relay(incoming, &outgoing).await;

        if end.is_error() {
            warn!(%session_id, reason = %end, "Relay session ended");
        } else {
            info!(%session_id, reason = %end, "Relay session ended");
        }

        let _ = outgoing.send(RelayMessageRoute::Close).await;
        end
    }

    async fn relay<S, E>(
        &self,
        mut incoming: S,
        outgoing: &mpsc::Sender<RelayMessageRoute>,
    ) -> SessionEnd
    where
        S: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
        E: Display + Send + 'static,
    {
        let session_id = self.id;

        let setup = tokio::select! {
            _ = self.shutdown.cancelled() => return SessionEnd::Shutdown,
            frame = read_setup(&mut incoming) => frame,
        };

        let setup = match setup {
            SetupFrame::Received(setup) => setup,
            SetupFrame::Invalid(reason) => {
                warn!(%session_id, "Rejecting session setup: {}", reason);
                let _ = outgoing
                    .send(RelayMessageRoute::Outgoing(ClientNotification::error(
                        ERROR_INVALID_SETUP,
                        reason.clone(),
                    )))
                    .await;
                return SessionEnd::SetupFailed(reason);
            }
            SetupFrame::Closed => return SessionEnd::ClientClosed,
            SetupFrame::Failed(e) => return SessionEnd::ClientError(e),
        };

        let config = self.defaults.live_config(&setup, self.store.current());
        info!(
            %session_id,
            voice = %config.voice,
            language = %config.language_code,
            resuming = config.resume_handle.is_some(),
            "Opening upstream session"
        );

        let opened = tokio::select! {
            _ = self.shutdown.cancelled() => return SessionEnd::Shutdown,
            opened = self.connector.open(config) => opened,
        };

        let upstream = match opened {
            Ok(upstream) => upstream,
            Err(e) => {
                error!(%session_id, provider = self.connector.provider_name(), "Failed to open upstream session: {}", e);
                let _ = outgoing
                    .send(RelayMessageRoute::Outgoing(ClientNotification::error(
                        ERROR_UPSTREAM_CONNECT,
                        e.to_string(),
                    )))
                    .await;
                return SessionEnd::ConnectFailed(e.to_string());
            }
        };

        let (sender, events, handle) = upstream.split();

        let mut inbound_task = tokio::spawn(inbound::run(incoming, sender, session_id));
        let mut outbound_task = tokio::spawn(outbound::run(
            events,
            outgoing.clone(),
            self.store.clone(),
            session_id,
        ));

        let end = tokio::select! {
            result = &mut inbound_task => {
                outbound_task.abort();
                let _ = outbound_task.await;
                from_join(result)
            }
            result = &mut outbound_task => {
                inbound_task.abort();
                let _ = inbound_task.await;
                from_join(result)
            }
            _ = self.shutdown.cancelled() => {
                inbound_task.abort();
                outbound_task.abort();
                let _ = inbound_task.await;
                let _ = outbound_task.await;
                SessionEnd::Shutdown
            }
        };

        handle.close();
        debug!(%session_id, "Upstream session closed");
        end
    }
}

async fn read_setup<S, E>(incoming: &mut S) -> SetupFrame
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    while let Some(msg) = incoming.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                return match SessionSetup::parse(text.as_str()) {
                    Ok(setup) => SetupFrame::Received(setup),
                    Err(reason) => SetupFrame::Invalid(reason),
                };
            }
            Ok(Message::Close(_)) => return SetupFrame::Closed,
            Ok(_) => continue,
            Err(e) => return SetupFrame::Failed(e.to_string()),
        }
    }
    SetupFrame::Closed
}
