//! Registry of live relay sessions.
//!
//! Created once at startup and shared through application state. Each client
//! connection registers on connect and holds a [`ConnectionGuard`]; dropping
//! the guard deregisters it, so cleanup happens on every exit path.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use dashmap::DashMap;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Connection limit reached ({0} active sessions)")]
    CapacityReached(usize),
}

/// Snapshot of a registered session.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub id: Uuid,
    pub peer: Option<SocketAddr>,
    pub connected_at: Instant,
}

#[derive(Debug)]
struct RegistryInner {
    sessions: DashMap<Uuid, SessionInfo>,
    active: AtomicUsize,
    max_sessions: Option<usize>,
    shutdown: CancellationToken,
}

/// Tracks every connected client.
///
/// The active counter is reserved before insertion so the capacity check and
/// the insert cannot race.
#[derive(Debug, Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RegistryInner>,
}

impl ConnectionRegistry {
    /// Create a registry. `None` means unlimited.
    pub fn new(max_sessions: Option<usize>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                sessions: DashMap::new(),
                active: AtomicUsize::new(0),
                max_sessions,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Register a new connection.
    pub fn register(&self, peer: Option<SocketAddr>) -> Result<ConnectionGuard, RegistryError> {
        let max = self.inner.max_sessions;
        let reserved = self
            .inner
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| match max {
                Some(max) if current >= max => None,
                _ => Some(current + 1),
            });

        if let Err(current) = reserved {
            tracing::warn!(
                active = current,
                "Session registry at capacity, rejecting connection"
            );
            return Err(RegistryError::CapacityReached(current));
        }

        let id = Uuid::new_v4();
        self.inner.sessions.insert(
            id,
            SessionInfo {
                id,
                peer,
                connected_at: Instant::now(),
            },
        );

        tracing::debug!(session_id = %id, active = self.len(), "Registered session");

        Ok(ConnectionGuard {
            id,
            shutdown: self.inner.shutdown.child_token(),
            registry: self.clone(),
        })
    }

    fn unregister(&self, id: &Uuid) {
        if self.inner.sessions.remove(id).is_some() {
            self.inner.active.fetch_sub(1, Ordering::AcqRel);
            tracing::debug!(session_id = %id, active = self.len(), "Unregistered session");
        }
    }

    /// Number of active sessions.
    pub fn len(&self) -> usize {
        self.inner.active.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_sessions(&self) -> Option<usize> {
        self.inner.max_sessions
    }

    /// Whether another connection would be accepted right now.
    pub fn has_capacity(&self) -> bool {
        match self.inner.max_sessions {
            Some(max) => self.len() < max,
            None => true,
        }
    }

    /// Snapshot of the registered sessions.
    pub fn sessions(&self) -> Vec<SessionInfo> {
        self.inner
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Signal every registered session to finish.
    pub fn shutdown_all(&self) {
        let sessions = self.sessions();
        tracing::info!(active = sessions.len(), "Shutting down all sessions");
        for session in &sessions {
            tracing::debug!(
                session_id = %session.id,
                peer = ?session.peer,
                connected_for = ?session.connected_at.elapsed(),
                "Cancelling session"
            );
        }
        self.inner.shutdown.cancel();
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Registration held for the lifetime of one connection.
#[derive(Debug)]
pub struct ConnectionGuard {
    id: Uuid,
    shutdown: CancellationToken,
    registry: ConnectionRegistry,
}

impl ConnectionGuard {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Token cancelled when the registry shuts down.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.registry.unregister(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_drop() {
        let registry = ConnectionRegistry::default();
        assert!(registry.is_empty());

        let guard = registry.register(None).unwrap();
        let id = guard.id();
        assert_eq!(registry.len(), 1);
        assert!(registry.sessions().iter().any(|s| s.id == id));

        drop(guard);
        assert!(registry.is_empty());
        assert!(registry.sessions().is_empty());
    }

    #[test]
    fn test_capacity_limit() {
        let registry = ConnectionRegistry::new(Some(2));
        let first = registry.register(None).unwrap();
        let _second = registry.register(None).unwrap();
        assert!(!registry.has_capacity());

        assert_eq!(
            registry.register(None).unwrap_err(),
            RegistryError::CapacityReached(2)
        );

        drop(first);
        assert!(registry.has_capacity());
        assert!(registry.register(None).is_ok());
    }

    #[test]
    fn test_sessions_snapshot() {
        let registry = ConnectionRegistry::default();
        let peer: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        let guard = registry.register(Some(peer)).unwrap();

        let sessions = registry.sessions();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, guard.id());
        assert_eq!(sessions[0].peer, Some(peer));
    }

    #[test]
    fn test_shutdown_all_cancels_guards() {
        let registry = ConnectionRegistry::default();
        let a = registry.register(None).unwrap();
        let b = registry.register(None).unwrap();

        registry.shutdown_all();
        assert!(a.shutdown_token().is_cancelled());
        assert!(b.shutdown_token().is_cancelled());
    }

    #[tokio::test]
    async fn test_concurrent_registration_respects_limit() {
        let registry = ConnectionRegistry::new(Some(10));
        let mut tasks = Vec::new();
        for _ in 0..50 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move { registry.register(None).ok() }));
        }

        let mut guards = Vec::new();
        for task in tasks {
            if let Some(guard) = task.await.unwrap() {
                guards.push(guard);
            }
        }

        assert_eq!(guards.len(), 10);
        assert_eq!(registry.len(), 10);
        drop(guards);
        assert!(registry.is_empty());
    }
}
