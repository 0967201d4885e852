//! Persistent storage for the session resumption handle.
//!
//! A single handle is kept in a small JSON record on disk:
//!
//! ```json
//! {"previous_session_handle": "<opaque handle>"}
//! ```
//!
//! The record is read once when the store is opened and cached in memory.
//! Every save replaces the cache first and then the file, using a temporary
//! file plus rename so concurrent readers never observe a partial write.
//! Last write wins.

use std::io;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default location of the handle record.
pub const DEFAULT_SESSION_HANDLE_PATH: &str = "session_handle.json";

/// Errors raised by the handle store.
#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("I/O error on session handle file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to serialize session handle: {0}")]
    Json(#[from] serde_json::Error),
}

pub type SessionStoreResult<T> = Result<T, SessionStoreError>;

/// On-disk record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHandleRecord {
    #[serde(default)]
    pub previous_session_handle: Option<String>,
}

/// Process-wide store for the most recent resumable handle.
#[derive(Debug)]
pub struct SessionHandleStore {
    path: PathBuf,
    current: RwLock<Option<String>>,
}

impl SessionHandleStore {
    /// Open the store, loading any previously persisted handle.
    ///
    /// A missing, empty or unreadable record yields a store with no handle;
    /// the conversation then simply starts fresh.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let current = load_handle(&path);

        match &current {
            Some(_) => tracing::info!(path = %path.display(), "Loaded previous session handle"),
            None => tracing::info!(path = %path.display(), "No previous session handle, starting fresh"),
        }

        Self {
            path,
            current: RwLock::new(current),
        }
    }

    /// Path of the backing record.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The handle a new session should resume from, if any.
    pub fn current(&self) -> Option<String> {
        self.current.read().clone()
    }

    /// Persist a new handle, replacing the previous one.
    ///
    /// Empty handles are ignored.
    pub async fn save(&self, handle: &str) -> SessionStoreResult<()> {
        if handle.is_empty() {
            return Ok(());
        }

        *self.current.write() = Some(handle.to_string());

        let record = SessionHandleRecord {
            previous_session_handle: Some(handle.to_string()),
        };
        let json = serde_json::to_vec_pretty(&record)?;
        self.write_atomic(&json).await?;

        tracing::debug!(path = %self.path.display(), "Persisted session handle");
        Ok(())
    }

    /// Forget the persisted handle so the next session starts fresh.
    pub async fn clear(&self) -> SessionStoreResult<()> {
        *self.current.write() = None;

        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                tracing::info!(path = %self.path.display(), "Cleared session handle");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(SessionStoreError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    async fn write_atomic(&self, contents: &[u8]) -> SessionStoreResult<()> {
        let tmp_path = self.temp_path();

        if let Err(source) = tokio::fs::write(&tmp_path, contents).await {
            return Err(SessionStoreError::Io {
                path: tmp_path,
                source,
            });
        }

        if let Err(source) = tokio::fs::rename(&tmp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(SessionStoreError::Io {
                path: self.path.clone(),
                source,
            });
        }

        Ok(())
    }

    /// Unique sibling path so concurrent writers never share a temp file.
    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_SESSION_HANDLE_PATH.to_string());
        self.path
            .with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()))
    }
}

fn load_handle(path: &Path) -> Option<String> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!(path = %path.display(), "Failed to read session handle file: {}", e);
            return None;
        }
    };

    if contents.trim().is_empty() {
        return None;
    }

    match serde_json::from_str::<SessionHandleRecord>(&contents) {
        Ok(record) => record
            .previous_session_handle
            .filter(|handle| !handle.is_empty()),
        Err(e) => {
            tracing::warn!(path = %path.display(), "Ignoring corrupt session handle file: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> SessionHandleStore {
        SessionHandleStore::open(dir.path().join("session_handle.json"))
    }

    #[test]
    fn test_open_missing_file() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(store.current().is_none());
    }

    #[test]
    fn test_open_existing_record() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session_handle.json");
        std::fs::write(&path, r#"{"previous_session_handle": "abc"}"#).unwrap();

        let store = SessionHandleStore::open(&path);
        assert_eq!(store.current().as_deref(), Some("abc"));
    }

    #[test]
    fn test_open_corrupt_or_empty_record() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session_handle.json");

        std::fs::write(&path, "{not json").unwrap();
        assert!(SessionHandleStore::open(&path).current().is_none());

        std::fs::write(&path, "").unwrap();
        assert!(SessionHandleStore::open(&path).current().is_none());

        std::fs::write(&path, r#"{"previous_session_handle": null}"#).unwrap();
        assert!(SessionHandleStore::open(&path).current().is_none());

        std::fs::write(&path, r#"{"previous_session_handle": ""}"#).unwrap();
        assert!(SessionHandleStore::open(&path).current().is_none());
    }

    #[tokio::test]
    async fn test_save_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.save("handle-1").await.unwrap();
        assert_eq!(store.current().as_deref(), Some("handle-1"));

        store.save("handle-2").await.unwrap();
        let reopened = store_in(&dir);
        assert_eq!(reopened.current().as_deref(), Some("handle-2"));

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let record: SessionHandleRecord = serde_json::from_str(&raw).unwrap();
        assert_eq!(record.previous_session_handle.as_deref(), Some("handle-2"));
    }

    #[tokio::test]
    async fn test_save_ignores_empty_handle() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.save("keep").await.unwrap();
        store.save("").await.unwrap();
        assert_eq!(store.current().as_deref(), Some("keep"));
        assert_eq!(store_in(&dir).current().as_deref(), Some("keep"));
    }

    #[tokio::test]
    async fn test_clear() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        // Clearing a store that never saved is fine.
        store.clear().await.unwrap();

        store.save("handle").await.unwrap();
        store.clear().await.unwrap();
        assert!(store.current().is_none());
        assert!(!store.path().exists());
        assert!(store_in(&dir).current().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_saves_leave_valid_record() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(store_in(&dir));

        let mut tasks = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store.save(&format!("handle-{i}")).await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let reopened = store_in(&dir);
        let handle = reopened.current().unwrap();
        assert!(handle.starts_with("handle-"));

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_save_reports_io_error() {
        let dir = TempDir::new().unwrap();
        let store = SessionHandleStore::open(dir.path().join("missing").join("handle.json"));

        let err = store.save("h").await.unwrap_err();
        assert!(matches!(err, SessionStoreError::Io { .. }));
        // The in-memory handle is still updated.
        assert_eq!(store.current().as_deref(), Some("h"));
    }
}
