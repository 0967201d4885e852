//! Application-level errors.

use thiserror::Error;

use crate::config::ConfigError;
use crate::core::realtime::RealtimeError;

/// Errors surfaced while building or running the application.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Upstream provider error: {0}")]
    Realtime(#[from] RealtimeError),
}

pub type AppResult<T> = Result<T, AppError>;
