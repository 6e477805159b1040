use thiserror::Error;
use validator::ValidationErrors;

use crate::{dao::storage::StorageError, services::scoring_api::ApiError};

/// Errors surfaced by the data manager.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The durable queue could not be opened or written; the score may be lost.
    #[error("pending score storage failed")]
    Storage(#[from] StorageError),
    /// The scoring server could not be reached or answered with an error status.
    #[error("scoring server unreachable")]
    Transport(#[source] ApiError),
    /// The scoring server answered with a payload we could not understand.
    #[error("scoring server sent an unexpected response")]
    Protocol(#[source] ApiError),
    /// The caller handed over an update that can never be stored.
    #[error("invalid score update: {0}")]
    InvalidUpdate(String),
}

impl SyncError {
    /// Network-side failures are retried through the offline queue; storage failures are not.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SyncError::Transport(_) | SyncError::Protocol(_))
    }
}

impl From<ApiError> for SyncError {
    fn from(err: ApiError) -> Self {
        if err.is_protocol() {
            SyncError::Protocol(err)
        } else {
            SyncError::Transport(err)
        }
    }
}

impl From<ValidationErrors> for SyncError {
    fn from(err: ValidationErrors) -> Self {
        SyncError::InvalidUpdate(format!("validation failed: {err}"))
    }
}
