//! Error types for the sync runtime.

use listsync_engine::LocalId;

/// Errors surfaced to callers of the sync runtime.
///
/// `ValidationRejected` and `NotFound` are meant for the user. `Transient`
/// only escapes from calls that bypass the queue (`fetch`); `save` absorbs it
/// by queueing.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("rejected by server (HTTP {status}): {}", .details.join("; "))]
    ValidationRejected { status: u16, details: Vec<String> },

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("line item not found: {0}")]
    NotFound(LocalId),

    #[error("queue persistence failed: {0}")]
    QueuePersistence(String),

    #[error("a submission for {0} is already in flight")]
    SubmissionInFlight(String),

    #[error("invalid server response: {0}")]
    InvalidResponse(String),

    #[error("engine error: {0}")]
    Engine(listsync_engine::Error),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}

impl From<listsync_engine::Error> for SyncError {
    fn from(err: listsync_engine::Error) -> Self {
        use listsync_engine::Error;
        match err {
            Error::NotFound(id) => SyncError::NotFound(id),
            Error::MissingServerId(_) | Error::InvalidResponse(_) | Error::DuplicateServerId(_) => {
                SyncError::InvalidResponse(err.to_string())
            }
            Error::InvalidSnapshot(_) | Error::DuplicateSequence(_) => {
                SyncError::QueuePersistence(err.to_string())
            }
            other => SyncError::Engine(other),
        }
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        SyncError::QueuePersistence(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for SyncError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        SyncError::QueuePersistence(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::QueuePersistence(err.to_string())
    }
}

impl SyncError {
    /// True for failures the user has to act on.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            SyncError::ValidationRejected { .. } | SyncError::NotFound(_)
        )
    }
}

/// Result type for runtime operations.
pub type Result<T> = std::result::Result<T, SyncError>;
