use std::time::Duration;

use updist_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("task queue is closed")]
    QueueClosed,

    #[error("task queue failure: {0}")]
    Queue(String),

    #[error("no handler registered for task type '{0}'")]
    UnknownType(String),

    #[error("malformed payload for '{task_type}': {source}")]
    Payload {
        task_type: String,
        source:    serde_json::Error,
    },

    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("task timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Patch(#[from] updist_patch::Error),

    #[error(transparent)]
    Archive(#[from] updist_archive::Error),

    #[error(transparent)]
    Verify(#[from] updist_verify::VerificationError),

    #[error(transparent)]
    Fs(#[from] updist_fs::Error),

    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl TaskError {
    /// Retrying cannot change the outcome.
    pub fn is_permanent(&self) -> bool {
        match self {
            Self::UnknownType(_) | Self::Payload { .. } => true,
            Self::Store(e) => matches!(e, StoreError::NotFound(_) | StoreError::Incomparable { .. }),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, TaskError>;
