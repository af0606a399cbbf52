use updist_cache::KeyError;
use updist_distribute::DistributeError;
use updist_resource::ResourceError;
use updist_store::StoreError;
use updist_task::TaskError;

use crate::cdk::CdkError;

/// Request-level failures.
///
/// Only client-facing variants may surface their message at a request
/// boundary; everything else is reported as a generic internal error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("license key rejected: {0}")]
    CdkRejected(String),

    #[error("daily download limit of {limit} reached")]
    RateLimited { key: String, limit: u64 },

    #[error("remote dependency failed: {0}")]
    Remote(String),

    #[error("versions are not comparable: {0}")]
    Incomparable(String),

    #[error("patch generation failed: {0}")]
    Patch(String),

    #[error(transparent)]
    Task(TaskError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn is_client_facing(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::NotFound(_) | Self::CdkRejected(_) | Self::RateLimited { .. }
        )
    }

    pub fn is_not_found(&self) -> bool { matches!(self, Self::NotFound(_)) }

    /// Message safe to return to a client.
    pub fn public_message(&self) -> String {
        if self.is_client_facing() {
            self.to_string()
        } else {
            "internal server error".to_string()
        }
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => Self::NotFound(what),
            StoreError::Conflict(what) => Self::Validation(format!("{what} already exists")),
            e @ StoreError::Incomparable { .. } => Self::Incomparable(e.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<TaskError> for Error {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::Store(e) => e.into(),
            e @ (TaskError::Patch(_) | TaskError::Archive(_) | TaskError::Verify(_) | TaskError::Fs(_)) => {
                Self::Patch(e.to_string())
            }
            other => Self::Task(other),
        }
    }
}

impl From<DistributeError> for Error {
    fn from(e: DistributeError) -> Self {
        match e {
            DistributeError::RateLimited { key, limit } => Self::RateLimited { key, limit },
            DistributeError::Store(e) => e.into(),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<ResourceError> for Error {
    fn from(e: ResourceError) -> Self { Self::Validation(e.to_string()) }
}

impl From<KeyError> for Error {
    fn from(e: KeyError) -> Self { Self::Validation(e.to_string()) }
}

impl From<CdkError> for Error {
    fn from(e: CdkError) -> Self { Self::Remote(e.to_string()) }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internals_are_not_revealed() {
        let err = Error::from(StoreError::Backend("connection refused to 10.0.0.7".into()));
        assert!(!err.is_client_facing());
        assert_eq!(err.public_message(), "internal server error");

        let err = Error::Remote("validator returned 502".into());
        assert_eq!(err.public_message(), "internal server error");
    }

    #[test]
    fn not_found_survives_layers() {
        let err = Error::from(TaskError::Store(StoreError::NotFound("version 3".into())));
        assert!(err.is_not_found());
        assert_eq!(err.public_message(), "version 3 not found");
    }

    #[test]
    fn rate_limit_is_distinguished() {
        let err = Error::from(DistributeError::RateLimited {
            key:   "cdk".into(),
            limit: 10,
        });
        assert!(matches!(err, Error::RateLimited { limit: 10, .. }));
        assert!(err.is_client_facing());
    }
}
