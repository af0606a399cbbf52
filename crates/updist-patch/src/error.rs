use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to create staging directory: {0}")]
    Staging(#[source] updist_fs::Error),

    #[error("failed to copy '{path}': {source}")]
    Copy {
        path:   String,
        #[source]
        source: Box<Error>,
    },

    #[error("path '{0}' is reserved for the patch manifest")]
    ReservedPath(String),

    #[error("source '{0}' is neither a directory nor a supported archive")]
    UnsupportedSource(PathBuf),

    #[error("failed to serialize manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error(transparent)]
    Fs(#[from] updist_fs::Error),

    #[error(transparent)]
    Archive(#[from] updist_archive::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
