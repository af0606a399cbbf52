use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("checksum mismatch for '{path}': expected {expected}, got {actual}")]
    Mismatch {
        path:     PathBuf,
        expected: String,
        actual:   String,
    },

    #[error("failed to hash '{path}': {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Fs(#[from] updist_fs::Error),
}

pub type Result<T> = std::result::Result<T, VerificationError>;
