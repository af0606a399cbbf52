use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unsupported archive format: '{0}'")]
    UnsupportedFormat(PathBuf),

    #[error("zip-slip attack detected: entry '{entry}'")]
    ZipSlip { entry: PathBuf },

    #[error("entry '{0}' not found in archive")]
    MissingEntry(String),

    #[error("zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("failed to read '{path}': {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write '{path}': {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Fs(#[from] updist_fs::Error),

    #[error(transparent)]
    Verify(#[from] updist_verify::VerificationError),
}

pub type Result<T> = std::result::Result<T, Error>;
