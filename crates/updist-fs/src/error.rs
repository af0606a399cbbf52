use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read '{path}': {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write '{path}': {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to create directory '{path}': {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("failed to move '{from}' to '{to}': {source}")]
    Rename {
        from:   PathBuf,
        to:     PathBuf,
        source: io::Error,
    },

    #[error("path '{0}' escapes its root")]
    Escape(PathBuf),

    #[error("path '{0}' has no parent directory")]
    NoParent(PathBuf),
}

impl Error {
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Read { path, .. }
            | Self::Write { path, .. }
            | Self::CreateDir { path, .. }
            | Self::Escape(path)
            | Self::NoParent(path) => path,
            Self::Rename { to, .. } => to,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
