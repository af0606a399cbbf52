use thiserror::Error;

use crate::CalVerError;

#[derive(Debug, Error)]
pub enum VersionError {
    #[error("invalid semver: {0}")]
    SemVer(#[from] semver::Error),
    #[error(transparent)]
    CalVer(#[from] CalVerError),
    #[error("invalid timestamp '{input}': {source}")]
    DateTime {
        input:  String,
        source: chrono::ParseError,
    },
    #[error("no layout accepts '{0}'")]
    UnknownLayout(String),
}
