#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResourceError {
    #[error("unknown channel '{0}'")]
    InvalidChannel(String),

    #[error("unknown operating system '{0}'")]
    InvalidOs(String),

    #[error("unknown architecture '{0}'")]
    InvalidArch(String),
}

pub type Result<T> = std::result::Result<T, ResourceError>;
