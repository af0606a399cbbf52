use updist_resource::Channel;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    Conflict(String),

    #[error("value under '{key}' is not an integer")]
    NotAnInteger { key: String },

    #[error("cannot cascade '{candidate}' into {channel}: not comparable with '{current}'")]
    Incomparable {
        channel:   Channel,
        current:   String,
        candidate: String,
    },

    #[error("store backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool { matches!(self, Self::NotFound(_)) }
}

pub type Result<T> = std::result::Result<T, StoreError>;
