use updist_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum DistributeError {
    #[error("daily download limit of {limit} reached for '{key}'")]
    RateLimited { key: String, limit: u64 },

    #[error("no edge endpoint available for region '{0}'")]
    NoEndpoint(String),

    #[error("malformed download target: {0}")]
    Target(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DistributeError {
    pub fn is_rate_limited(&self) -> bool { matches!(self, Self::RateLimited { .. }) }
}

pub type Result<T> = std::result::Result<T, DistributeError>;
