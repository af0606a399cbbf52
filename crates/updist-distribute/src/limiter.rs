use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::info;
use updist_store::KvStore;

use crate::{DistributeError, Result};

const WINDOW_TTL: Duration = Duration::from_secs(25 * 3600);

/// Per-key download cap over a UTC calendar day, counted in the shared store.
pub struct DailyLimiter {
    kv:    Arc<dyn KvStore>,
    limit: u64,
}

impl DailyLimiter {
    /// A `limit` of 0 disables the cap.
    pub fn new(kv: Arc<dyn KvStore>, limit: u64) -> Self { Self { kv, limit } }

    pub fn limit(&self) -> u64 { self.limit }

    /// Count one download for `key`, failing once the day's cap is exceeded.
    /// Returns the count including this download.
    pub async fn acquire(&self, key: &str) -> Result<u64> { self.acquire_at(key, Utc::now()).await }

    pub async fn acquire_at(&self, key: &str, now: DateTime<Utc>) -> Result<u64> {
        let counter = format!("updist:limit:{}:{key}", now.format("%Y%m%d"));
        let count = self.kv.incr(&counter).await?;
        if count == 1 {
            self.kv.expire(&counter, WINDOW_TTL).await?;
        }
        let count = u64::try_from(count).unwrap_or(0);
        if self.limit > 0 && count > self.limit {
            info!(key, count, limit = self.limit, "download rate limited");
            return Err(DistributeError::RateLimited {
                key:   key.to_string(),
                limit: self.limit,
            });
        }
        Ok(count)
    }
}
