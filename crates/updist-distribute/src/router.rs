use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use updist_resource::DistributeInfo;
use updist_store::KvStore;
use uuid::Uuid;

use crate::{DistributeError, Distributor, Result, StatsHandle};

/// What a download key redirects to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadTarget {
    pub cdk:         String,
    pub path:        String,
    pub resource_id: String,
}

/// A routed download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Distribution {
    pub url:          String,
    /// Opaque key resolving to the same target while it lives.
    pub download_key: String,
    pub strategy:     &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct RouterOptions {
    /// Percent of requests, 0 to 100, sent to the edge pool.
    pub edge_ratio: u8,
    pub key_ttl:    Duration,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            edge_ratio: 0,
            key_ttl:    Duration::from_secs(3600),
        }
    }
}

/// Splits downloads between the edge pool and the CDN.
///
/// Every call is an independent draw against `edge_ratio`. A region without
/// a usable edge pool is served by the CDN instead.
pub struct DistributionRouter {
    kv:      Arc<dyn KvStore>,
    edge:    Arc<dyn Distributor>,
    cdn:     Arc<dyn Distributor>,
    options: RouterOptions,
    stats:   Option<StatsHandle>,
}

impl DistributionRouter {
    pub fn new(
        kv: Arc<dyn KvStore>,
        edge: Arc<dyn Distributor>,
        cdn: Arc<dyn Distributor>,
        options: RouterOptions,
    ) -> Self {
        Self {
            kv,
            edge,
            cdn,
            options,
            stats: None,
        }
    }

    pub fn with_stats(mut self, stats: StatsHandle) -> Self {
        self.stats = Some(stats);
        self
    }

    pub async fn distribute(&self, info: &DistributeInfo) -> Result<Distribution> {
        let download_key = self.record(info).await?;

        let roll = rand::thread_rng().gen_range(0..100u8);
        let (url, strategy) = if roll < self.options.edge_ratio {
            match self.edge.distribute(info).await {
                Ok(url) => (url, self.edge.name()),
                Err(DistributeError::NoEndpoint(region)) => {
                    warn!(region = %region, "no edge endpoint, serving from cdn");
                    (self.cdn.distribute(info).await?, self.cdn.name())
                }
                Err(e) => return Err(e),
            }
        } else {
            (self.cdn.distribute(info).await?, self.cdn.name())
        };

        if let (Some(stats), Some(ip)) = (&self.stats, info.client_ip.as_deref()) {
            stats.record(&info.resource_id, ip);
        }
        debug!(resource_id = %info.resource_id, strategy, "download routed");
        Ok(Distribution {
            url,
            download_key,
            strategy,
        })
    }

    /// Target recorded under `download_key`, `None` once it expired.
    pub async fn resolve(&self, download_key: &str) -> Result<Option<DownloadTarget>> {
        match self.kv.get(&Self::key(download_key)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn record(&self, info: &DistributeInfo) -> Result<String> {
        let download_key = Uuid::new_v4().simple().to_string();
        let target = DownloadTarget {
            cdk:         info.cdk.clone(),
            path:        info.path.clone(),
            resource_id: info.resource_id.clone(),
        };
        self.kv
            .set(
                &Self::key(&download_key),
                &serde_json::to_string(&target)?,
                Some(self.options.key_ttl),
            )
            .await?;
        Ok(download_key)
    }

    fn key(download_key: &str) -> String { format!("updist:download:{download_key}") }
}
