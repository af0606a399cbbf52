use std::sync::Arc;

use async_trait::async_trait;
use updist_resource::DistributeInfo;

use crate::{DailyLimiter, DistributeError, PoolRegistry, Result, UrlSigner};

/// A delivery strategy turning a resolved artifact into a download URL.
#[async_trait]
pub trait Distributor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn distribute(&self, info: &DistributeInfo) -> Result<String>;
}

/// Serves from the region's edge pool.
pub struct EdgeDistributor {
    registry: Arc<PoolRegistry>,
}

impl EdgeDistributor {
    pub fn new(registry: Arc<PoolRegistry>) -> Self { Self { registry } }
}

#[async_trait]
impl Distributor for EdgeDistributor {
    fn name(&self) -> &'static str { "edge" }

    async fn distribute(&self, info: &DistributeInfo) -> Result<String> {
        let pool = self
            .registry
            .pool(&info.region)
            .ok_or_else(|| DistributeError::NoEndpoint(info.region.clone()))?;
        let endpoint = pool
            .next()
            .ok_or_else(|| DistributeError::NoEndpoint(info.region.clone()))?;
        Ok(format!(
            "{}/{}",
            endpoint.url.trim_end_matches('/'),
            info.path.trim_start_matches('/')
        ))
    }
}

/// Serves signed CDN URLs, subject to the daily per-CDK limit.
pub struct CdnDistributor {
    limiter: DailyLimiter,
    signer:  UrlSigner,
}

impl CdnDistributor {
    pub fn new(limiter: DailyLimiter, signer: UrlSigner) -> Self { Self { limiter, signer } }
}

#[async_trait]
impl Distributor for CdnDistributor {
    fn name(&self) -> &'static str { "cdn" }

    async fn distribute(&self, info: &DistributeInfo) -> Result<String> {
        self.limiter.acquire(&info.cdk).await?;
        Ok(self.signer.sign(&info.path))
    }
}
