use std::collections::HashMap;
use std::sync::Arc;

use crate::{Endpoint, WeightedRoundRobin};

/// Edge pools keyed by region, built once at startup.
///
/// Lookups for an unknown region fall back to the default region when one is
/// set.
#[derive(Debug, Default, Clone)]
pub struct PoolRegistry {
    pools:          HashMap<String, Arc<WeightedRoundRobin>>,
    default_region: Option<String>,
}

impl PoolRegistry {
    pub fn new() -> Self { Self::default() }

    pub fn with_pool(mut self, region: impl Into<String>, endpoints: Vec<Endpoint>) -> Self {
        self.pools
            .insert(region.into(), Arc::new(WeightedRoundRobin::new(endpoints)));
        self
    }

    pub fn with_default_region(mut self, region: impl Into<String>) -> Self {
        self.default_region = Some(region.into());
        self
    }

    pub fn pool(&self, region: &str) -> Option<Arc<WeightedRoundRobin>> {
        self.pools
            .get(region)
            .or_else(|| {
                self.default_region
                    .as_deref()
                    .and_then(|default| self.pools.get(default))
            })
            .cloned()
    }

    pub fn regions(&self) -> Vec<&str> {
        let mut regions: Vec<_> = self.pools.keys().map(String::as_str).collect();
        regions.sort_unstable();
        regions
    }

    pub fn is_empty(&self) -> bool { self.pools.is_empty() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_region_uses_default() {
        let registry = PoolRegistry::new()
            .with_pool("cn", vec![Endpoint::new("https://cn.example", 1)])
            .with_pool("us", vec![Endpoint::new("https://us.example", 1)])
            .with_default_region("us");

        let cn = registry.pool("cn").unwrap();
        assert_eq!(cn.next().unwrap().url, "https://cn.example");
        let eu = registry.pool("eu").unwrap();
        assert_eq!(eu.next().unwrap().url, "https://us.example");
        assert_eq!(registry.regions(), ["cn", "us"]);
    }

    #[test]
    fn no_default_means_no_pool() {
        let registry = PoolRegistry::new().with_pool("cn", vec![]);
        assert!(registry.pool("eu").is_none());
    }
}
