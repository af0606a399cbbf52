use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use updist_distribute::{
    CdnDistributor, DailyLimiter, DistributionRouter, EdgeDistributor, Endpoint, PoolRegistry,
    RouterOptions, UrlSigner, WeightedRoundRobin,
};
use updist_resource::DistributeInfo;
use updist_store::MemoryKvStore;

fn info(cdk: &str, region: &str) -> DistributeInfo {
    DistributeInfo {
        cdk:         cdk.into(),
        region:      region.into(),
        path:        "patches/app-1-2-windows-x64.zip".into(),
        resource_id: "app".into(),
        client_ip:   Some("10.0.0.1".into()),
    }
}

fn router(edge_ratio: u8, daily_limit: u64, registry: PoolRegistry) -> DistributionRouter {
    let kv = Arc::new(MemoryKvStore::new());
    let edge = Arc::new(EdgeDistributor::new(Arc::new(registry)));
    let cdn = Arc::new(CdnDistributor::new(
        DailyLimiter::new(kv.clone(), daily_limit),
        UrlSigner::new("https://cdn.example.com", "secret"),
    ));
    DistributionRouter::new(kv, edge, cdn, RouterOptions {
        edge_ratio,
        key_ttl: Duration::from_secs(60),
    })
}

fn edge_registry() -> PoolRegistry {
    PoolRegistry::new().with_pool("cn", vec![
        Endpoint::new("https://a.edge", 5),
        Endpoint::new("https://b.edge", 1),
        Endpoint::new("https://c.edge", 1),
    ])
}

#[test]
fn weighted_selection_converges_to_weights() {
    let pool = WeightedRoundRobin::new(vec![
        Endpoint::new("a", 5),
        Endpoint::new("b", 1),
        Endpoint::new("c", 1),
    ]);
    let mut seen: HashMap<String, usize> = HashMap::new();
    for _ in 0..7000 {
        *seen.entry(pool.next().unwrap().url.clone()).or_default() += 1;
    }
    assert_eq!(seen["a"], 5000);
    assert_eq!(seen["b"], 1000);
    assert_eq!(seen["c"], 1000);
}

#[test]
fn concurrent_selection_keeps_the_ratio() {
    let pool = Arc::new(WeightedRoundRobin::new(vec![
        Endpoint::new("a", 5),
        Endpoint::new("b", 1),
        Endpoint::new("c", 1),
    ]));
    let counts: Vec<HashMap<String, usize>> = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let pool = pool.clone();
                scope.spawn(move || {
                    let mut seen = HashMap::new();
                    for _ in 0..1750 {
                        *seen.entry(pool.next().unwrap().url.clone()).or_default() += 1;
                    }
                    seen
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });
    let total = |url: &str| counts.iter().map(|c| c.get(url).copied().unwrap_or(0)).sum::<usize>();
    assert_eq!(total("a"), 5000);
    assert_eq!(total("b"), 1000);
    assert_eq!(total("c"), 1000);
}

#[tokio::test]
async fn edge_ratio_100_always_uses_edge() {
    let router = router(100, 1, edge_registry());
    for _ in 0..10 {
        let routed = router.distribute(&info("cdk", "cn")).await.unwrap();
        assert_eq!(routed.strategy, "edge");
        assert!(routed.url.ends_with(".edge/patches/app-1-2-windows-x64.zip"));
    }
}

#[tokio::test]
async fn missing_edge_pool_falls_back_to_cdn() {
    let router = router(100, 10, edge_registry());
    let routed = router.distribute(&info("cdk", "eu")).await.unwrap();
    assert_eq!(routed.strategy, "cdn");
    assert!(routed.url.starts_with("https://cdn.example.com/patches/"));
    assert!(routed.url.contains("?auth_key="));
}

#[tokio::test]
async fn cdn_enforces_the_daily_limit() {
    let router = router(0, 3, PoolRegistry::new());
    for _ in 0..3 {
        router.distribute(&info("cdk-1", "cn")).await.unwrap();
    }
    let err = router.distribute(&info("cdk-1", "cn")).await.unwrap_err();
    assert!(err.is_rate_limited());
    assert!(router.distribute(&info("cdk-1", "cn")).await.unwrap_err().is_rate_limited());

    // Other keys have their own budget.
    assert!(router.distribute(&info("cdk-2", "cn")).await.is_ok());
}

#[tokio::test]
async fn download_keys_resolve_to_the_target() {
    let router = router(0, 0, PoolRegistry::new());
    let routed = router.distribute(&info("cdk-1", "cn")).await.unwrap();

    let target = router.resolve(&routed.download_key).await.unwrap().unwrap();
    assert_eq!(target.cdk, "cdk-1");
    assert_eq!(target.path, "patches/app-1-2-windows-x64.zip");
    assert_eq!(target.resource_id, "app");
    assert!(router.resolve("unknown").await.unwrap().is_none());
}
