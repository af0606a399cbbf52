use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use updist_cache::Cache;
use updist_distribute::{
    CdnDistributor, DailyLimiter, DistributionRouter, EdgeDistributor, PoolRegistry,
    RouterOptions, StatsCollector, UrlSigner,
};
use updist_patch::{Janitor, PatchBuilder};
use updist_store::{ChannelCascade, KvStore, MemoryKvStore, MemoryRepository, VersionRepository};
use updist_task::{
    DailySchedule, FinalizeHandler, FinalizeTask, MemoryTaskQueue, OrchestratorOptions,
    PatchHandler, PatchTask, PurgeHandler, PurgeTask, Scheduler, TaskError, TaskOrchestrator,
    TaskQueue, WorkerOptions, WorkerPool, WorkerPoolHandle,
};
use updist_version::VersionComparator;

use crate::cdk::{AcceptAll, CdkError, CdkValidator, HttpCdkValidator};
use crate::config::Settings;
use crate::service::{ServiceParts, UpdateService, cache_invalidator};

/// Directory under the storage root receiving generated patches.
pub const PATCH_DIR: &str = "patches";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("cannot prepare storage root {path}: {source}")]
    Storage {
        path:   PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Cdk(#[from] CdkError),

    #[error(transparent)]
    Task(#[from] TaskError),
}

/// The running service: request-path objects plus the background tasks
/// feeding them.
pub struct App {
    service:   Arc<UpdateService>,
    queue:     Arc<MemoryTaskQueue>,
    shutdown:  CancellationToken,
    workers:   WorkerPoolHandle,
    scheduler: JoinHandle<()>,
    janitor:   Janitor,
    stats:     StatsCollector,
}

impl App {
    /// Wire the service over in-memory collaborators and start its
    /// background tasks. Must run inside a tokio runtime.
    pub fn build(settings: &Settings) -> Result<Self, AppError> {
        let validator: Arc<dyn CdkValidator> = match &settings.cdk.validate_url {
            Some(url) => Arc::new(HttpCdkValidator::new(
                url.clone(),
                Duration::from_secs(settings.cdk.timeout_secs),
            )?),
            None => {
                warn!("no license-key validator configured, every key is accepted");
                Arc::new(AcceptAll)
            }
        };
        Self::build_with(settings, validator)
    }

    pub fn build_with(settings: &Settings, validator: Arc<dyn CdkValidator>) -> Result<Self, AppError> {
        let root = settings.storage.root.clone();
        std::fs::create_dir_all(&root).map_err(|source| AppError::Storage {
            path: root.clone(),
            source,
        })?;
        let schedule = DailySchedule::new(
            settings.task.purge.hour,
            settings.task.purge.minute,
            settings.task.purge.utc_offset_hours,
        )?;

        let kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let repo: Arc<dyn VersionRepository> = Arc::new(MemoryRepository::new());
        let comparator = Arc::new(VersionComparator::default());
        let cache = Arc::new(Cache::new(settings.cache.ttl()));
        let queue = Arc::new(MemoryTaskQueue::new());
        let task = &settings.task;
        let orchestrator = Arc::new(TaskOrchestrator::new(
            kv.clone(),
            queue.clone(),
            OrchestratorOptions {
                max_retry:   task.max_retry,
                pending_ttl: Duration::from_secs(task.pending_ttl_secs),
                status_ttl:  Duration::from_secs(task.status_ttl_secs),
            },
        ));
        let cascade = Arc::new(ChannelCascade::new(repo.clone(), comparator.clone()));

        let janitor = Janitor::spawn();
        let builder = PatchBuilder::new(root.join(PATCH_DIR))
            .staging_root(settings.storage.staging_root())
            .janitor(janitor.handle());
        let patch = PatchHandler::new(repo.clone(), orchestrator.clone(), builder, &root);
        let finalize = FinalizeHandler::new(repo.clone(), cascade, orchestrator.clone(), &root)
            .on_published(cache_invalidator(cache.clone()));
        let purge = PurgeHandler::new(repo.clone(), &root);

        let shutdown = CancellationToken::new();
        let workers = WorkerPool::new(queue.clone(), WorkerOptions {
            workers:      task.workers,
            retry_base:   Duration::from_millis(task.retry_base_ms),
            task_timeout: Duration::from_secs(task.task_timeout_secs),
        })
        .register::<PatchTask>(Arc::new(patch))
        .register::<FinalizeTask>(Arc::new(finalize))
        .register::<PurgeTask>(Arc::new(purge))
        .start(shutdown.clone());
        let scheduler = Scheduler::new(orchestrator.clone(), schedule).spawn(shutdown.clone());

        let dist = &settings.distribute;
        let stats = StatsCollector::spawn(kv.clone(), Duration::from_secs(dist.stats_flush_secs.max(1)));
        let registry = dist
            .regions
            .iter()
            .fold(PoolRegistry::new(), |registry, (region, endpoints)| {
                registry.with_pool(region.clone(), endpoints.clone())
            })
            .with_default_region(dist.default_region.clone());
        let router = DistributionRouter::new(
            kv.clone(),
            Arc::new(EdgeDistributor::new(Arc::new(registry))),
            Arc::new(CdnDistributor::new(
                DailyLimiter::new(kv, dist.daily_limit),
                UrlSigner::new(dist.cdn.base_url.clone(), dist.cdn.secret.clone()),
            )),
            RouterOptions {
                edge_ratio: dist.edge_ratio,
                key_ttl:    Duration::from_secs(dist.download_key_ttl_secs),
            },
        )
        .with_stats(stats.handle());

        let service = Arc::new(UpdateService::new(
            ServiceParts {
                repo,
                comparator,
                cache,
                orchestrator,
                router: Arc::new(router),
                validator,
            },
            dist.default_region.clone(),
        ));
        info!(root = %root.display(), workers = task.workers, "update service ready");

        Ok(Self {
            service,
            queue,
            shutdown,
            workers,
            scheduler,
            janitor,
            stats,
        })
    }

    pub fn service(&self) -> Arc<UpdateService> { self.service.clone() }

    /// Stop the background tasks and drain their queues.
    pub async fn shutdown(self) {
        self.queue.close();
        self.shutdown.cancel();
        self.workers.join().await;
        if let Err(e) = self.scheduler.await {
            warn!(error = %e, "scheduler task failed");
        }
        let removed = self.janitor.shutdown().await;
        let downloads = self.stats.shutdown().await;
        info!(
            abandoned_tasks = self.queue.len(),
            staging_removed = removed,
            downloads_flushed = downloads,
            "update service stopped"
        );
    }
}
