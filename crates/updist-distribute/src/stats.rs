use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use updist_store::KvStore;

use crate::Result;

const RETENTION: Duration = Duration::from_secs(7 * 24 * 3600);

#[derive(Debug, Clone, PartialEq, Eq)]
struct DownloadRecord {
    resource_id: String,
    client_ip:   String,
}

/// Cloneable sender side of a [`StatsCollector`].
#[derive(Clone, Debug)]
pub struct StatsHandle {
    tx: mpsc::UnboundedSender<DownloadRecord>,
}

impl StatsHandle {
    /// Count one download. Dropped silently once the collector stopped.
    pub fn record(&self, resource_id: &str, client_ip: &str) {
        let _ = self.tx.send(DownloadRecord {
            resource_id: resource_id.to_string(),
            client_ip:   client_ip.to_string(),
        });
    }
}

#[derive(Debug, Default)]
struct Batch {
    downloads: HashMap<String, i64>,
    clients:   HashMap<String, HashSet<String>>,
}

impl Batch {
    fn add(&mut self, record: DownloadRecord) {
        *self.downloads.entry(record.resource_id.clone()).or_default() += 1;
        self.clients
            .entry(record.resource_id)
            .or_default()
            .insert(record.client_ip);
    }

    fn is_empty(&self) -> bool { self.downloads.is_empty() }
}

/// Aggregates per-request download records and writes them in batches.
///
/// Per resource and UTC day the store receives a download counter
/// (`updist:stats:downloads:{day}:{resource}`), one marker per client IP and
/// a distinct-client counter (`updist:stats:dau:{day}:{resource}`).
/// [`shutdown`](StatsCollector::shutdown) flushes whatever is still queued.
pub struct StatsCollector {
    tx:       mpsc::UnboundedSender<DownloadRecord>,
    shutdown: CancellationToken,
    task:     JoinHandle<u64>,
}

impl StatsCollector {
    pub fn spawn(kv: Arc<dyn KvStore>, flush_every: Duration) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<DownloadRecord>();
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();

        let task = tokio::spawn(async move {
            let mut batch = Batch::default();
            let mut flushed = 0u64;
            let mut ticker = tokio::time::interval(flush_every);
            ticker.tick().await;
            loop {
                tokio::select! {
                    biased;
                    Some(record) = rx.recv() => batch.add(record),
                    _ = ticker.tick() => {
                        flushed += flush(kv.as_ref(), std::mem::take(&mut batch)).await;
                    }
                    _ = token.cancelled() => break,
                    else => break,
                }
            }

            rx.close();
            while let Ok(record) = rx.try_recv() {
                batch.add(record);
            }
            flushed += flush(kv.as_ref(), batch).await;
            debug!(flushed, "download statistics collector stopped");
            flushed
        });

        Self { tx, shutdown, task }
    }

    pub fn handle(&self) -> StatsHandle { StatsHandle { tx: self.tx.clone() } }

    /// Stop, flush pending records and return how many downloads were
    /// written over the collector's lifetime.
    pub async fn shutdown(self) -> u64 {
        self.shutdown.cancel();
        match self.task.await {
            Ok(flushed) => flushed,
            Err(e) => {
                warn!(error = %e, "download statistics task failed");
                0
            }
        }
    }
}

/// Returns how many downloads the batch held. Write failures are logged and
/// the batch is dropped.
async fn flush(kv: &dyn KvStore, batch: Batch) -> u64 {
    if batch.is_empty() {
        return 0;
    }
    let total = batch.downloads.values().sum::<i64>();
    if let Err(e) = write_batch(kv, batch).await {
        warn!(error = %e, downloads = total, "failed to flush download statistics");
    }
    u64::try_from(total).unwrap_or(0)
}

async fn write_batch(kv: &dyn KvStore, batch: Batch) -> Result<()> {
    let day = Utc::now().format("%Y%m%d").to_string();
    for (resource_id, count) in &batch.downloads {
        let key = format!("updist:stats:downloads:{day}:{resource_id}");
        kv.incr_by(&key, *count).await?;
        kv.expire(&key, RETENTION).await?;
    }
    for (resource_id, clients) in &batch.clients {
        let dau = format!("updist:stats:dau:{day}:{resource_id}");
        let mut fresh = 0;
        for ip in clients {
            let marker = format!("updist:stats:ip:{day}:{resource_id}:{ip}");
            if kv.set_nx(&marker, "1", Some(RETENTION)).await? {
                fresh += 1;
            }
        }
        if fresh > 0 {
            kv.incr_by(&dau, fresh).await?;
            kv.expire(&dau, RETENTION).await?;
        }
    }
    Ok(())
}
