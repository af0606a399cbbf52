use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};
use updist_resource::{Platform, VersionId};
use updist_store::KvStore;

use crate::{FinalizeTask, PatchTask, PurgeTask, Result, Task, TaskQueue};

const KEY_PREFIX: &str = "updist";

/// Progress of a background job as seen by pollers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    Pending,
    Completed,
    Failed,
    Unknown,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        }
    }

    pub fn is_terminal(self) -> bool { matches!(self, Self::Completed | Self::Failed) }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for TaskStatus {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(()),
        }
    }
}

/// Identity of one patch job: `(resource, target, current)` on one platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PatchKey {
    pub resource_id:        String,
    pub target_version_id:  VersionId,
    pub current_version_id: VersionId,
    pub platform:           Platform,
}

impl PatchKey {
    fn key(&self, kind: &str) -> String {
        format!(
            "{KEY_PREFIX}:patch:{kind}:{}:{}:{}:{}:{}",
            self.resource_id,
            self.target_version_id,
            self.current_version_id,
            self.platform.os,
            self.platform.arch
        )
    }

    /// Dedup key; held while a job is queued or running.
    pub fn lock_key(&self) -> String { self.key("lock") }

    /// Marker polled by clients while the job is outstanding.
    pub fn pending_key(&self) -> String { self.key("pending") }

    /// Terminal status, kept for the status TTL.
    pub fn status_key(&self) -> String { self.key("status") }
}

impl From<&PatchTask> for PatchKey {
    fn from(task: &PatchTask) -> Self {
        Self {
            resource_id:        task.resource_id.clone(),
            target_version_id:  task.target_version_id,
            current_version_id: task.current_version_id,
            platform:           task.platform(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OrchestratorOptions {
    pub max_retry:   u32,
    pub pending_ttl: Duration,
    pub status_ttl:  Duration,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            max_retry:   5,
            pending_ttl: Duration::from_secs(3600),
            status_ttl:  Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    Queued,
    /// Another request already holds the dedup key.
    AlreadyPending,
}

/// Front door of the task queue.
///
/// Patch jobs are deduplicated with a set-if-absent key in the shared store.
/// Lock and enqueue are not atomic as a pair: a failed enqueue deletes the
/// key again, a crash in between leaves it to expire after the pending TTL.
pub struct TaskOrchestrator {
    kv:      Arc<dyn KvStore>,
    queue:   Arc<dyn TaskQueue>,
    options: OrchestratorOptions,
}

impl TaskOrchestrator {
    pub fn new(kv: Arc<dyn KvStore>, queue: Arc<dyn TaskQueue>, options: OrchestratorOptions) -> Self {
        Self { kv, queue, options }
    }

    pub fn options(&self) -> &OrchestratorOptions { &self.options }

    pub async fn request_patch(&self, task: PatchTask) -> Result<Enqueued> {
        let key = PatchKey::from(&task);
        let lock_key = key.lock_key();
        let ttl = Some(self.options.pending_ttl);

        if !self.kv.set_nx(&lock_key, "1", ttl).await? {
            debug!(key = %lock_key, "patch already requested");
            return Ok(Enqueued::AlreadyPending);
        }

        let enqueued: Result<()> = async {
            self.kv.set(&key.pending_key(), "1", ttl).await?;
            self.kv.del(&key.status_key()).await?;
            self.queue.enqueue(Task::new(&task, self.options.max_retry)?).await
        }
        .await;

        if let Err(e) = enqueued {
            warn!(key = %lock_key, error = %e, "enqueue failed, releasing dedup key");
            self.release(&lock_key).await;
            self.release(&key.pending_key()).await;
            return Err(e);
        }

        info!(
            resource_id = %task.resource_id,
            target = task.target_version_id,
            current = task.current_version_id,
            platform = %task.platform(),
            "patch generation queued"
        );
        Ok(Enqueued::Queued)
    }

    pub async fn patch_status(&self, key: &PatchKey) -> Result<TaskStatus> {
        if let Some(status) = self.read_status(&key.status_key()).await? {
            return Ok(status);
        }
        if self.kv.get(&key.pending_key()).await?.is_some() {
            return Ok(TaskStatus::Pending);
        }
        Ok(TaskStatus::Unknown)
    }

    /// Record a patch job's outcome. Success releases the dedup key and the
    /// pending marker; failure leaves both to expire.
    pub async fn finish_patch(&self, key: &PatchKey, status: TaskStatus) -> Result<()> {
        if status == TaskStatus::Completed {
            self.kv.del(&key.pending_key()).await?;
            self.kv.del(&key.lock_key()).await?;
        }
        self.set_status(&key.status_key(), status).await
    }

    pub async fn enqueue_finalize(&self, task: FinalizeTask) -> Result<()> {
        let status_key = task.status_key.clone();
        self.kv
            .set(
                &status_key,
                TaskStatus::Pending.as_str(),
                Some(self.options.pending_ttl),
            )
            .await?;
        let enqueued = match Task::new(&task, self.options.max_retry) {
            Ok(envelope) => self.queue.enqueue(envelope).await,
            Err(e) => Err(e),
        };
        if let Err(e) = enqueued {
            warn!(key = %status_key, error = %e, "enqueue failed, clearing status");
            self.release(&status_key).await;
            return Err(e);
        }
        info!(
            resource_id = %task.resource_id,
            version = %task.version_name,
            platform = %task.platform(),
            "artifact finalization queued"
        );
        Ok(())
    }

    pub async fn enqueue_purge(&self) -> Result<()> {
        self.queue
            .enqueue(Task::new(&PurgeTask {}, self.options.max_retry)?)
            .await
    }

    /// Status stored under an arbitrary key, `Unknown` when absent.
    pub async fn status(&self, status_key: &str) -> Result<TaskStatus> {
        Ok(self
            .read_status(status_key)
            .await?
            .unwrap_or(TaskStatus::Unknown))
    }

    pub async fn set_status(&self, status_key: &str, status: TaskStatus) -> Result<()> {
        let ttl = if status.is_terminal() {
            self.options.status_ttl
        } else {
            self.options.pending_ttl
        };
        self.kv.set(status_key, status.as_str(), Some(ttl)).await?;
        Ok(())
    }

    pub fn finalize_status_key(resource_id: &str, version_id: VersionId, platform: Platform) -> String {
        format!(
            "{KEY_PREFIX}:finalize:status:{resource_id}:{version_id}:{}:{}",
            platform.os, platform.arch
        )
    }

    /// Rollback delete. Failures are logged so the remaining keys are still
    /// attempted and the enqueue error reaches the caller.
    async fn release(&self, key: &str) {
        if let Err(e) = self.kv.del(key).await {
            error!(key, error = %e, "rollback delete failed, key left to expire");
        }
    }

    async fn read_status(&self, key: &str) -> Result<Option<TaskStatus>> {
        Ok(self
            .kv
            .get(key)
            .await?
            .and_then(|value| value.parse().ok()))
    }
}
