use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{Result, Task, TaskError, TaskPayload, TaskQueue, retry_delay};

/// Executes tasks of one type.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, task: &Task) -> Result<()>;

    /// Called once when the task will not be attempted again.
    async fn on_exhausted(&self, _task: &Task, _error: &TaskError) {}
}

#[derive(Debug, Clone, Copy)]
pub struct WorkerOptions {
    pub workers:      usize,
    pub retry_base:   Duration,
    pub task_timeout: Duration,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            workers:      4,
            retry_base:   Duration::from_millis(500),
            task_timeout: Duration::from_secs(600),
        }
    }
}

/// Fixed-size pool draining a [`TaskQueue`].
///
/// Failed tasks are re-enqueued after an exponential backoff until their
/// retry budget is spent; permanent errors skip the remaining budget.
pub struct WorkerPool {
    queue:    Arc<dyn TaskQueue>,
    handlers: HashMap<&'static str, Arc<dyn TaskHandler>>,
    options:  WorkerOptions,
}

impl WorkerPool {
    pub fn new(queue: Arc<dyn TaskQueue>, options: WorkerOptions) -> Self {
        Self {
            queue,
            handlers: HashMap::new(),
            options,
        }
    }

    /// Route tasks of `P::TYPE` to `handler`.
    pub fn register<P: TaskPayload>(mut self, handler: Arc<dyn TaskHandler>) -> Self {
        self.handlers.insert(P::TYPE, handler);
        self
    }

    pub fn task_types(&self) -> Vec<&'static str> {
        let mut types: Vec<_> = self.handlers.keys().copied().collect();
        types.sort();
        types
    }

    /// Spawn the workers. They stop when `shutdown` fires or the queue is
    /// closed and drained.
    pub fn start(self, shutdown: CancellationToken) -> WorkerPoolHandle {
        let shared = Arc::new(self);
        let workers = shared.options.workers.max(1);
        let handles = (0..workers)
            .map(|worker| {
                let pool = shared.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move { pool.run(worker, shutdown).await })
            })
            .collect();
        info!(workers, "task workers started");
        WorkerPoolHandle { handles }
    }

    async fn run(self: Arc<Self>, worker: usize, shutdown: CancellationToken) {
        loop {
            let task = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                task = self.queue.dequeue() => match task {
                    Some(task) => task,
                    None => break,
                },
            };
            self.process(worker, task, &shutdown).await;
        }
        debug!(worker, "task worker stopped");
    }

    async fn process(&self, worker: usize, mut task: Task, shutdown: &CancellationToken) {
        let Some(handler) = self.handlers.get(task.task_type.as_str()).cloned() else {
            let err = TaskError::UnknownType(task.task_type.clone());
            error!(worker, task = %task.id, error = %err, "dropping task");
            return;
        };

        let outcome = match tokio::time::timeout(self.options.task_timeout, handler.handle(&task)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(TaskError::Timeout(self.options.task_timeout)),
        };

        let err = match outcome {
            Ok(()) => {
                debug!(worker, task = %task.id, task_type = %task.task_type, "task completed");
                return;
            }
            Err(err) => err,
        };

        if err.is_permanent() || !task.can_retry() {
            error!(
                worker,
                task = %task.id,
                task_type = %task.task_type,
                attempt = task.retried + 1,
                error = %err,
                "task abandoned"
            );
            handler.on_exhausted(&task, &err).await;
            return;
        }

        let delay = retry_delay(task.retried, self.options.retry_base);
        task.retried += 1;
        warn!(
            worker,
            task = %task.id,
            task_type = %task.task_type,
            attempt = task.retried,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "task failed, retry scheduled"
        );

        // A retry that never reaches the queue is final for the handler too.
        let queue = self.queue.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let dropped = tokio::select! {
                _ = shutdown.cancelled() => err,
                _ = tokio::time::sleep(delay) => match queue.enqueue(task.clone()).await {
                    Ok(()) => return,
                    Err(e) => e,
                },
            };
            error!(task = %task.id, task_type = %task.task_type, error = %dropped, "retry dropped");
            handler.on_exhausted(&task, &dropped).await;
        });
    }
}

pub struct WorkerPoolHandle {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPoolHandle {
    /// Wait for every worker to stop.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!(error = %e, "task worker panicked");
            }
        }
    }
}
