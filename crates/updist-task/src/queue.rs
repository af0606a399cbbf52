use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use crate::{Result, Task, TaskError};

/// Durable at-least-once task queue.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn enqueue(&self, task: Task) -> Result<()>;

    /// Wait for the next task. `None` once the queue is closed and drained.
    async fn dequeue(&self) -> Option<Task>;

    /// Stop accepting tasks. Tasks already queued stay dequeuable.
    fn close(&self);
}

/// In-process [`TaskQueue`]. Tasks do not survive a restart.
pub struct MemoryTaskQueue {
    tx:      parking_lot::Mutex<Option<mpsc::UnboundedSender<Task>>>,
    rx:      Mutex<mpsc::UnboundedReceiver<Task>>,
    pending: AtomicUsize,
}

impl Default for MemoryTaskQueue {
    fn default() -> Self { Self::new() }
}

impl MemoryTaskQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx:      parking_lot::Mutex::new(Some(tx)),
            rx:      Mutex::new(rx),
            pending: AtomicUsize::new(0),
        }
    }

    /// Tasks enqueued but not yet dequeued.
    pub fn len(&self) -> usize { self.pending.load(Ordering::SeqCst) }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

#[async_trait]
impl TaskQueue for MemoryTaskQueue {
    async fn enqueue(&self, task: Task) -> Result<()> {
        let guard = self.tx.lock();
        let tx = guard.as_ref().ok_or(TaskError::QueueClosed)?;
        tx.send(task).map_err(|_| TaskError::QueueClosed)?;
        self.pending.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn dequeue(&self) -> Option<Task> {
        let task = self.rx.lock().await.recv().await?;
        self.pending.fetch_sub(1, Ordering::SeqCst);
        Some(task)
    }

    fn close(&self) { self.tx.lock().take(); }
}
