//! Background work for the update backend.
//!
//! Requests enter through [`TaskOrchestrator`], which deduplicates patch jobs
//! with a set-if-absent key and records status keys for pollers. Tasks travel
//! as JSON envelopes through a [`TaskQueue`] and are executed by a
//! [`WorkerPool`] with bounded, exponentially delayed retries. The handlers in
//! this crate generate patches, finalize uploaded artifacts and purge
//! superseded patches; [`Scheduler`] queues the purge once a day.

mod error;
mod handlers;
mod orchestrator;
mod payload;
mod queue;
mod retry;
mod schedule;
mod worker;

pub use error::{Result, TaskError};
pub use handlers::{FULL_DIR, FinalizeHandler, InvalidateHook, PatchHandler, PurgeHandler};
pub use orchestrator::{Enqueued, OrchestratorOptions, PatchKey, TaskOrchestrator, TaskStatus};
pub use payload::{FinalizeTask, PatchTask, PurgeTask, Task, TaskPayload};
pub use queue::{MemoryTaskQueue, TaskQueue};
pub use retry::retry_delay;
pub use schedule::{DailySchedule, Scheduler};
pub use worker::{TaskHandler, WorkerOptions, WorkerPool, WorkerPoolHandle};
