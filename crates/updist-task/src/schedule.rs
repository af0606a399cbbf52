use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveTime, TimeDelta, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{Result, TaskError, TaskOrchestrator};

/// Fires once a day at a wall-clock time in a fixed UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    at:     NaiveTime,
    offset: FixedOffset,
}

impl DailySchedule {
    pub fn new(hour: u32, minute: u32, utc_offset_hours: i32) -> Result<Self> {
        let at = NaiveTime::from_hms_opt(hour, minute, 0)
            .ok_or_else(|| TaskError::InvalidSchedule(format!("{hour:02}:{minute:02}")))?;
        let offset = FixedOffset::east_opt(utc_offset_hours * 3600)
            .ok_or_else(|| TaskError::InvalidSchedule(format!("UTC{utc_offset_hours:+}")))?;
        Ok(Self { at, offset })
    }

    pub fn offset(&self) -> FixedOffset { self.offset }

    /// First firing strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let local_day = now.with_timezone(&self.offset).date_naive();
        let shift = TimeDelta::seconds(i64::from(self.offset.local_minus_utc()));
        let today = (local_day.and_time(self.at) - shift).and_utc();
        if today > now {
            today
        } else {
            today + TimeDelta::days(1)
        }
    }
}

/// Enqueues a purge task every time the schedule fires.
pub struct Scheduler {
    orchestrator: Arc<TaskOrchestrator>,
    schedule:     DailySchedule,
}

impl Scheduler {
    pub fn new(orchestrator: Arc<TaskOrchestrator>, schedule: DailySchedule) -> Self {
        Self {
            orchestrator,
            schedule,
        }
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }

    async fn run(self, shutdown: CancellationToken) {
        loop {
            let now = Utc::now();
            let next = self.schedule.next_after(now);
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            debug!(next = %next, "purge scheduled");

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }

            match self.orchestrator.enqueue_purge().await {
                Ok(()) => info!("storage purge queued"),
                Err(e) => error!(error = %e, "failed to queue storage purge"),
            }
        }
        debug!("scheduler stopped");
    }
}
