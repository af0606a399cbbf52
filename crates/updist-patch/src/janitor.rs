use std::path::PathBuf;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Background removal of staging directories.
///
/// Builders hand finished staging roots over a channel and return without
/// waiting on the filesystem. [`shutdown`](Janitor::shutdown) drains every
/// queued removal before returning.
pub struct Janitor {
    tx:       mpsc::UnboundedSender<PathBuf>,
    shutdown: CancellationToken,
    task:     JoinHandle<usize>,
}

/// Cloneable sender side of a [`Janitor`]. Usable from blocking threads.
#[derive(Clone, Debug)]
pub struct JanitorHandle {
    tx: mpsc::UnboundedSender<PathBuf>,
}

impl JanitorHandle {
    /// Queue `path` for removal. Falls back to removing it in place once the
    /// janitor has shut down.
    pub fn dispose(&self, path: PathBuf) {
        if let Err(mpsc::error::SendError(path)) = self.tx.send(path) {
            remove_now(&path);
        }
    }
}

impl Janitor {
    /// Start the janitor task on the current tokio runtime.
    pub fn spawn() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<PathBuf>();
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();

        let task = tokio::spawn(async move {
            let mut removed = 0usize;
            loop {
                tokio::select! {
                    biased;
                    Some(path) = rx.recv() => {
                        if remove(path).await {
                            removed += 1;
                        }
                    }
                    _ = token.cancelled() => break,
                    else => break,
                }
            }

            rx.close();
            while let Ok(path) = rx.try_recv() {
                if remove(path).await {
                    removed += 1;
                }
            }
            debug!(removed, "staging janitor stopped");
            removed
        });

        Self { tx, shutdown, task }
    }

    pub fn handle(&self) -> JanitorHandle { JanitorHandle { tx: self.tx.clone() } }

    /// Stop accepting work, finish queued removals and return how many
    /// directories were removed over the janitor's lifetime.
    pub async fn shutdown(self) -> usize {
        self.shutdown.cancel();
        match self.task.await {
            Ok(removed) => removed,
            Err(e) => {
                warn!(error = %e, "staging janitor task failed");
                0
            }
        }
    }
}

async fn remove(path: PathBuf) -> bool {
    match tokio::fs::remove_dir_all(&path).await {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to remove staging directory");
            false
        }
    }
}

fn remove_now(path: &std::path::Path) {
    if let Err(e) = std::fs::remove_dir_all(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "failed to remove staging directory");
        }
    }
}
