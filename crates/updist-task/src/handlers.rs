use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};
use updist_archive::ArchiveFormat;
use updist_patch::{PatchBuilder, PatchSource, calculate_diff};
use updist_resource::{FileHashes, NewStorage, Storage, StorageKind, VersionId};
use updist_store::{ChannelCascade, VersionRepository};

use crate::{
    FinalizeTask, PatchKey, PatchTask, PurgeTask, Result, Task, TaskError, TaskHandler,
    TaskOrchestrator, TaskStatus,
};

/// Called with a resource id after its published versions changed.
pub type InvalidateHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Directory under the storage root receiving packed full artifacts.
pub const FULL_DIR: &str = "full";

/// Generates the incremental artifact for a [`PatchTask`].
pub struct PatchHandler {
    repo:         Arc<dyn VersionRepository>,
    orchestrator: Arc<TaskOrchestrator>,
    builder:      PatchBuilder,
    storage_root: PathBuf,
}

impl PatchHandler {
    /// `builder` must write below `storage_root`.
    pub fn new(
        repo: Arc<dyn VersionRepository>,
        orchestrator: Arc<TaskOrchestrator>,
        builder: PatchBuilder,
        storage_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            repo,
            orchestrator,
            builder,
            storage_root: storage_root.into(),
        }
    }

    fn patch_name(task: &PatchTask) -> String {
        format!(
            "{}-{}-{}-{}",
            file_safe(&task.resource_id),
            task.current_version_id,
            task.target_version_id,
            task.platform()
        )
    }
}

#[async_trait]
impl TaskHandler for PatchHandler {
    async fn handle(&self, task: &Task) -> Result<()> {
        let payload: PatchTask = task.decode()?;
        let key = PatchKey::from(&payload);
        let platform = payload.platform();
        let kind = StorageKind::Incremental {
            old_version_id: payload.current_version_id,
        };

        if self
            .repo
            .find_storage(payload.target_version_id, platform, kind)
            .await?
            .is_some()
        {
            info!(key = %key.lock_key(), "patch already exists");
            return self.orchestrator.finish_patch(&key, TaskStatus::Completed).await;
        }

        let target = self
            .repo
            .find_full_storage(payload.target_version_id, platform)
            .await?;
        let current = self
            .repo
            .find_full_storage(payload.current_version_id, platform)
            .await?;
        let new_hashes = load_hashes(&self.storage_root, &target).await?;
        let old_hashes = load_hashes(&self.storage_root, &current).await?;
        let changes = calculate_diff(&new_hashes, &old_hashes);

        let source = PatchSource::detect(resolve(&self.storage_root, &target.path)?)?;
        let builder = self.builder.clone();
        let name = Self::patch_name(&payload);
        let artifact =
            tokio::task::spawn_blocking(move || builder.generate(&name, &source, &changes)).await??;

        self.repo
            .create_storage(NewStorage {
                version_id: payload.target_version_id,
                platform,
                kind,
                path: relative_to(&self.storage_root, &artifact.path)?,
                hash: artifact.hash,
                file_hashes: None,
            })
            .await?;
        self.orchestrator.finish_patch(&key, TaskStatus::Completed).await
    }

    async fn on_exhausted(&self, task: &Task, _error: &TaskError) {
        let Ok(payload) = task.decode::<PatchTask>() else {
            return;
        };
        if let Err(e) = self
            .orchestrator
            .finish_patch(&PatchKey::from(&payload), TaskStatus::Failed)
            .await
        {
            warn!(error = %e, "failed to record patch failure");
        }
    }
}

/// Turns an uploaded artifact into a storage row, publishes full artifacts
/// through the channel cascade and marks the status key.
pub struct FinalizeHandler {
    repo:         Arc<dyn VersionRepository>,
    cascade:      Arc<ChannelCascade>,
    orchestrator: Arc<TaskOrchestrator>,
    storage_root: PathBuf,
    invalidate:   Option<InvalidateHook>,
}

impl FinalizeHandler {
    pub fn new(
        repo: Arc<dyn VersionRepository>,
        cascade: Arc<ChannelCascade>,
        orchestrator: Arc<TaskOrchestrator>,
        storage_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            repo,
            cascade,
            orchestrator,
            storage_root: storage_root.into(),
            invalidate: None,
        }
    }

    pub fn on_published(mut self, hook: InvalidateHook) -> Self {
        self.invalidate = Some(hook);
        self
    }
}

struct Finalized {
    path:        String,
    hash:        String,
    file_hashes: FileHashes,
}

fn finalize_artifact(root: &Path, task: &FinalizeTask) -> Result<Finalized> {
    let source = resolve(root, &task.source_path)?;
    if source.is_dir() {
        let name = format!(
            "{}-{}-{}.{}",
            file_safe(&task.resource_id),
            task.version_id,
            task.platform(),
            ArchiveFormat::Zip.extension()
        );
        let dest = root.join(FULL_DIR).join(name);
        let file_hashes = updist_verify::hash_tree(&source)?;
        let report = updist_archive::pack_dir(&source, &dest, ArchiveFormat::Zip)?;
        return Ok(Finalized {
            path: relative_to(root, &dest)?,
            hash: report.hash,
            file_hashes,
        });
    }

    let file_hashes = updist_archive::hash_entries(&source)?;
    let hash = updist_verify::hash_file(&source)?;
    Ok(Finalized {
        path: relative_to(root, &source)?,
        hash,
        file_hashes,
    })
}

#[async_trait]
impl TaskHandler for FinalizeHandler {
    async fn handle(&self, task: &Task) -> Result<()> {
        let payload: FinalizeTask = task.decode()?;
        let version = self.repo.get_version(payload.version_id).await?;

        let root = self.storage_root.clone();
        let job = payload.clone();
        let finalized =
            tokio::task::spawn_blocking(move || finalize_artifact(&root, &job)).await??;

        self.repo
            .create_storage(NewStorage {
                version_id:  version.id,
                platform:    payload.platform(),
                kind:        payload.kind,
                path:        finalized.path,
                hash:        finalized.hash,
                file_hashes: Some(finalized.file_hashes),
            })
            .await?;

        if payload.kind == StorageKind::Full {
            self.cascade
                .update_latest(&payload.resource_id, payload.channel, &version)
                .await?;
        }
        if let Some(invalidate) = &self.invalidate {
            invalidate(&payload.resource_id);
        }

        info!(
            resource_id = %payload.resource_id,
            version = %payload.version_name,
            platform = %payload.platform(),
            kind = payload.kind.as_str(),
            "artifact finalized"
        );
        self.orchestrator
            .set_status(&payload.status_key, TaskStatus::Completed)
            .await
    }

    async fn on_exhausted(&self, task: &Task, _error: &TaskError) {
        let Ok(payload) = task.decode::<FinalizeTask>() else {
            return;
        };
        if let Err(e) = self
            .orchestrator
            .set_status(&payload.status_key, TaskStatus::Failed)
            .await
        {
            warn!(error = %e, "failed to record finalization failure");
        }
    }
}

/// Deletes incremental artifacts whose target is no channel's latest
/// version anymore.
pub struct PurgeHandler {
    repo:         Arc<dyn VersionRepository>,
    storage_root: PathBuf,
}

impl PurgeHandler {
    pub fn new(repo: Arc<dyn VersionRepository>, storage_root: impl Into<PathBuf>) -> Self {
        Self {
            repo,
            storage_root: storage_root.into(),
        }
    }

    /// Returns how many storage rows were removed.
    pub async fn purge(&self) -> Result<usize> {
        let mut removed = 0usize;
        for resource_id in self.repo.list_resources().await? {
            let live: HashSet<VersionId> = self
                .repo
                .list_latest_pointers(&resource_id)
                .await?
                .into_iter()
                .map(|pointer| pointer.version_id)
                .collect();

            for storage in self.repo.list_storages(&resource_id).await? {
                if !storage.kind.is_incremental() || live.contains(&storage.version_id) {
                    continue;
                }
                if !self.remove_file(&storage).await {
                    continue;
                }
                self.repo.delete_storage(storage.id).await?;
                removed += 1;
            }
        }
        info!(removed, "superseded patches purged");
        Ok(removed)
    }

    async fn remove_file(&self, storage: &Storage) -> bool {
        let path = match resolve(&self.storage_root, &storage.path) {
            Ok(path) => path,
            Err(e) => {
                warn!(storage = storage.id, error = %e, "refusing to purge storage path");
                return false;
            }
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to remove patch file");
                false
            }
        }
    }
}

#[async_trait]
impl TaskHandler for PurgeHandler {
    async fn handle(&self, task: &Task) -> Result<()> {
        let PurgeTask {} = task.decode()?;
        self.purge().await.map(|_| ())
    }
}

/// Per-file hashes of an artifact, from the row or computed from disk.
async fn load_hashes(root: &Path, storage: &Storage) -> Result<FileHashes> {
    if let Some(hashes) = &storage.file_hashes {
        return Ok(hashes.clone());
    }
    let path = resolve(root, &storage.path)?;
    tokio::task::spawn_blocking(move || -> Result<FileHashes> {
        if path.is_dir() {
            Ok(updist_verify::hash_tree(&path)?)
        } else {
            Ok(updist_archive::hash_entries(&path)?)
        }
    })
    .await?
}

fn resolve(root: &Path, relative: &str) -> Result<PathBuf> {
    Ok(updist_fs::join_relative(root, relative)?)
}

fn relative_to(root: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| TaskError::Fs(updist_fs::Error::Escape(path.to_path_buf())))?;
    Ok(relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/"))
}

fn file_safe(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_use_forward_slashes() {
        let root = Path::new("/srv/artifacts");
        assert_eq!(
            relative_to(root, Path::new("/srv/artifacts/patches/a.zip")).unwrap(),
            "patches/a.zip"
        );
        assert!(relative_to(root, Path::new("/tmp/a.zip")).is_err());
    }

    #[test]
    fn file_safe_names() {
        assert_eq!(file_safe("com.example/app one"), "com.example_app_one");
    }
}
