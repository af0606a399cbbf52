use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};
use updist_cache::{Cache, CacheKey};
use updist_distribute::{DistributionRouter, DownloadTarget};
use updist_resource::{
    Arch, Channel, DistributeInfo, NewVersion, Os, Platform, Storage, StorageKind, Version,
};
use updist_store::{StoreError, VersionRepository};
use updist_task::{
    Enqueued, FinalizeTask, InvalidateHook, PatchKey, PatchTask, TaskOrchestrator, TaskStatus,
};
use updist_version::{Comparison, VersionComparator};

use crate::cdk::{CdkValidator, CdkVerdict};
use crate::{Error, Result};

/// Latest version per `resource|os|arch|channel` key.
pub type VersionCache = Cache<Version, StoreError>;

/// Hook evicting every cached answer of a resource.
pub fn cache_invalidator(cache: Arc<VersionCache>) -> InvalidateHook {
    Arc::new(move |resource_id: &str| {
        if let Err(e) = evict(&cache, resource_id) {
            warn!(resource_id, error = %e, "cache eviction skipped");
        }
    })
}

fn evict(cache: &VersionCache, resource_id: &str) -> Result<usize> {
    let keys = CacheKey::all_for_resource(resource_id)?;
    Ok(cache.delete_many(keys.iter().map(ToString::to_string)))
}

/// An update check from a client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateQuery {
    pub resource_id:     String,
    /// Version the client runs; `None` asks for a full package.
    pub current_version: Option<String>,
    pub os:              String,
    pub arch:            String,
    pub channel:         String,
    /// License key. Without one only metadata is returned.
    pub cdk:             Option<String>,
    pub region:          Option<String>,
    pub client_ip:       Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateKind {
    Full,
    Incremental,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Download {
    pub kind:         UpdateKind,
    pub url:          String,
    pub download_key: String,
    pub sha256:       String,
    pub strategy:     &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateInfo {
    pub version_name: String,
    pub channel:      Channel,
    pub release_note: Option<String>,
    pub custom_data:  Option<String>,
    pub up_to_date:   bool,
    pub download:     Option<Download>,
}

impl UpdateInfo {
    fn new(version: &Version, channel: Channel, up_to_date: bool) -> Self {
        Self {
            version_name: version.name.clone(),
            channel,
            release_note: version.release_note.clone(),
            custom_data: version.custom_data.clone(),
            up_to_date,
            download: None,
        }
    }
}

/// An uploaded full artifact to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub resource_id:  String,
    pub channel:      Channel,
    pub name:         String,
    pub release_note: Option<String>,
    pub custom_data:  Option<String>,
    /// Upload location relative to the storage root.
    pub source_path:  String,
    pub platform:     Platform,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub version:    Version,
    /// Poll with [`UpdateService::task_status`].
    pub status_key: String,
}

/// Collaborators of an [`UpdateService`].
pub struct ServiceParts {
    pub repo:         Arc<dyn VersionRepository>,
    pub comparator:   Arc<VersionComparator>,
    pub cache:        Arc<VersionCache>,
    pub orchestrator: Arc<TaskOrchestrator>,
    pub router:       Arc<DistributionRouter>,
    pub validator:    Arc<dyn CdkValidator>,
}

/// Update queries, releases and metadata edits.
pub struct UpdateService {
    repo:           Arc<dyn VersionRepository>,
    comparator:     Arc<VersionComparator>,
    cache:          Arc<VersionCache>,
    orchestrator:   Arc<TaskOrchestrator>,
    router:         Arc<DistributionRouter>,
    validator:      Arc<dyn CdkValidator>,
    default_region: String,
}

impl UpdateService {
    pub fn new(parts: ServiceParts, default_region: impl Into<String>) -> Self {
        Self {
            repo:           parts.repo,
            comparator:     parts.comparator,
            cache:          parts.cache,
            orchestrator:   parts.orchestrator,
            router:         parts.router,
            validator:      parts.validator,
            default_region: default_region.into(),
        }
    }

    /// Resolve what `query` should download.
    ///
    /// An incremental patch is served when one exists for the client's
    /// version; otherwise its generation is requested and the full package is
    /// served in the meantime.
    pub async fn query(&self, query: &UpdateQuery) -> Result<UpdateInfo> {
        let os: Os = query.os.parse()?;
        let arch: Arch = query.arch.parse()?;
        let channel: Channel = query.channel.parse()?;
        let platform = Platform::new(os, arch);

        let latest = self.latest(&query.resource_id, platform, channel).await?;
        let comparison = query
            .current_version
            .as_deref()
            .map(|current| self.comparator.compare(&latest.name, current));
        let up_to_date = matches!(comparison, Some(Comparison::Less | Comparison::Equal));
        let mut info = UpdateInfo::new(&latest, channel, up_to_date);
        if up_to_date {
            return Ok(info);
        }

        let Some(cdk) = query.cdk.as_deref().filter(|cdk| !cdk.is_empty()) else {
            return Ok(info);
        };
        if let CdkVerdict::Rejected(message) = self
            .validator
            .validate(cdk, &query.resource_id, query.client_ip.as_deref())
            .await?
        {
            info!(resource_id = %query.resource_id, reason = %message, "license key rejected");
            return Err(Error::CdkRejected(message));
        }

        let incremental_from = match comparison {
            Some(Comparison::Greater) => query.current_version.as_deref(),
            _ => None,
        };
        let (kind, storage) = self
            .select_artifact(&query.resource_id, &latest, incremental_from, platform)
            .await?;

        let routed = self
            .router
            .distribute(&DistributeInfo {
                cdk:         cdk.to_string(),
                region:      query.region.clone().unwrap_or_else(|| self.default_region.clone()),
                path:        storage.path.clone(),
                resource_id: query.resource_id.clone(),
                client_ip:   query.client_ip.clone(),
            })
            .await?;
        info.download = Some(Download {
            kind,
            url: routed.url,
            download_key: routed.download_key,
            sha256: storage.hash,
            strategy: routed.strategy,
        });
        Ok(info)
    }

    async fn latest(&self, resource_id: &str, platform: Platform, channel: Channel) -> Result<Version> {
        let key = CacheKey::new(resource_id, platform.os, platform.arch, channel)?.to_string();
        let repo = self.repo.clone();
        let resource_id = resource_id.to_string();
        let version = self
            .cache
            .compute_if_absent(&key, None, move || async move {
                let pointer = repo
                    .get_latest_version(&resource_id, channel)
                    .await?
                    .ok_or_else(|| {
                        StoreError::NotFound(format!("{channel} release of '{resource_id}'"))
                    })?;
                repo.get_version(pointer.version_id).await
            })
            .await?;
        Ok(version)
    }

    async fn select_artifact(
        &self,
        resource_id: &str,
        latest: &Version,
        current: Option<&str>,
        platform: Platform,
    ) -> Result<(UpdateKind, Storage)> {
        if let Some(current) = current {
            match self.incremental(resource_id, latest, current, platform).await {
                Ok(Some(storage)) => return Ok((UpdateKind::Incremental, storage)),
                Ok(None) => {}
                Err(e) if e.is_not_found() => {
                    debug!(resource_id, current, "no incremental base, serving full package");
                }
                Err(e) => {
                    warn!(resource_id, current, error = %e, "patch lookup failed, serving full package");
                }
            }
        }
        let storage = self.repo.find_full_storage(latest.id, platform).await?;
        Ok((UpdateKind::Full, storage))
    }

    async fn incremental(
        &self,
        resource_id: &str,
        latest: &Version,
        current: &str,
        platform: Platform,
    ) -> Result<Option<Storage>> {
        let current = self.repo.get_version_by_name(resource_id, current).await?;
        let kind = StorageKind::Incremental {
            old_version_id: current.id,
        };
        if let Some(storage) = self.repo.find_storage(latest.id, platform, kind).await? {
            return Ok(Some(storage));
        }

        let requested = self
            .orchestrator
            .request_patch(PatchTask {
                resource_id:        resource_id.to_string(),
                current_version_id: current.id,
                target_version_id:  latest.id,
                os:                 platform.os,
                arch:               platform.arch,
            })
            .await?;
        if requested == Enqueued::AlreadyPending {
            debug!(resource_id, current = %current.name, target = %latest.name, "patch still pending");
        }
        Ok(None)
    }

    /// Register the version if needed and queue finalization of its artifact.
    pub async fn publish(&self, release: Release) -> Result<Published> {
        CacheKey::new(&release.resource_id, release.platform.os, release.platform.arch, release.channel)?;
        if !self.comparator.is_parsable(&release.name) {
            return Err(Error::Validation(format!(
                "version name '{}' matches no known version scheme",
                release.name
            )));
        }

        let version = match self
            .repo
            .get_version_by_name(&release.resource_id, &release.name)
            .await
        {
            Ok(version) => version,
            Err(e) if e.is_not_found() => {
                self.repo
                    .create_version(NewVersion {
                        resource_id:  release.resource_id.clone(),
                        channel:      release.channel,
                        name:         release.name.clone(),
                        release_note: release.release_note.clone(),
                        custom_data:  release.custom_data.clone(),
                    })
                    .await?
            }
            Err(e) => return Err(e.into()),
        };
        if version.channel != release.channel {
            return Err(Error::Validation(format!(
                "version '{}' was released on {}",
                version.name, version.channel
            )));
        }

        let status_key =
            TaskOrchestrator::finalize_status_key(&release.resource_id, version.id, release.platform);
        self.orchestrator
            .enqueue_finalize(FinalizeTask {
                source_path:  release.source_path,
                os:           release.platform.os,
                arch:         release.platform.arch,
                resource_id:  release.resource_id,
                version_id:   version.id,
                channel:      release.channel,
                version_name: version.name.clone(),
                kind:         StorageKind::Full,
                status_key:   status_key.clone(),
            })
            .await?;
        Ok(Published {
            version,
            status_key,
        })
    }

    pub async fn task_status(&self, status_key: &str) -> Result<TaskStatus> {
        Ok(self.orchestrator.status(status_key).await?)
    }

    /// Generation status of the patch from `current` to `target`.
    pub async fn patch_status(
        &self,
        resource_id: &str,
        current: &str,
        target: &str,
        platform: Platform,
    ) -> Result<TaskStatus> {
        let current = self.repo.get_version_by_name(resource_id, current).await?;
        let target = self.repo.get_version_by_name(resource_id, target).await?;
        let key = PatchKey {
            resource_id: resource_id.to_string(),
            target_version_id: target.id,
            current_version_id: current.id,
            platform,
        };
        Ok(self.orchestrator.patch_status(&key).await?)
    }

    /// Edit release note and custom data, then evict the resource's cached
    /// answers. The sequence number is untouched.
    pub async fn update_metadata(
        &self,
        resource_id: &str,
        version_name: &str,
        release_note: Option<String>,
        custom_data: Option<String>,
    ) -> Result<Version> {
        let version = self.repo.get_version_by_name(resource_id, version_name).await?;
        let updated = self
            .repo
            .update_version_metadata(version.id, release_note, custom_data)
            .await?;
        let evicted = self.invalidate(resource_id)?;
        info!(resource_id, version = %updated.name, evicted, "version metadata updated");
        Ok(updated)
    }

    /// Evict every cached answer of `resource_id`.
    pub fn invalidate(&self, resource_id: &str) -> Result<usize> { evict(&self.cache, resource_id) }

    /// Target recorded for a download key.
    pub async fn resolve_download(&self, download_key: &str) -> Result<DownloadTarget> {
        self.router
            .resolve(download_key)
            .await?
            .ok_or_else(|| Error::NotFound(format!("download key '{download_key}'")))
    }
}
