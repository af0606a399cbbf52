use std::sync::Arc;

use tracing::{info, warn};
use updist_resource::{Channel, Version};
use updist_version::{Comparison, VersionComparator};

use crate::{Result, StoreError, VersionRepository};

/// Keeps the channel ordering `stable <= beta <= alpha` when a new latest
/// version is published.
///
/// The pointer of the published channel is always repointed. The version then
/// flows down into each less trusted channel as long as it is not older than
/// that channel's current latest. A missing pointer stops the cascade; an
/// incomparable pair aborts it with [`StoreError::Incomparable`].
pub struct ChannelCascade {
    repo:       Arc<dyn VersionRepository>,
    comparator: Arc<VersionComparator>,
}

impl ChannelCascade {
    pub fn new(repo: Arc<dyn VersionRepository>, comparator: Arc<VersionComparator>) -> Self {
        Self { repo, comparator }
    }

    /// Returns the channels whose pointer now references `version`.
    pub async fn update_latest(
        &self,
        resource_id: &str,
        channel: Channel,
        version: &Version,
    ) -> Result<Vec<Channel>> {
        let mut updated = Vec::new();
        let mut current = channel;

        loop {
            self.repo
                .upsert_latest_version(resource_id, current, version)
                .await?;
            info!(resource_id, channel = %current, version = %version.name, "latest version updated");
            updated.push(current);

            let Some(next) = current.next() else {
                break;
            };
            let Some(existing) = self.repo.get_latest_version(resource_id, next).await? else {
                break;
            };

            match self.comparator.compare(&version.name, &existing.version_name) {
                Comparison::Incomparable => {
                    warn!(
                        resource_id,
                        channel = %next,
                        current = %existing.version_name,
                        candidate = %version.name,
                        "cascade halted on incomparable versions"
                    );
                    return Err(StoreError::Incomparable {
                        channel:   next,
                        current:   existing.version_name,
                        candidate: version.name.clone(),
                    });
                }
                Comparison::Less => break,
                Comparison::Equal | Comparison::Greater => current = next,
            }
        }

        Ok(updated)
    }
}
