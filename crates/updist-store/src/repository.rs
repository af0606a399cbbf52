use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use updist_resource::{
    Channel, LatestVersionPointer, NewStorage, NewVersion, Platform, Storage, StorageId,
    StorageKind, Version, VersionId,
};

use crate::{Result, StoreError};

/// Durable records: versions, their artifacts and the per-channel latest
/// pointers. Missing rows surface as [`StoreError::NotFound`].
#[async_trait]
pub trait VersionRepository: Send + Sync {
    /// Assigns the id and the next per-resource sequence number. Names are
    /// unique within a resource.
    async fn create_version(&self, new: NewVersion) -> Result<Version>;

    async fn get_version(&self, id: VersionId) -> Result<Version>;

    async fn get_version_by_name(&self, resource_id: &str, name: &str) -> Result<Version>;

    /// Replace the release note and custom data. The sequence number is kept.
    async fn update_version_metadata(
        &self,
        id: VersionId,
        release_note: Option<String>,
        custom_data: Option<String>,
    ) -> Result<Version>;

    async fn get_latest_version(
        &self,
        resource_id: &str,
        channel: Channel,
    ) -> Result<Option<LatestVersionPointer>>;

    /// Insert or repoint the pointer for `(resource_id, channel)`.
    async fn upsert_latest_version(
        &self,
        resource_id: &str,
        channel: Channel,
        version: &Version,
    ) -> Result<LatestVersionPointer>;

    async fn list_latest_pointers(&self, resource_id: &str) -> Result<Vec<LatestVersionPointer>>;

    /// Insert an artifact row. A row with the same version, platform and kind
    /// is replaced, so retried tasks do not duplicate artifacts.
    async fn create_storage(&self, new: NewStorage) -> Result<Storage>;

    async fn find_storage(
        &self,
        version_id: VersionId,
        platform: Platform,
        kind: StorageKind,
    ) -> Result<Option<Storage>>;

    /// The full artifact serving `platform`, trying [`Platform::fallbacks`]
    /// in order.
    async fn find_full_storage(&self, version_id: VersionId, platform: Platform) -> Result<Storage> {
        for candidate in platform.fallbacks() {
            if let Some(storage) = self
                .find_storage(version_id, candidate, StorageKind::Full)
                .await?
            {
                return Ok(storage);
            }
        }
        Err(StoreError::NotFound(format!(
            "full artifact of version {version_id} for {platform}"
        )))
    }

    async fn list_storages(&self, resource_id: &str) -> Result<Vec<Storage>>;

    async fn list_resources(&self) -> Result<Vec<String>>;

    async fn delete_storage(&self, id: StorageId) -> Result<()>;
}

#[derive(Debug, Default)]
struct Tables {
    versions:        BTreeMap<VersionId, Version>,
    storages:        BTreeMap<StorageId, Storage>,
    pointers:        HashMap<(String, Channel), LatestVersionPointer>,
    next_version_id: VersionId,
    next_storage_id: StorageId,
}

impl Tables {
    fn version(&self, id: VersionId) -> Result<&Version> {
        self.versions
            .get(&id)
            .ok_or_else(|| StoreError::NotFound(format!("version {id}")))
    }
}

/// In-process [`VersionRepository`] used by tests and the standalone daemon.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    tables: RwLock<Tables>,
}

impl MemoryRepository {
    pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl VersionRepository for MemoryRepository {
    async fn create_version(&self, new: NewVersion) -> Result<Version> {
        let mut tables = self.tables.write();
        let mut sequence = 0;
        for existing in tables.versions.values() {
            if existing.resource_id != new.resource_id {
                continue;
            }
            if existing.name == new.name {
                return Err(StoreError::Conflict(format!(
                    "version '{}' of '{}'",
                    new.name, new.resource_id
                )));
            }
            sequence = sequence.max(existing.sequence);
        }

        tables.next_version_id += 1;
        let version = Version {
            id:           tables.next_version_id,
            resource_id:  new.resource_id,
            channel:      new.channel,
            sequence:     sequence + 1,
            name:         new.name,
            created_at:   Utc::now(),
            release_note: new.release_note,
            custom_data:  new.custom_data,
        };
        tables.versions.insert(version.id, version.clone());
        Ok(version)
    }

    async fn get_version(&self, id: VersionId) -> Result<Version> {
        self.tables.read().version(id).cloned()
    }

    async fn get_version_by_name(&self, resource_id: &str, name: &str) -> Result<Version> {
        self.tables
            .read()
            .versions
            .values()
            .find(|v| v.resource_id == resource_id && v.name == name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("version '{name}' of '{resource_id}'")))
    }

    async fn update_version_metadata(
        &self,
        id: VersionId,
        release_note: Option<String>,
        custom_data: Option<String>,
    ) -> Result<Version> {
        let mut tables = self.tables.write();
        let version = tables
            .versions
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("version {id}")))?;
        version.release_note = release_note;
        version.custom_data = custom_data;
        Ok(version.clone())
    }

    async fn get_latest_version(
        &self,
        resource_id: &str,
        channel: Channel,
    ) -> Result<Option<LatestVersionPointer>> {
        Ok(self
            .tables
            .read()
            .pointers
            .get(&(resource_id.to_string(), channel))
            .cloned())
    }

    async fn upsert_latest_version(
        &self,
        resource_id: &str,
        channel: Channel,
        version: &Version,
    ) -> Result<LatestVersionPointer> {
        let mut tables = self.tables.write();
        tables.version(version.id)?;
        let pointer = LatestVersionPointer {
            resource_id:  resource_id.to_string(),
            channel,
            version_id:   version.id,
            version_name: version.name.clone(),
            updated_at:   Utc::now(),
        };
        tables
            .pointers
            .insert((resource_id.to_string(), channel), pointer.clone());
        Ok(pointer)
    }

    async fn list_latest_pointers(&self, resource_id: &str) -> Result<Vec<LatestVersionPointer>> {
        let tables = self.tables.read();
        Ok(Channel::ALL
            .iter()
            .filter_map(|channel| tables.pointers.get(&(resource_id.to_string(), *channel)))
            .cloned()
            .collect())
    }

    async fn create_storage(&self, new: NewStorage) -> Result<Storage> {
        let mut tables = self.tables.write();
        tables.version(new.version_id)?;
        if let StorageKind::Incremental { old_version_id } = new.kind {
            tables.version(old_version_id)?;
        }

        let replaced = tables
            .storages
            .values()
            .find(|s| {
                s.version_id == new.version_id && s.platform == new.platform && s.kind == new.kind
            })
            .map(|s| s.id);
        let id = match replaced {
            Some(id) => id,
            None => {
                tables.next_storage_id += 1;
                tables.next_storage_id
            }
        };

        let storage = Storage {
            id,
            version_id: new.version_id,
            platform: new.platform,
            kind: new.kind,
            path: new.path,
            hash: new.hash,
            file_hashes: new.file_hashes,
            created_at: Utc::now(),
        };
        tables.storages.insert(id, storage.clone());
        Ok(storage)
    }

    async fn find_storage(
        &self,
        version_id: VersionId,
        platform: Platform,
        kind: StorageKind,
    ) -> Result<Option<Storage>> {
        Ok(self
            .tables
            .read()
            .storages
            .values()
            .find(|s| s.version_id == version_id && s.platform == platform && s.kind == kind)
            .cloned())
    }

    async fn list_storages(&self, resource_id: &str) -> Result<Vec<Storage>> {
        let tables = self.tables.read();
        Ok(tables
            .storages
            .values()
            .filter(|s| {
                tables
                    .versions
                    .get(&s.version_id)
                    .is_some_and(|v| v.resource_id == resource_id)
            })
            .cloned()
            .collect())
    }

    async fn list_resources(&self) -> Result<Vec<String>> {
        let tables = self.tables.read();
        let mut resources: Vec<String> = tables
            .versions
            .values()
            .map(|v| v.resource_id.clone())
            .collect();
        resources.sort();
        resources.dedup();
        Ok(resources)
    }

    async fn delete_storage(&self, id: StorageId) -> Result<()> {
        self.tables
            .write()
            .storages
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("storage {id}")))
    }
}
