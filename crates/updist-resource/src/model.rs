use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use updist_verify::FileHashes;

use crate::{Channel, Platform};

pub type VersionId = u64;
pub type StorageId = u64;

/// A published version of a resource. Only `release_note` and `custom_data`
/// change after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub id:           VersionId,
    pub resource_id:  String,
    pub channel:      Channel,
    /// Per-resource sequence number, strictly increasing in creation order.
    pub sequence:     u64,
    pub name:         String,
    pub created_at:   DateTime<Utc>,
    pub release_note: Option<String>,
    pub custom_data:  Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVersion {
    pub resource_id:  String,
    pub channel:      Channel,
    pub name:         String,
    pub release_note: Option<String>,
    pub custom_data:  Option<String>,
}

/// Full package, or a patch against exactly one older version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StorageKind {
    Full,
    Incremental { old_version_id: VersionId },
}

impl StorageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Incremental { .. } => "incremental",
        }
    }

    pub fn is_incremental(self) -> bool { matches!(self, Self::Incremental { .. }) }

    pub fn old_version_id(self) -> Option<VersionId> {
        match self {
            Self::Full => None,
            Self::Incremental { old_version_id } => Some(old_version_id),
        }
    }
}

/// An artifact of a version for one platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Storage {
    pub id:          StorageId,
    pub version_id:  VersionId,
    pub platform:    Platform,
    pub kind:        StorageKind,
    /// Artifact path relative to the storage root, `/`-separated.
    pub path:        String,
    pub hash:        String,
    pub file_hashes: Option<FileHashes>,
    pub created_at:  DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStorage {
    pub version_id:  VersionId,
    pub platform:    Platform,
    pub kind:        StorageKind,
    pub path:        String,
    pub hash:        String,
    pub file_hashes: Option<FileHashes>,
}

/// The latest version of one channel of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestVersionPointer {
    pub resource_id:  String,
    pub channel:      Channel,
    pub version_id:   VersionId,
    pub version_name: String,
    pub updated_at:   DateTime<Utc>,
}

/// Request context handed to the distribution router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributeInfo {
    /// License key; also the daily download-limit key.
    pub cdk:         String,
    pub region:      String,
    /// Artifact path relative to the storage root.
    pub path:        String,
    pub resource_id: String,
    pub client_ip:   Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_kind_invariant_is_structural() {
        let full = StorageKind::Full;
        let patch = StorageKind::Incremental { old_version_id: 7 };
        assert_eq!(full.old_version_id(), None);
        assert_eq!(patch.old_version_id(), Some(7));
        assert!(patch.is_incremental());
        assert_eq!(patch.as_str(), "incremental");
    }

    #[test]
    fn storage_kind_json_shape() {
        let json = serde_json::to_value(StorageKind::Incremental { old_version_id: 3 }).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "kind": "incremental", "old_version_id": 3 })
        );
        let full: StorageKind = serde_json::from_str(r#"{"kind":"full"}"#).unwrap();
        assert_eq!(full, StorageKind::Full);
    }
}
