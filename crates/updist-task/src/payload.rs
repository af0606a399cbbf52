use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use updist_resource::{Arch, Channel, Os, Platform, StorageKind, VersionId};
use uuid::Uuid;

use crate::{Result, TaskError};

/// A JSON payload bound to one task type name.
pub trait TaskPayload: Serialize + DeserializeOwned + Send {
    const TYPE: &'static str;
}

/// Build an incremental artifact of `target` against `current`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchTask {
    pub resource_id:        String,
    pub current_version_id: VersionId,
    pub target_version_id:  VersionId,
    pub os:                 Os,
    pub arch:               Arch,
}

impl PatchTask {
    pub fn platform(&self) -> Platform { Platform::new(self.os, self.arch) }
}

impl TaskPayload for PatchTask {
    const TYPE: &'static str = "patch:generate";
}

/// Register an uploaded artifact as a storage row and publish its version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeTask {
    /// Uploaded artifact, relative to the storage root. A zip, a tar.gz or a
    /// directory (packed into a zip on finalization).
    pub source_path:  String,
    pub os:           Os,
    pub arch:         Arch,
    pub resource_id:  String,
    pub version_id:   VersionId,
    pub channel:      Channel,
    pub version_name: String,
    #[serde(rename = "incremental_type")]
    pub kind:         StorageKind,
    pub status_key:   String,
}

impl FinalizeTask {
    pub fn platform(&self) -> Platform { Platform::new(self.os, self.arch) }
}

impl TaskPayload for FinalizeTask {
    const TYPE: &'static str = "artifact:finalize";
}

/// Drop incremental artifacts that no channel can serve anymore.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeTask {}

impl TaskPayload for PurgeTask {
    const TYPE: &'static str = "storage:purge";
}

/// Envelope stored in the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id:        Uuid,
    pub task_type: String,
    pub payload:   String,
    /// Retries allowed after the first attempt.
    pub max_retry: u32,
    /// Retries performed so far.
    pub retried:   u32,
}

impl Task {
    pub fn new<P: TaskPayload>(payload: &P, max_retry: u32) -> Result<Self> {
        let payload = serde_json::to_string(payload).map_err(|source| TaskError::Payload {
            task_type: P::TYPE.to_string(),
            source,
        })?;
        Ok(Self {
            id: Uuid::new_v4(),
            task_type: P::TYPE.to_string(),
            payload,
            max_retry,
            retried: 0,
        })
    }

    pub fn decode<P: TaskPayload>(&self) -> Result<P> {
        serde_json::from_str(&self.payload).map_err(|source| TaskError::Payload {
            task_type: self.task_type.clone(),
            source,
        })
    }

    pub fn can_retry(&self) -> bool { self.retried < self.max_retry }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_payload_schema() {
        let task = PatchTask {
            resource_id:        "app".into(),
            current_version_id: 1,
            target_version_id:  2,
            os:                 Os::Windows,
            arch:               Arch::X64,
        };
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "resource_id": "app",
                "current_version_id": 1,
                "target_version_id": 2,
                "os": "windows",
                "arch": "x64"
            })
        );
    }

    #[test]
    fn envelope_round_trip_and_type_check() {
        let finalize = FinalizeTask {
            source_path:  "uploads/app-1.zip".into(),
            os:           Os::Any,
            arch:         Arch::Any,
            resource_id:  "app".into(),
            version_id:   1,
            channel:      Channel::Stable,
            version_name: "1.0.0".into(),
            kind:         StorageKind::Full,
            status_key:   "status".into(),
        };
        let task = Task::new(&finalize, 5).unwrap();
        assert_eq!(task.task_type, "artifact:finalize");
        assert!(task.payload.contains("\"incremental_type\""));
        assert_eq!(task.decode::<FinalizeTask>().unwrap(), finalize);
        assert!(matches!(
            task.decode::<PatchTask>(),
            Err(TaskError::Payload { .. })
        ));
    }

    #[test]
    fn purge_payload_is_empty_object() {
        let task = Task::new(&PurgeTask {}, 0).unwrap();
        assert_eq!(task.payload, "{}");
        assert!(!task.can_retry());
    }
}
