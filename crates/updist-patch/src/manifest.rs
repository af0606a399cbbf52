use serde::{Deserialize, Serialize};

use crate::{Change, ChangeKind, Error, Result};

/// Name of the manifest file at the root of every patch archive.
pub const MANIFEST_NAME: &str = ".updist-patch.json";

/// What a client applies: payload paths to write, paths to delete.
/// Unchanged paths are not listed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchManifest {
    pub added:    Vec<String>,
    pub modified: Vec<String>,
    pub deleted:  Vec<String>,
}

impl PatchManifest {
    pub fn from_changes(changes: &[Change]) -> Result<Self> {
        let mut manifest = Self::default();
        for change in changes {
            if change.path == MANIFEST_NAME {
                return Err(Error::ReservedPath(change.path.clone()));
            }
            match change.kind {
                ChangeKind::Added => manifest.added.push(change.path.clone()),
                ChangeKind::Modified => manifest.modified.push(change.path.clone()),
                ChangeKind::Deleted => manifest.deleted.push(change.path.clone()),
                ChangeKind::Unchanged => {}
            }
        }
        manifest.added.sort();
        manifest.modified.sort();
        manifest.deleted.sort();
        Ok(manifest)
    }

    /// Paths whose bytes go into the archive.
    pub fn payload_paths(&self) -> impl Iterator<Item = &str> {
        self.added.iter().chain(&self.modified).map(String::as_str)
    }

    pub fn payload_len(&self) -> usize { self.added.len() + self.modified.len() }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    pub fn to_json(&self) -> Result<Vec<u8>> { Ok(serde_json::to_vec_pretty(self)?) }

    pub fn from_json(bytes: &[u8]) -> Result<Self> { Ok(serde_json::from_slice(bytes)?) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_and_sorts() {
        let changes = vec![
            Change::new("b", ChangeKind::Added),
            Change::new("a", ChangeKind::Added),
            Change::new("m", ChangeKind::Modified),
            Change::new("d", ChangeKind::Deleted),
            Change::new("u", ChangeKind::Unchanged),
        ];
        let manifest = PatchManifest::from_changes(&changes).unwrap();
        assert_eq!(manifest.added, vec!["a", "b"]);
        assert_eq!(manifest.modified, vec!["m"]);
        assert_eq!(manifest.deleted, vec!["d"]);
        assert_eq!(manifest.payload_paths().collect::<Vec<_>>(), vec!["a", "b", "m"]);
        assert_eq!(manifest.payload_len(), 3);
    }

    #[test]
    fn json_layout() {
        let manifest = PatchManifest {
            added:    vec!["x".into()],
            modified: vec![],
            deleted:  vec!["y".into()],
        };
        let value: serde_json::Value = serde_json::from_slice(&manifest.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "added": ["x"], "modified": [], "deleted": ["y"] })
        );
        assert_eq!(PatchManifest::from_json(&manifest.to_json().unwrap()).unwrap(), manifest);
    }

    #[test]
    fn rejects_reserved_name() {
        let changes = vec![Change::new(MANIFEST_NAME, ChangeKind::Added)];
        assert!(matches!(
            PatchManifest::from_changes(&changes),
            Err(Error::ReservedPath(_))
        ));
    }
}
