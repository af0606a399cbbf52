use serde::{Deserialize, Serialize};
use updist_verify::FileHashes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Unchanged,
}

impl ChangeKind {
    /// Whether the path's bytes belong in the patch payload.
    pub fn carries_payload(self) -> bool { matches!(self, Self::Added | Self::Modified) }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Change {
    pub path: String,
    pub kind: ChangeKind,
}

impl Change {
    pub fn new(path: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Classify every path of `new_hashes ∪ old_hashes`.
///
/// The result carries no ordering guarantee; group by [`ChangeKind`] before use.
pub fn calculate_diff(new_hashes: &FileHashes, old_hashes: &FileHashes) -> Vec<Change> {
    let mut changes = Vec::with_capacity(new_hashes.len() + old_hashes.len() / 4);

    for (path, hash) in new_hashes {
        let kind = match old_hashes.get(path) {
            None => ChangeKind::Added,
            Some(old) if old != hash => ChangeKind::Modified,
            Some(_) => ChangeKind::Unchanged,
        };
        changes.push(Change::new(path.clone(), kind));
    }

    changes.extend(
        old_hashes
            .keys()
            .filter(|path| !new_hashes.contains_key(*path))
            .map(|path| Change::new(path.clone(), ChangeKind::Deleted)),
    );

    changes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hashes(pairs: &[(&str, &str)]) -> FileHashes {
        pairs
            .iter()
            .map(|(p, h)| (p.to_string(), h.to_string()))
            .collect()
    }

    #[test]
    fn classifies_every_kind() {
        let old = hashes(&[("same", "1"), ("changed", "2"), ("gone", "3")]);
        let new = hashes(&[("same", "1"), ("changed", "9"), ("fresh", "4")]);

        let mut changes = calculate_diff(&new, &old);
        changes.sort();
        assert_eq!(
            changes,
            vec![
                Change::new("fresh", ChangeKind::Added),
                Change::new("changed", ChangeKind::Modified),
                Change::new("gone", ChangeKind::Deleted),
                Change::new("same", ChangeKind::Unchanged),
            ]
        );
    }

    #[test]
    fn empty_inputs() {
        assert!(calculate_diff(&FileHashes::new(), &FileHashes::new()).is_empty());
        let old = hashes(&[("a", "1")]);
        assert_eq!(
            calculate_diff(&FileHashes::new(), &old),
            vec![Change::new("a", ChangeKind::Deleted)]
        );
    }

    #[test]
    fn payload_kinds() {
        assert!(ChangeKind::Added.carries_payload());
        assert!(ChangeKind::Modified.carries_payload());
        assert!(!ChangeKind::Deleted.carries_payload());
        assert!(!ChangeKind::Unchanged.carries_payload());
    }
}
