use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::entries::sanitized_name;
use crate::{Error, Result};

/// Random-access reader over a zip archive. Entries are streamed to their
/// destination one at a time without extracting the whole archive.
///
/// Entries are addressed by the same sanitized names [`crate::hash_entries`]
/// reports, so `./bin/app` and `bin\app` are both found as `bin/app`.
/// Entries whose names cannot be sanitized are not addressable.
///
/// A `ZipSource` is not shared between threads; parallel readers each open
/// their own handle.
pub struct ZipSource {
    path:    PathBuf,
    archive: zip::ZipArchive<File>,
    index:   HashMap<String, usize>,
}

impl ZipSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| Error::Read {
            path: path.clone(),
            source: e,
        })?;
        let mut archive = zip::ZipArchive::new(file)?;
        let mut index = HashMap::with_capacity(archive.len());
        for i in 0..archive.len() {
            let entry = archive.by_index_raw(i)?;
            if entry.is_dir() {
                continue;
            }
            if let Ok(name) = sanitized_name(entry.name(), entry.enclosed_name()) {
                index.insert(name, i);
            }
        }
        Ok(Self {
            path,
            archive,
            index,
        })
    }

    pub fn path(&self) -> &Path { &self.path }

    /// Number of addressable file entries.
    pub fn len(&self) -> usize { self.index.len() }

    pub fn is_empty(&self) -> bool { self.index.is_empty() }

    pub fn contains(&self, name: &str) -> bool { self.index.contains_key(name) }

    /// Stream entry `name` into `dest`, creating parent directories.
    pub fn copy_entry(&mut self, name: &str, dest: impl AsRef<Path>) -> Result<u64> {
        let index = *self
            .index
            .get(name)
            .ok_or_else(|| Error::MissingEntry(name.to_string()))?;
        let mut entry = self.archive.by_index(index)?;
        Ok(updist_fs::copy_reader(&mut entry, dest)?)
    }
}
