use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::{AtomicWriteOptions, Error, Result, ensure_parent};

/// A file written under a temporary sibling name and renamed into place on
/// [`commit`](AtomicFile::commit). Dropping it uncommitted removes the
/// temporary file, so the destination never holds a partial write.
pub struct AtomicFile {
    file:         Option<File>,
    staging_path: PathBuf,
    destination:  PathBuf,
    options:      AtomicWriteOptions,
}

impl AtomicFile {
    pub fn create(destination: impl AsRef<Path>) -> Result<Self> {
        Self::create_with(destination, AtomicWriteOptions::new())
    }

    pub fn create_with(destination: impl AsRef<Path>, options: AtomicWriteOptions) -> Result<Self> {
        let destination = destination.as_ref().to_path_buf();
        ensure_parent(&destination)?;

        let file_name = destination
            .file_name()
            .ok_or_else(|| Error::NoParent(destination.clone()))?
            .to_string_lossy();
        let staging_name = format!(
            "{}{}.{}{}",
            options.prefix_str(),
            file_name,
            uuid::Uuid::new_v4().simple(),
            options.suffix_str()
        );
        let staging_path = destination.with_file_name(staging_name);

        let file = File::create(&staging_path).map_err(|e| Error::Write {
            path: staging_path.clone(),
            source: e,
        })?;

        Ok(Self {
            file: Some(file),
            staging_path,
            destination,
            options,
        })
    }

    pub fn staging_path(&self) -> &Path { &self.staging_path }

    pub fn destination(&self) -> &Path { &self.destination }

    /// Flush, apply permissions and rename over the destination.
    pub fn commit(mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()
                .and_then(|_| file.sync_all())
                .map_err(|e| Error::Write {
                    path: self.staging_path.clone(),
                    source: e,
                })?;
        }

        if let Some(perms) = self.options.into_permissions() {
            std::fs::set_permissions(&self.staging_path, perms).map_err(|e| Error::Write {
                path: self.staging_path.clone(),
                source: e,
            })?;
        }

        std::fs::rename(&self.staging_path, &self.destination).map_err(|e| Error::Rename {
            from:   self.staging_path.clone(),
            to:     self.destination.clone(),
            source: e,
        })?;
        self.staging_path = PathBuf::new();
        Ok(())
    }
}

impl Write for AtomicFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.file.as_mut() {
            Some(file) => file.write(buf),
            None => Err(io::Error::other("atomic file already committed")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl io::Seek for AtomicFile {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        match self.file.as_mut() {
            Some(file) => file.seek(pos),
            None => Err(io::Error::other("atomic file already committed")),
        }
    }
}

impl Drop for AtomicFile {
    fn drop(&mut self) {
        drop(self.file.take());
        if !self.staging_path.as_os_str().is_empty() {
            let _ = std::fs::remove_file(&self.staging_path);
        }
    }
}
