//! Filesystem primitives for building update artifacts.
//!
//! - [`atomic_write`] / [`AtomicFile`]: stage next to the destination, then rename
//! - [`Workspace`]: a staging directory removed on drop unless detached
//! - [`copy_file`] / [`copy_reader`]: copies that create parent directories on demand
//! - [`walk_files`]: relative, `/`-separated listing of every regular file in a tree

mod atomic_file;
mod error;
mod walk;
mod workspace;

pub use atomic_file::AtomicFile;
pub use error::{Error, Result};
pub use walk::{join_relative, walk_files};
pub use workspace::Workspace;

use std::io::Read;
use std::path::Path;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

#[cfg(unix)]
const DEFAULT_PERMISSIONS: u32 = 0o644;

#[cfg(not(unix))]
const DEFAULT_PERMISSIONS: u32 = 0;

#[derive(Clone, Copy, Debug)]
pub struct AtomicWriteOptions {
    permissions: u32,
    prefix:      &'static str,
    suffix:      &'static str,
}

impl Default for AtomicWriteOptions {
    fn default() -> Self { Self::new() }
}

impl AtomicWriteOptions {
    pub fn new() -> Self {
        Self {
            permissions: DEFAULT_PERMISSIONS,
            prefix:      ".",
            suffix:      ".tmp",
        }
    }

    #[cfg(unix)]
    pub fn permissions(mut self, permissions: u32) -> Self {
        self.permissions = permissions;
        self
    }

    #[cfg(not(unix))]
    pub fn permissions(self, _permissions: u32) -> Self { self }

    pub fn prefix(mut self, prefix: &'static str) -> Self {
        self.prefix = prefix;
        self
    }

    pub fn suffix(mut self, suffix: &'static str) -> Self {
        self.suffix = suffix;
        self
    }

    #[cfg(unix)]
    pub fn into_permissions(self) -> Option<std::fs::Permissions> {
        Some(std::fs::Permissions::from_mode(self.permissions))
    }

    #[cfg(not(unix))]
    pub fn into_permissions(self) -> Option<std::fs::Permissions> { None }

    pub fn prefix_str(&self) -> &'static str { self.prefix }

    pub fn suffix_str(&self) -> &'static str { self.suffix }
}

/// Write `content` to a sibling temp file and rename it over `path`.
pub fn atomic_write(
    path: impl AsRef<Path>,
    content: &[u8],
    options: AtomicWriteOptions,
) -> Result<()> {
    let mut file = AtomicFile::create_with(path, options)?;
    std::io::Write::write_all(&mut file, content).map_err(|e| Error::Write {
        path: file.staging_path().to_path_buf(),
        source: e,
    })?;
    file.commit()
}

pub fn atomic_read(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    std::fs::read(path).map_err(|e| Error::Read {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Create every missing ancestor of `path`.
pub fn ensure_parent(path: &Path) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| Error::NoParent(path.to_path_buf()))?;
    if parent.as_os_str().is_empty() || parent.exists() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|e| Error::CreateDir {
        path: parent.to_path_buf(),
        source: e,
    })
}

/// Copy one file, creating the destination's parent directories.
pub fn copy_file(src: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<u64> {
    let src = src.as_ref();
    let dest = dest.as_ref();
    let mut reader = std::fs::File::open(src).map_err(|e| Error::Read {
        path: src.to_path_buf(),
        source: e,
    })?;
    copy_reader(&mut reader, dest)
}

/// Stream `reader` into `dest`, creating the destination's parent directories.
pub fn copy_reader<R: Read + ?Sized>(reader: &mut R, dest: impl AsRef<Path>) -> Result<u64> {
    let dest = dest.as_ref();
    ensure_parent(dest)?;
    let mut file = std::fs::File::create(dest).map_err(|e| Error::Write {
        path: dest.to_path_buf(),
        source: e,
    })?;
    std::io::copy(reader, &mut file).map_err(|e| Error::Write {
        path: dest.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_atomic_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.txt");
        atomic_write(&path, b"data", AtomicWriteOptions::new()).unwrap();
        assert_eq!(atomic_read(&path).unwrap(), b"data");
    }

    #[cfg(unix)]
    #[test]
    fn test_atomic_write_with_permissions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.txt");
        atomic_write(&path, b"data", AtomicWriteOptions::new().permissions(0o600)).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_copy_file_creates_parents() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src.txt");
        std::fs::write(&src, "payload").unwrap();
        let dest = dir.path().join("a/b/c/dest.txt");

        let copied = copy_file(&src, &dest).unwrap();
        assert_eq!(copied, 7);
        assert_eq!(std::fs::read(&dest).unwrap(), b"payload");
    }

    #[test]
    fn test_copy_file_missing_source() {
        let dir = tempdir().unwrap();
        let err = copy_file(dir.path().join("nope"), dir.path().join("out")).unwrap_err();
        assert!(matches!(err, Error::Read { .. }));
    }
}
