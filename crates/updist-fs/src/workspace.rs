use std::path::{Path, PathBuf};

use crate::{AtomicWriteOptions, Error, Result, join_relative};

/// A uniquely named staging directory. It is removed on drop unless
/// [`detach`](Workspace::detach)ed, which hands ownership of the directory
/// to the caller.
#[derive(Debug)]
pub struct Workspace {
    root:  PathBuf,
    armed: bool,
}

impl Workspace {
    /// Create `{base}/{prefix}{uuid}`.
    pub fn create_in(base: impl AsRef<Path>, prefix: &str) -> Result<Self> {
        let root = base
            .as_ref()
            .join(format!("{prefix}{}", uuid::Uuid::new_v4().simple()));
        std::fs::create_dir_all(&root).map_err(|e| Error::CreateDir {
            path: root.clone(),
            source: e,
        })?;
        Ok(Self { root, armed: true })
    }

    pub fn path(&self) -> &Path { &self.root }

    /// Resolve a `/`-separated relative path inside the workspace.
    pub fn join(&self, relative: &str) -> Result<PathBuf> { join_relative(&self.root, relative) }

    pub fn write(&self, relative: &str, content: &[u8]) -> Result<PathBuf> {
        let full_path = self.join(relative)?;
        crate::atomic_write(&full_path, content, AtomicWriteOptions::new())?;
        Ok(full_path)
    }

    pub fn create_dir_all(&self, relative: &str) -> Result<PathBuf> {
        let full_path = self.join(relative)?;
        std::fs::create_dir_all(&full_path).map_err(|e| Error::CreateDir {
            path: full_path.clone(),
            source: e,
        })?;
        Ok(full_path)
    }

    /// Stop removing the directory on drop and return its path.
    pub fn detach(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.root)
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.armed && self.root.exists() {
            let _ = std::fs::remove_dir_all(&self.root);
        }
    }
}
