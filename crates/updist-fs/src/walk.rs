use std::path::{Component, Path, PathBuf};

use crate::{Error, Result};

/// Join a `/`-separated relative path onto `root`, refusing absolute paths
/// and any `..` component.
pub fn join_relative(root: &Path, relative: &str) -> Result<PathBuf> {
    let mut joined = root.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => joined.push(part),
            Component::CurDir => {}
            _ => return Err(Error::Escape(PathBuf::from(relative))),
        }
    }
    if joined == root {
        return Err(Error::Escape(PathBuf::from(relative)));
    }
    Ok(joined)
}

/// Every regular file under `root`, as sorted `/`-separated paths relative
/// to `root`. Symlinks are not followed.
pub fn walk_files(root: impl AsRef<Path>) -> Result<Vec<String>> {
    let root = root.as_ref();
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = std::fs::read_dir(&dir).map_err(|e| Error::Read {
            path: dir.clone(),
            source: e,
        })?;
        for entry in entries {
            let entry = entry.map_err(|e| Error::Read {
                path: dir.clone(),
                source: e,
            })?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(|e| Error::Read {
                path: path.clone(),
                source: e,
            })?;
            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() {
                files.push(relative_name(root, &path));
            }
        }
    }

    files.sort();
    Ok(files)
}

fn relative_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
