use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use crate::{Hasher, Result, Sha256Hasher, VerificationError};

/// Relative `/`-separated path to lowercase hex SHA-256.
pub type FileHashes = BTreeMap<String, String>;

const BUF_SIZE: usize = 64 * 1024;

/// Hash everything `reader` yields.
pub fn hash_reader<R: Read + ?Sized>(reader: &mut R) -> std::io::Result<String> {
    let mut hasher = Sha256Hasher::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

pub fn hash_file(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let io_err = |source| VerificationError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = std::fs::File::open(path).map_err(io_err)?;
    hash_reader(&mut file).map_err(io_err)
}

/// Hash every regular file under `root`. The map is complete or the call
/// fails; no partial map is ever returned.
pub fn hash_tree(root: impl AsRef<Path>) -> Result<FileHashes> {
    let root = root.as_ref();
    let mut hashes = FileHashes::new();
    for relative in updist_fs::walk_files(root)? {
        let full = updist_fs::join_relative(root, &relative)?;
        let digest = hash_file(&full)?;
        hashes.insert(relative, digest);
    }
    Ok(hashes)
}

/// Compare a file against an expected hex digest.
pub fn verify_file(path: impl AsRef<Path>, expected: &str) -> Result<()> {
    let path = path.as_ref();
    let actual = hash_file(path)?;
    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(VerificationError::Mismatch {
            path: path.to_path_buf(),
            expected: expected.to_string(),
            actual,
        })
    }
}
