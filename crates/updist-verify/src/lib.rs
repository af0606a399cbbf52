//! Content hashing for update artifacts.
//!
//! Artifacts and unpacked trees are identified by lowercase hex SHA-256.
//! [`hash_tree`] produces the per-file map the diff engine consumes.

pub use self::error::{Result, VerificationError};
pub use self::hasher::{Hasher, Sha256Hasher};
pub use self::tree::{FileHashes, hash_file, hash_reader, hash_tree, verify_file};

mod error;
mod hasher;
mod tree;
