//! Data model shared by the distribution crates: channels, platforms,
//! versions, their artifacts and the per-channel latest pointers.

mod channel;
mod error;
mod model;
mod platform;

pub use channel::Channel;
pub use error::{ResourceError, Result};
pub use model::{
    DistributeInfo, LatestVersionPointer, NewStorage, NewVersion, Storage, StorageId, StorageKind,
    Version, VersionId,
};
pub use platform::{Arch, Os, Platform};
pub use updist_verify::FileHashes;
