//! Incremental patches.
//!
//! [`calculate_diff`] classifies the paths of two file-hash maps;
//! [`PatchBuilder`] turns the resulting change set into an archive holding
//! the bytes of added and modified files plus a [`PatchManifest`] at
//! [`MANIFEST_NAME`]. Deleted paths travel in the manifest only.

mod builder;
mod diff;
mod error;
mod janitor;
mod manifest;

pub use builder::{PatchArtifact, PatchBuilder, PatchSource};
pub use diff::{Change, ChangeKind, calculate_diff};
pub use error::{Error, Result};
pub use janitor::{Janitor, JanitorHandle};
pub use manifest::{MANIFEST_NAME, PatchManifest};
