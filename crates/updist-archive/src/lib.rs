//! Archive handling for update artifacts.
//!
//! Patches and full packages are zip or tar.gz files. Packing goes through
//! [`updist_fs::AtomicFile`], reading sanitizes every entry name before it
//! touches the filesystem.

mod entries;
mod error;
mod format;
mod pack;
mod zip_source;

pub use entries::{ExtractReport, extract, hash_entries};
pub use error::{Error, Result};
pub use format::{ArchiveFormat, detect_file, detect_format};
pub use pack::{PackReport, pack_dir};
pub use zip_source::ZipSource;
