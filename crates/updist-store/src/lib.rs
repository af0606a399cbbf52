//! Storage collaborators of the distribution core.
//!
//! - [`KvStore`]: shared key-value store for locks, counters and markers
//! - [`VersionRepository`]: durable versions, artifacts and channel pointers
//! - [`ChannelCascade`]: keeps the stable/beta/alpha pointers ordered
//!
//! [`MemoryKvStore`] and [`MemoryRepository`] are complete in-process
//! implementations of both interfaces.

mod cascade;
mod error;
mod kv;
mod repository;

pub use cascade::ChannelCascade;
pub use error::{Result, StoreError};
pub use kv::{KvStore, MemoryKvStore};
pub use repository::{MemoryRepository, VersionRepository};
