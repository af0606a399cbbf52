//! Read-through cache for update queries.
//!
//! [`Cache`] coalesces concurrent misses into a single computation. Keys for
//! latest-version answers are built with [`CacheKey`], whose bounded key space
//! lets a resource's entries be invalidated by enumeration.

mod cache;
mod key;

pub use cache::Cache;
pub use key::{CacheKey, DELIMITER, KeyError};
