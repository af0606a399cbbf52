//! Update distribution service.
//!
//! [`UpdateService`] answers update checks: it resolves the latest version of
//! a channel through a single-flight cache, picks a full package or an
//! incremental patch (queueing the patch when it does not exist yet) and
//! routes the download through the edge pool or the signed CDN. Releases are
//! finalized by background workers that publish through the channel cascade.
//!
//! [`App`] wires everything over the in-memory collaborators and owns the
//! background tasks; `updistd` runs it until Ctrl-C.

mod app;
pub mod cdk;
pub mod config;
mod error;
pub mod logging;
mod service;

pub use app::{App, AppError, PATCH_DIR};
pub use error::{Error, Result};
pub use service::{
    Download, Published, Release, ServiceParts, UpdateInfo, UpdateKind, UpdateQuery,
    UpdateService, VersionCache, cache_invalidator,
};
