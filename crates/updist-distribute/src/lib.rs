//! Download routing for update artifacts.
//!
//! [`DistributionRouter`] records a short-lived download key for every
//! request, then flips a weighted coin between two [`Distributor`]s:
//!
//! - [`EdgeDistributor`] picks a server from the region's
//!   [`WeightedRoundRobin`] pool in the [`PoolRegistry`]
//! - [`CdnDistributor`] enforces the [`DailyLimiter`] cap for the license key
//!   and returns a URL signed by [`UrlSigner`]
//!
//! [`StatsCollector`] aggregates download counts off the request path.

mod distributor;
mod error;
mod limiter;
mod registry;
mod router;
mod signer;
mod stats;
mod wrr;

pub use distributor::{CdnDistributor, Distributor, EdgeDistributor};
pub use error::{DistributeError, Result};
pub use limiter::DailyLimiter;
pub use registry::PoolRegistry;
pub use router::{Distribution, DistributionRouter, DownloadTarget, RouterOptions};
pub use signer::{AUTH_PARAM, UrlSigner};
pub use stats::{StatsCollector, StatsHandle};
pub use wrr::{Endpoint, WeightedRoundRobin};
