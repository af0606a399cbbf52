//! Version comparison over heterogeneous version strings.
//!
//! A [`VersionComparator`] holds an ordered list of [`VersionParser`]
//! strategies. The first strategy whose [`VersionParser::can_parse`] accepts a
//! string owns it; two strings are only comparable when the same strategy owns
//! both of them.
//!
//! # Version Schemes
//!
//! - **DateTime**: fixed timestamp layouts (`20250204114023`, `2025-02-04 11:40:23`)
//! - **SemVer**: Semantic Versioning 2.0 (`1.2.3`, `v1.0.0-beta.1`)
//! - **CalVer**: Calendar Versioning (`2024.01`, `2024.01.15`)

pub use self::calver::{CalVer, CalVerError};
pub use self::comparator::{Comparison, VersionComparator};
pub use self::error::VersionError;
pub use self::parser::{
    CalVerParser, DateTimeLayout, DateTimeParser, ParsedVersion, SemVerParser, VersionParser,
};

mod calver;
mod comparator;
mod error;
mod parser;
