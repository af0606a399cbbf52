//! Calendar Versioning.

use once_cell::sync::Lazy;
use regex::Regex;
use semver::Version;
use thiserror::Error;

static CALVER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?<year>[0-9]{4})[-.](?<month>(0?[1-9]|10|11|12))(?:\.(?<day>(0?[1-9]|[1-3][0-9])))?(?:\+(?<micro>[0-9]+))?(?:-(?<pre>[a-zA-Z][-0-9a-zA-Z.]+))?$").unwrap()
});

#[derive(Debug, Error)]
#[error("invalid CalVer format: {0}")]
pub struct CalVerError(pub String);

/// Calendar version, stored as a semver triple `year.month.day` so the
/// derived ordering is chronological.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CalVer(Version);

impl CalVer {
    pub fn matches(s: &str) -> bool { CALVER_REGEX.is_match(s) }

    /// Parse `YYYY.MM`, `YYYY.MM.DD`, `YYYY-MM` with optional `+micro` and `-pre`.
    pub fn parse(s: &str) -> Result<Self, CalVerError> {
        let caps = CALVER_REGEX
            .captures(s)
            .ok_or_else(|| CalVerError(s.to_string()))?;

        let year = caps.name("year").map(|c| c.as_str()).unwrap_or("0");
        let month = caps
            .name("month")
            .map(|c| c.as_str().trim_start_matches('0'))
            .unwrap_or("0");
        let day = caps
            .name("day")
            .map(|c| c.as_str().trim_start_matches('0'))
            .unwrap_or("0");

        let mut version = format!("{}.{}.{}", year.trim_start_matches('0'), month, day);

        if let Some(pre) = caps.name("pre") {
            version.push('-');
            version.push_str(pre.as_str());
        }

        if let Some(micro) = caps.name("micro") {
            version.push('+');
            version.push_str(micro.as_str());
        }

        Ok(Self(
            Version::parse(&version).map_err(|_| CalVerError(s.to_string()))?,
        ))
    }

    pub fn year(&self) -> u64 { self.0.major }

    pub fn month(&self) -> u64 { self.0.minor }

    pub fn day(&self) -> u64 { self.0.patch }
}

impl std::str::FromStr for CalVer {
    type Err = CalVerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> { CalVer::parse(s) }
}

impl std::fmt::Display for CalVer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}.{:02}", self.0.major, self.0.minor)?;
        if self.0.patch > 0 {
            write!(f, ".{:02}", self.0.patch)?;
        }
        if !self.0.pre.is_empty() {
            write!(f, "-{}", self.0.pre)?;
        }
        if !self.0.build.is_empty() {
            write!(f, "+{}", self.0.build)?;
        }
        Ok(())
    }
}
