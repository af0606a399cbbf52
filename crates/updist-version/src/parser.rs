//! Parser strategies.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use semver::Version;

use crate::{CalVer, VersionError};

static COMPACT_DATETIME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{14}$").unwrap());
static COMPACT_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{8}$").unwrap());
static SPACED_DATETIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2} [0-9]{2}:[0-9]{2}:[0-9]{2}$").unwrap()
});
static ISO_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").unwrap());
static RFC3339: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}T[0-9]{2}:[0-9]{2}:[0-9]{2}(?:\.[0-9]+)?(?:Z|[+-][0-9]{2}:[0-9]{2})$")
        .unwrap()
});

/// Value produced by a [`VersionParser`]. Values are only ever compared with
/// values produced by the same strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedVersion {
    SemVer(Version),
    DateTime(NaiveDateTime),
    CalVer(CalVer),
}

impl ParsedVersion {
    /// Ordering between two values of the same family, `None` across families.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::SemVer(a), Self::SemVer(b)) => Some(a.cmp_precedence(b)),
            (Self::DateTime(a), Self::DateTime(b)) => Some(a.cmp(b)),
            (Self::CalVer(a), Self::CalVer(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

/// A version format the comparator can recognise.
///
/// `can_parse` is a cheap shape check; `parse` may still fail on input the
/// predicate accepted (e.g. month 13), in which case the input is treated as
/// non-parsable rather than handed to the next strategy.
pub trait VersionParser: Send + Sync {
    fn name(&self) -> &'static str;

    fn can_parse(&self, input: &str) -> bool;

    fn parse(&self, input: &str) -> Result<ParsedVersion, VersionError>;
}

/// Semantic versions, with an optional single leading `v`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SemVerParser;

impl SemVerParser {
    fn strip(input: &str) -> &str {
        input
            .strip_prefix('v')
            .or_else(|| input.strip_prefix('V'))
            .unwrap_or(input)
    }
}

impl VersionParser for SemVerParser {
    fn name(&self) -> &'static str { "semver" }

    fn can_parse(&self, input: &str) -> bool { Version::parse(Self::strip(input)).is_ok() }

    fn parse(&self, input: &str) -> Result<ParsedVersion, VersionError> {
        Ok(ParsedVersion::SemVer(Version::parse(Self::strip(input))?))
    }
}

/// Timestamp layouts understood by [`DateTimeParser`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateTimeLayout {
    /// `20060102150405`
    Compact,
    /// `20060102`
    CompactDate,
    /// `2006-01-02 15:04:05`
    Spaced,
    /// `2006-01-02`
    IsoDate,
    /// `2006-01-02T15:04:05Z07:00`, normalised to UTC
    Rfc3339,
}

impl DateTimeLayout {
    pub const ALL: [DateTimeLayout; 5] = [
        Self::Compact,
        Self::CompactDate,
        Self::Spaced,
        Self::IsoDate,
        Self::Rfc3339,
    ];

    fn shape(self) -> &'static Regex {
        match self {
            Self::Compact => &*COMPACT_DATETIME,
            Self::CompactDate => &*COMPACT_DATE,
            Self::Spaced => &*SPACED_DATETIME,
            Self::IsoDate => &*ISO_DATE,
            Self::Rfc3339 => &*RFC3339,
        }
    }

    fn parse(self, input: &str) -> Result<NaiveDateTime, chrono::ParseError> {
        match self {
            Self::Compact => NaiveDateTime::parse_from_str(input, "%Y%m%d%H%M%S"),
            Self::Spaced => NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M:%S"),
            Self::CompactDate => NaiveDate::parse_from_str(input, "%Y%m%d").map(midnight),
            Self::IsoDate => NaiveDate::parse_from_str(input, "%Y-%m-%d").map(midnight),
            Self::Rfc3339 => DateTime::parse_from_rfc3339(input).map(|t| t.naive_utc()),
        }
    }
}

fn midnight(date: NaiveDate) -> NaiveDateTime { date.and_time(chrono::NaiveTime::MIN) }

/// Fixed-layout timestamps. All layouts belong to one family, so a compact
/// timestamp compares against a spaced one.
#[derive(Debug, Clone)]
pub struct DateTimeParser {
    layouts: Vec<DateTimeLayout>,
}

impl Default for DateTimeParser {
    fn default() -> Self { Self::new(DateTimeLayout::ALL.to_vec()) }
}

impl DateTimeParser {
    pub fn new(layouts: Vec<DateTimeLayout>) -> Self { Self { layouts } }

    fn layout_for(&self, input: &str) -> Option<DateTimeLayout> {
        self.layouts
            .iter()
            .copied()
            .find(|layout| layout.shape().is_match(input))
    }
}

impl VersionParser for DateTimeParser {
    fn name(&self) -> &'static str { "datetime" }

    fn can_parse(&self, input: &str) -> bool { self.layout_for(input).is_some() }

    fn parse(&self, input: &str) -> Result<ParsedVersion, VersionError> {
        let layout = self
            .layout_for(input)
            .ok_or_else(|| VersionError::UnknownLayout(input.to_string()))?;
        layout
            .parse(input)
            .map(ParsedVersion::DateTime)
            .map_err(|source| VersionError::DateTime {
                input: input.to_string(),
                source,
            })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CalVerParser;

impl VersionParser for CalVerParser {
    fn name(&self) -> &'static str { "calver" }

    fn can_parse(&self, input: &str) -> bool { CalVer::matches(input) }

    fn parse(&self, input: &str) -> Result<ParsedVersion, VersionError> {
        Ok(ParsedVersion::CalVer(CalVer::parse(input)?))
    }
}
