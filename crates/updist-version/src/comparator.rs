//! Ordered strategy list and the comparison contract.

use std::cmp::Ordering;

use tracing::{debug, warn};

use crate::{CalVerParser, DateTimeParser, ParsedVersion, SemVerParser, VersionParser};

/// Outcome of comparing two version strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Less,
    Equal,
    Greater,
    /// Either side is unparsable, or the two sides belong to different
    /// parser strategies.
    Incomparable,
}

impl Comparison {
    pub fn is_comparable(self) -> bool { self != Self::Incomparable }

    pub fn ordering(self) -> Option<Ordering> {
        match self {
            Self::Less => Some(Ordering::Less),
            Self::Equal => Some(Ordering::Equal),
            Self::Greater => Some(Ordering::Greater),
            Self::Incomparable => None,
        }
    }
}

impl From<Ordering> for Comparison {
    fn from(ordering: Ordering) -> Self {
        match ordering {
            Ordering::Less => Self::Less,
            Ordering::Equal => Self::Equal,
            Ordering::Greater => Self::Greater,
        }
    }
}

/// Compares version strings through an ordered list of parser strategies.
///
/// Strategy order is a priority list: a string accepted by several
/// strategies belongs to the first one. The default order is
/// date-time, then SemVer, then CalVer, so `20250204` is a date and
/// `2024.1.5` is a SemVer (while `2024.01.05` is a CalVer).
pub struct VersionComparator {
    parsers: Vec<Box<dyn VersionParser>>,
}

impl Default for VersionComparator {
    fn default() -> Self {
        Self::empty()
            .with_parser(DateTimeParser::default())
            .with_parser(SemVerParser)
            .with_parser(CalVerParser)
    }
}

impl std::fmt::Debug for VersionComparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.parsers.iter().map(|p| p.name()))
            .finish()
    }
}

impl VersionComparator {
    pub fn empty() -> Self { Self { parsers: Vec::new() } }

    /// Append a strategy with the lowest priority so far.
    pub fn with_parser<P: VersionParser + 'static>(mut self, parser: P) -> Self {
        self.parsers.push(Box::new(parser));
        self
    }

    pub fn parser_names(&self) -> Vec<&'static str> {
        self.parsers.iter().map(|p| p.name()).collect()
    }

    pub fn is_parsable(&self, version: &str) -> bool { self.resolve(version).is_some() }

    pub fn compare(&self, a: &str, b: &str) -> Comparison {
        let (Some((left_idx, left)), Some((right_idx, right))) = (self.resolve(a), self.resolve(b))
        else {
            return Comparison::Incomparable;
        };

        if left_idx != right_idx {
            debug!(
                left = a,
                right = b,
                left_family = self.parsers[left_idx].name(),
                right_family = self.parsers[right_idx].name(),
                "versions belong to different parser families"
            );
            return Comparison::Incomparable;
        }

        left.compare(&right)
            .map(Comparison::from)
            .unwrap_or(Comparison::Incomparable)
    }

    /// Parse `version` with the first strategy that claims it.
    fn resolve(&self, version: &str) -> Option<(usize, ParsedVersion)> {
        let (index, parser) = self
            .parsers
            .iter()
            .enumerate()
            .find(|(_, parser)| parser.can_parse(version))?;

        match parser.parse(version) {
            Ok(parsed) => Some((index, parsed)),
            Err(err) => {
                warn!(
                    version,
                    parser = parser.name(),
                    error = %err,
                    "parser accepted the shape but failed to parse"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_semver() {
        let cmp = VersionComparator::default();
        assert_eq!(cmp.compare("1.0.0", "1.0.1"), Comparison::Less);
        assert_eq!(cmp.compare("1.0.0-beta", "1.0.0"), Comparison::Less);
        assert_eq!(cmp.compare("v2.0.0", "1.9.9"), Comparison::Greater);
        assert_eq!(cmp.compare("1.0.0", "v1.0.0"), Comparison::Equal);
    }

    #[test]
    fn rejects_cross_family() {
        let cmp = VersionComparator::default();
        assert_eq!(cmp.compare("1.0.0", "20250204114023"), Comparison::Incomparable);
        assert_eq!(cmp.compare("2024.01", "1.0.0"), Comparison::Incomparable);
    }

    #[test]
    fn orders_timestamps() {
        let cmp = VersionComparator::default();
        assert_eq!(
            cmp.compare("20250204114023", "20250205000000"),
            Comparison::Less
        );
        assert_eq!(
            cmp.compare("2025-02-05 00:00:00", "20250204114023"),
            Comparison::Greater
        );
    }

    #[test]
    fn first_matching_strategy_wins() {
        let cmp = VersionComparator::default();
        // "2024.1.5" is claimed by SemVer, "2024.01.06" only by CalVer.
        assert_eq!(cmp.compare("2024.1.5", "2024.01.06"), Comparison::Incomparable);
        assert_eq!(cmp.compare("2024.01.05", "2024.01.06"), Comparison::Less);
    }

    #[test]
    fn strategy_order_is_configurable() {
        let cmp = VersionComparator::empty()
            .with_parser(CalVerParser)
            .with_parser(SemVerParser);
        assert_eq!(cmp.parser_names(), vec!["calver", "semver"]);
        assert!(cmp.is_parsable("2024.01"));
        assert!(!cmp.is_parsable("20250204114023"));
    }

    #[test]
    fn parse_failure_after_shape_match_is_unparsable() {
        let cmp = VersionComparator::default();
        assert!(!cmp.is_parsable("20251340000000"));
        assert_eq!(
            cmp.compare("20251340000000", "20251340000000"),
            Comparison::Incomparable
        );
    }

    #[test]
    fn garbage_is_incomparable() {
        let cmp = VersionComparator::default();
        assert!(!cmp.is_parsable("latest"));
        assert_eq!(cmp.compare("latest", "latest"), Comparison::Incomparable);
        assert_eq!(Comparison::Incomparable.ordering(), None);
    }
}
