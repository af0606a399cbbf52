use proptest::prelude::*;
use updist_version::{Comparison, VersionComparator};

proptest! {
    #[test]
    fn semver_compares_equal_to_itself(major in 0u64..1000, minor in 0u64..1000, patch in 0u64..1000) {
        let cmp = VersionComparator::default();
        let v = format!("{major}.{minor}.{patch}");
        prop_assert_eq!(cmp.compare(&v, &v), Comparison::Equal);
    }

    #[test]
    fn semver_order_matches_tuple_order(
        a in (0u64..50, 0u64..50, 0u64..50),
        b in (0u64..50, 0u64..50, 0u64..50),
    ) {
        let cmp = VersionComparator::default();
        let left = format!("{}.{}.{}", a.0, a.1, a.2);
        let right = format!("{}.{}.{}", b.0, b.1, b.2);
        prop_assert_eq!(cmp.compare(&left, &right).ordering(), Some(a.cmp(&b)));
    }

    #[test]
    fn compare_is_antisymmetric(
        a in (0u64..20, 0u64..20, 0u64..20),
        b in (0u64..20, 0u64..20, 0u64..20),
    ) {
        let cmp = VersionComparator::default();
        let left = format!("{}.{}.{}", a.0, a.1, a.2);
        let right = format!("{}.{}.{}", b.0, b.1, b.2);
        let forward = cmp.compare(&left, &right).ordering().unwrap();
        let backward = cmp.compare(&right, &left).ordering().unwrap();
        prop_assert_eq!(forward, backward.reverse());
    }

    #[test]
    fn timestamp_compares_equal_to_itself(
        year in 2000u32..2100, month in 1u32..=12, day in 1u32..=28,
        hour in 0u32..24, minute in 0u32..60, second in 0u32..60,
    ) {
        let cmp = VersionComparator::default();
        let v = format!("{year:04}{month:02}{day:02}{hour:02}{minute:02}{second:02}");
        prop_assert_eq!(cmp.compare(&v, &v), Comparison::Equal);
        prop_assert_eq!(cmp.compare(&v, "1.0.0"), Comparison::Incomparable);
    }
}
