//! Property-based tests for the version codec and version policy

use proptest::prelude::*;
use stubcache::version::{from_version_string, to_version_string, VersionChecker, VersionRules};

proptest! {
    /// Encoded versions order exactly like (major, minor) pairs.
    #[test]
    fn prop_version_codec_is_monotonic(
        a in (0u32..1000, 0u32..256),
        b in (0u32..1000, 0u32..256),
    ) {
        let va = from_version_string(&format!("{}.{}", a.0, a.1));
        let vb = from_version_string(&format!("{}.{}", b.0, b.1));
        prop_assert_eq!(va.cmp(&vb), a.cmp(&b));
        prop_assert_eq!(to_version_string(va), format!("{}.{}", a.0, a.1));
    }

    /// Minor components past 255 do not fit and decode as unknown.
    #[test]
    fn prop_oversized_minor_is_unknown(major in 0u32..1000, minor in 256u32..100_000) {
        prop_assert_eq!(from_version_string(&format!("{}.{}", major, minor)), 0);
    }

    /// A rule for a dotted prefix governs every module beneath it unless a
    /// longer prefix has its own rule.
    #[test]
    fn prop_longest_prefix_rule_wins(
        segments in prop::collection::vec("[a-z]{1,6}", 1..5),
        prefix_len in 1usize..5,
        rule_minor in 0u32..256,
        default_minor in 0u32..256,
    ) {
        let prefix_len = prefix_len.min(segments.len());
        let prefix = segments[..prefix_len].join(".");
        let module = segments.join(".");
        let rules = VersionRules::parse(&format!("(default) 1.{}\n{} 2.{}\n", default_minor, prefix, rule_minor));
        let checker = VersionChecker::new(from_version_string("3.0"), &rules);

        prop_assert_eq!(checker.required_version(&module), from_version_string(&format!("2.{}", rule_minor)));
        prop_assert_eq!(checker.required_version(&format!("{}x", segments[0])), from_version_string(&format!("1.{}", default_minor)));
    }

    /// Reusing a cached policy never lowers an unpinned default below the
    /// newly observed generator.
    #[test]
    fn prop_cached_default_follows_generator(first in 1u32..0xffff, next in 1u32..0xffff) {
        let cached = VersionChecker::new(first, &VersionRules::default());
        prop_assert_eq!(cached.with_default_version_if_unknown(next).default_version(), next);
        prop_assert_eq!(cached.with_default_version_if_unknown(0).default_version(), first);
    }
}
