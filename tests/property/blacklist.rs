//! Property-based tests for blacklist persistence

use proptest::prelude::*;
use stubcache::blacklist::{Blacklist, BlacklistEntry};
use tempfile::TempDir;

fn origin_path() -> impl Strategy<Value = String> {
    // '=' separates the path from the entry; leading and trailing spaces
    // would be ambiguous with the separator.
    "/[a-zA-Z0-9_./ -]{0,40}[a-zA-Z0-9_.]"
}

proptest! {
    #[test]
    fn prop_stored_blacklist_loads_back_identically(
        entries in prop::collection::btree_map(
            origin_path(),
            (1u32..1000, 0u32..256, 0i64..4_000_000_000_000),
            0..12,
        )
    ) {
        let temp = TempDir::new().unwrap();
        let mut blacklist = Blacklist::new();
        for (origin, (major, minor, mtime)) in &entries {
            blacklist.insert(origin.clone(), BlacklistEntry::new((major << 8) + minor, *mtime));
        }

        blacklist.persist(temp.path());
        let loaded = Blacklist::load(temp.path());

        prop_assert_eq!(loaded, blacklist);
        prop_assert_eq!(Blacklist::path(temp.path()).exists(), !entries.is_empty());
    }

    #[test]
    fn prop_entry_is_stale_only_when_something_moved_on(
        failed in 1u32..0xffff,
        recorded in 0i64..1_000_000,
        observed_version in 1u32..0xffff,
        observed_mtime in 0i64..1_000_000,
    ) {
        let entry = BlacklistEntry::new(failed, recorded);
        prop_assert_eq!(
            entry.is_stale(observed_version, observed_mtime),
            observed_version > failed || observed_mtime > recorded
        );
    }
}
