//! End-to-end refresh runs against a scripted generator

use super::test_utils::{listing, set_mtime, FakeGenerator, Sandbox, BINARY_MTIME_MILLIS};
use std::fs;
use stubcache::progress::CancellationFlag;
use stubcache::refresh::RefreshState;
use stubcache::stub::read_header;
use stubcache::version::{from_version_string, VersionRules};
use stubcache::{RefreshError, RefreshOutcome, Refresher};

fn refresh(sandbox: &Sandbox, generator: &FakeGenerator) -> RefreshOutcome {
    let env = sandbox.environment();
    Refresher::new(&env, generator, generator).refresh().unwrap()
}

/// A cache whose built-in stub is current, so runs are not migrations.
fn settled_sandbox(version: u32) -> Sandbox {
    let sandbox = Sandbox::new();
    sandbox.write_builtins(version);
    sandbox
}

#[test]
fn test_fresh_cache_regenerates_only_missing_stubs() {
    let sandbox = Sandbox::new();
    let version = from_version_string("1.5");
    let a = sandbox.binary("a", 10);
    let b = sandbox.binary("b", 20);
    sandbox.write_stub(&b, version);
    let generator = FakeGenerator::new(&sandbox, listing(version, &[&a, &b]));

    let outcome = refresh(&sandbox, &generator);

    assert_eq!(generator.take_generated(), vec!["a"]);
    assert_eq!(generator.builtin_calls(), 1);
    assert!(outcome.migrated);
    assert!(outcome.builtins_updated);
    assert_eq!(outcome.generated, 1);
    assert!(outcome.failed_modules().is_empty());
    assert!(sandbox.blacklist_text().is_none());
    assert_eq!(read_header(&sandbox.stub_path("a")).unwrap().generator_version, version);
}

#[test]
fn test_second_run_is_idempotent() {
    let sandbox = Sandbox::new();
    let version = from_version_string("1.5");
    let a = sandbox.binary("a", 10);
    let b = sandbox.binary("pkg.b", 20);
    let generator = FakeGenerator::new(&sandbox, listing(version, &[&a, &b]));

    refresh(&sandbox, &generator);
    assert_eq!(generator.take_generated(), vec!["a", "pkg.b"]);

    let outcome = refresh(&sandbox, &generator);
    assert!(generator.take_generated().is_empty());
    assert_eq!(generator.builtin_calls(), 1);
    assert!(!outcome.migrated);
    assert!(!outcome.builtins_updated);
    let cleanup = outcome.cleanup.unwrap();
    assert_eq!(cleanup.removed_files, 0);
    assert_eq!(cleanup.removed_dirs, 0);
}

#[test]
fn test_failing_module_is_blacklisted_then_suppressed() {
    let version = from_version_string("1.5");
    let sandbox = settled_sandbox(version);
    let c = sandbox.binary("c", 30);
    let generator = FakeGenerator::new(&sandbox, listing(version, &[&c]));
    generator.fail("c");

    let first = refresh(&sandbox, &generator);
    assert_eq!(generator.take_generated(), vec!["c"]);
    assert_eq!(first.notifiable_failures(), vec!["c"]);
    assert!(first.failures[0].fresh);
    let text = sandbox.blacklist_text().unwrap();
    assert!(text.contains(&format!("{} = 1.5 {}", c.origin_path, BINARY_MTIME_MILLIS)));

    let second = refresh(&sandbox, &generator);
    assert!(generator.take_generated().is_empty());
    assert_eq!(second.failed_modules(), vec!["c"]);
    assert!(!second.failures[0].fresh);
    assert!(second.notifiable_failures().is_empty());
    assert!(sandbox.blacklist_text().is_some());
}

#[test]
fn test_blacklisted_module_with_current_stub_stays_reported() {
    let version = from_version_string("1.5");
    let sandbox = settled_sandbox(version);
    let m = sandbox.binary("m", 10);
    sandbox.write_stub(&m, version);
    fs::write(
        sandbox.cache_dir().join(".blacklist"),
        format!("{} = 1.5 {}\n", m.origin_path, BINARY_MTIME_MILLIS),
    )
    .unwrap();
    let generator = FakeGenerator::new(&sandbox, listing(version, &[&m]));

    let outcome = refresh(&sandbox, &generator);

    assert!(generator.take_generated().is_empty());
    assert_eq!(outcome.failed_modules(), vec!["m"]);
    assert!(!outcome.failures[0].fresh);
    assert!(outcome.notifiable_failures().is_empty());
    let text = sandbox.blacklist_text().unwrap();
    assert!(text.contains(&format!("{} = 1.5 {}", m.origin_path, BINARY_MTIME_MILLIS)));
}

#[test]
fn test_blacklist_expires_on_generator_upgrade() {
    let version = from_version_string("1.5");
    let sandbox = settled_sandbox(version);
    let a = sandbox.binary("a", 10);
    let c = sandbox.binary("c", 30);
    let generator = FakeGenerator::new(&sandbox, listing(version, &[&a, &c]));
    generator.fail("c");
    refresh(&sandbox, &generator);
    generator.take_generated();

    generator.heal("c");
    generator.set_listing(listing(from_version_string("1.6"), &[&a, &c]));
    let outcome = refresh(&sandbox, &generator);

    assert_eq!(generator.take_generated(), vec!["a", "c"]);
    assert!(outcome.builtins_updated);
    assert!(outcome.failed_modules().is_empty());
    assert!(sandbox.blacklist_text().is_none());
}

#[test]
fn test_blacklist_expires_when_binary_changes() {
    let version = from_version_string("1.5");
    let sandbox = settled_sandbox(version);
    let c = sandbox.binary("c", 30);
    let generator = FakeGenerator::new(&sandbox, listing(version, &[&c]));
    generator.fail("c");
    refresh(&sandbox, &generator);
    generator.take_generated();

    let later = BINARY_MTIME_MILLIS + 60_000;
    let rebuilt = sandbox.binary_at("c", 31, later);
    generator.set_listing(listing(version, &[&rebuilt]));
    let outcome = refresh(&sandbox, &generator);

    assert_eq!(generator.take_generated(), vec!["c"]);
    assert_eq!(outcome.notifiable_failures(), vec!["c"]);
    let text = sandbox.blacklist_text().unwrap();
    assert!(text.contains(&format!("= 1.5 {}", later)));
}

#[test]
fn test_binary_newer_than_stub_is_regenerated() {
    let version = from_version_string("1.5");
    let sandbox = settled_sandbox(version);
    let a = sandbox.binary("a", 10);
    sandbox.write_stub(&a, version);
    set_mtime(&sandbox.stub_path("a"), BINARY_MTIME_MILLIS - 1_000);
    let generator = FakeGenerator::new(&sandbox, listing(version, &[&a]));

    refresh(&sandbox, &generator);

    assert_eq!(generator.take_generated(), vec!["a"]);
}

#[test]
fn test_required_version_rules_force_regeneration() {
    let version = from_version_string("1.5");
    let sandbox = settled_sandbox(version);
    let core = sandbox.binary("numpy.core", 10);
    let other = sandbox.binary("other", 10);
    sandbox.write_stub(&core, from_version_string("1.4"));
    sandbox.write_stub(&other, from_version_string("1.4"));
    let generator = FakeGenerator::new(&sandbox, listing(version, &[&core, &other]));
    let rules = VersionRules::parse("(default) 1.2\nnumpy 1.5\n");

    let env = sandbox.environment();
    Refresher::new(&env, &generator, &generator)
        .with_rules(rules)
        .refresh()
        .unwrap();

    assert_eq!(generator.take_generated(), vec!["numpy.core"]);
}

#[test]
fn test_cached_policy_is_handed_to_the_next_run() {
    let version = from_version_string("1.5");
    let sandbox = settled_sandbox(version);
    let a = sandbox.binary("a", 10);
    let generator = FakeGenerator::new(&sandbox, listing(version, &[&a]));
    let first = refresh(&sandbox, &generator);
    generator.take_generated();

    let env = sandbox.environment();
    let second = Refresher::new(&env, &generator, &generator)
        .with_cached_checker(Some(first.version_checker.clone()))
        .refresh()
        .unwrap();

    assert!(generator.take_generated().is_empty());
    assert_eq!(second.version_checker, first.version_checker);
}

#[test]
fn test_orphaned_stubs_are_removed() {
    let version = from_version_string("1.5");
    let sandbox = settled_sandbox(version);
    let a = sandbox.binary("a", 10);
    let gone = sandbox.binary("pkg.gone", 10);
    sandbox.write_stub(&a, version);
    sandbox.write_stub(&gone, version);
    fs::remove_file(&gone.origin_path).unwrap();
    let generator = FakeGenerator::new(&sandbox, listing(version, &[&a]));

    let outcome = refresh(&sandbox, &generator);

    let cleanup = outcome.cleanup.unwrap();
    assert_eq!(cleanup.removed_files, 1);
    assert_eq!(cleanup.removed_dirs, 1);
    assert!(!sandbox.cache_dir().join("pkg").exists());
    assert!(sandbox.stub_path("a").exists());
    assert!(sandbox.environment().builtins_file().exists());
}

#[test]
fn test_cancellation_stops_before_next_module() {
    let sandbox = Sandbox::new();
    let version = from_version_string("1.5");
    let a = sandbox.binary("a", 10);
    let b = sandbox.binary("b", 10);
    let c = sandbox.binary("c", 10);
    let generator = FakeGenerator::new(&sandbox, listing(version, &[&a, &b, &c]));
    generator.fail("a");
    let flag = CancellationFlag::new();
    generator.cancel_after("a", flag.clone());

    let env = sandbox.environment();
    let mut refresher = Refresher::new(&env, &generator, &generator).with_progress(&flag);
    let err = refresher.refresh().unwrap_err();

    assert!(matches!(err, RefreshError::Cancelled));
    assert_eq!(refresher.state(), RefreshState::Error);
    assert_eq!(generator.take_generated(), vec!["a"]);
    assert!(sandbox.blacklist_text().is_none());
}
