//! Seeding a cache from pregenerated bundles and base environments

use super::test_utils::{listing, FakeGenerator, Sandbox};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use stubcache::bootstrap::{bundle_file_name, DirectoryBundleProvider};
use stubcache::environment::{OsFamily, Platform};
use stubcache::stub::{read_header, Header};
use stubcache::version::from_version_string;
use stubcache::{Environment, Refresher};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

fn stub_text(module_name: &str, header: &Header) -> String {
    format!("# encoding: utf-8\n# module {}\n{}", module_name, header.render())
}

/// Write a bundle for `env` at `version` holding `entries` (path, text).
fn write_bundle(dir: &Path, env: &Environment, version: u32, entries: &[(&str, String)]) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    let name = bundle_file_name(&env.platform, version, env.version_string.as_deref().unwrap()).unwrap();
    let path = dir.join(name);
    let mut zip = ZipWriter::new(File::create(&path).unwrap());
    for (entry, text) in entries {
        zip.start_file(*entry, SimpleFileOptions::default()).unwrap();
        zip.write_all(text.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
    path
}

fn unix_env(sandbox: &Sandbox) -> Environment {
    sandbox
        .environment()
        .with_platform(Platform::new(OsFamily::Unix, None))
}

#[test]
fn test_bundle_seeds_a_missing_cache() {
    let sandbox = Sandbox::new();
    let version = from_version_string("1.5");
    let a = sandbox.binary("a", 10);
    let c = sandbox.binary("c", 10);
    let env = unix_env(&sandbox);
    let bundles = sandbox.root.join("bundles");
    write_bundle(
        &bundles,
        &env,
        version,
        &[
            ("builtins.py", stub_text("builtins", &Header::builtin(version))),
            ("a.py", stub_text("a", &Header::new(a.origin_path.clone(), version))),
        ],
    );
    let generator = FakeGenerator::new(&sandbox, listing(version, &[&a, &c]));
    generator.fail("c");
    let provider = DirectoryBundleProvider::new(&bundles);

    let outcome = Refresher::new(&env, &generator, &generator)
        .with_bundles(&provider)
        .refresh()
        .unwrap();

    assert!(outcome.migrated);
    assert!(outcome.bootstrapped);
    assert!(!outcome.builtins_updated);
    assert_eq!(generator.builtin_calls(), 0);
    assert_eq!(generator.take_generated(), vec!["c"]);
    assert_eq!(outcome.failed_modules(), vec!["c"]);
    assert!(outcome.notifiable_failures().is_empty());
    assert!(outcome.cleanup.is_none());
    assert!(sandbox.stub_path("a").exists());
}

#[test]
fn test_bundle_is_not_unpacked_over_a_current_cache() {
    let version = from_version_string("1.5");
    let sandbox = Sandbox::new();
    sandbox.write_builtins(version);
    let a = sandbox.binary("a", 10);
    let d = sandbox.binary("d", 10);
    let env = unix_env(&sandbox);
    let bundles = sandbox.root.join("bundles");
    write_bundle(
        &bundles,
        &env,
        version,
        &[
            ("a.py", stub_text("a", &Header::new(a.origin_path.clone(), version))),
            ("d.py", stub_text("d", &Header::new(d.origin_path.clone(), version))),
        ],
    );
    let generator = FakeGenerator::new(&sandbox, listing(version, &[&a, &d]));
    let provider = DirectoryBundleProvider::new(&bundles);

    let outcome = Refresher::new(&env, &generator, &generator)
        .with_bundles(&provider)
        .refresh()
        .unwrap();

    assert!(!outcome.migrated);
    assert!(!outcome.bootstrapped);
    assert_eq!(outcome.copied_from_bundle, 2);
    assert!(generator.take_generated().is_empty());
    assert!(read_header(&sandbox.stub_path("d")).is_some());
}

#[test]
fn test_legacy_builtins_header_counts_as_migration() {
    let sandbox = Sandbox::new();
    sandbox.write_builtins(0);
    let version = from_version_string("1.5");
    let a = sandbox.binary("a", 10);
    let generator = FakeGenerator::new(&sandbox, listing(version, &[&a]));

    let env = sandbox.environment();
    let outcome = Refresher::new(&env, &generator, &generator).refresh().unwrap();

    assert!(outcome.migrated);
    assert!(outcome.builtins_updated);
    assert_eq!(read_header(&env.builtins_file()).unwrap().generator_version, version);
}

#[test]
fn test_base_environment_stubs_are_reused_for_same_sized_binaries() {
    let sandbox = Sandbox::new();
    let version = from_version_string("1.5");

    let base_home = sandbox.root.join("base-home");
    let base_cache = sandbox.root.join("base-cache");
    let base_lib = sandbox.root.join("base-lib");
    fs::create_dir_all(&base_lib).unwrap();
    fs::write(base_lib.join("m.so"), vec![1u8; 10]).unwrap();
    fs::write(base_lib.join("n.so"), vec![1u8; 20]).unwrap();
    let base_m = stubcache::types::BinaryModule::new("m", base_lib.join("m.so").to_string_lossy(), 10, 0);
    let base_n = stubcache::types::BinaryModule::new("n", base_lib.join("n.so").to_string_lossy(), 20, 0);
    let base = Environment::new(&base_home, &base_cache);
    for module in [&base_m, &base_n] {
        stubcache::stub::write_stub(
            &base.layout().module_file(&module.name),
            &module.name,
            &Header::new(module.origin_path.clone(), version),
            "",
        )
        .unwrap();
    }

    // m differs in content but not in size, n differs in size.
    let m = sandbox.binary("m", 10);
    let n = sandbox.binary("n", 30);
    let generator = FakeGenerator::new(&sandbox, listing(version, &[&m, &n]));
    generator.add_listing_for(&base_home, listing(version, &[&base_m, &base_n]));

    let env = sandbox.environment().with_base(base);
    let outcome = Refresher::new(&env, &generator, &generator).refresh().unwrap();

    assert_eq!(outcome.copied_from_base, 1);
    assert_eq!(generator.take_generated(), vec!["n"]);
    // Size is the only identity check: m keeps the base's provenance.
    let header = read_header(&sandbox.stub_path("m")).unwrap();
    assert_eq!(header.origin, base_m.origin_path);
}
