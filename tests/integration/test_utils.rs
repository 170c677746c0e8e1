//! Shared test utilities for integration tests
//!
//! A scripted generator that writes real stub files, plus a sandbox holding
//! an interpreter home, its binaries and its cache directory.

use filetime::{set_file_mtime, FileTime};
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use stubcache::progress::CancellationFlag;
use stubcache::stub::{write_stub, Header};
use stubcache::types::{BinaryModule, FormatVersion, Listing};
use stubcache::{BinaryLister, Environment, Generator, RefreshError};
use tempfile::TempDir;

/// Binary modification time used unless a test bumps it (2020-01-01).
pub const BINARY_MTIME_MILLIS: i64 = 1_577_836_800_000;

/// Temp directory with `home/`, `lib/` (binaries) and `cache/`.
pub struct Sandbox {
    _temp: TempDir,
    pub root: PathBuf,
}

impl Sandbox {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let root = temp.path().to_path_buf();
        fs::create_dir_all(root.join("home")).unwrap();
        fs::create_dir_all(root.join("lib")).unwrap();
        Self { _temp: temp, root }
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    pub fn environment(&self) -> Environment {
        Environment::new(self.root.join("home"), self.cache_dir())
            .with_version("Python 3.11.4")
            .with_roots([self.root.join("lib")])
    }

    /// Create a binary on disk of `size` bytes with a fixed mtime.
    pub fn binary(&self, name: &str, size: usize) -> BinaryModule {
        self.binary_at(name, size, BINARY_MTIME_MILLIS)
    }

    pub fn binary_at(&self, name: &str, size: usize, mtime_millis: i64) -> BinaryModule {
        let path = self.root.join("lib").join(format!("{}.so", name));
        fs::write(&path, vec![0u8; size]).unwrap();
        set_mtime(&path, mtime_millis);
        BinaryModule::new(name, path.to_string_lossy(), size as u64, mtime_millis)
    }

    pub fn stub_path(&self, module_name: &str) -> PathBuf {
        self.environment().layout().module_file(module_name)
    }

    pub fn write_stub(&self, module: &BinaryModule, version: FormatVersion) {
        write_stub(
            &self.stub_path(&module.name),
            &module.name,
            &Header::new(module.origin_path.clone(), version),
            "",
        )
        .unwrap();
    }

    pub fn write_builtins(&self, version: FormatVersion) {
        let env = self.environment();
        write_stub(&env.builtins_file(), "builtins", &Header::builtin(version), "").unwrap();
    }

    pub fn blacklist_text(&self) -> Option<String> {
        fs::read_to_string(self.cache_dir().join(".blacklist")).ok()
    }
}

pub fn set_mtime(path: &Path, millis: i64) {
    let time = FileTime::from_unix_time(millis / 1000, ((millis % 1000) * 1_000_000) as u32);
    set_file_mtime(path, time).unwrap();
}

pub fn listing(version: FormatVersion, modules: &[&BinaryModule]) -> Listing {
    modules
        .iter()
        .fold(Listing::new(version), |listing, module| listing.with_module((*module).clone()))
}

/// Lister and generator in one. Successful generations write a V2 stub
/// stamped with the listing's generator version.
pub struct FakeGenerator {
    listing: RefCell<Listing>,
    listings_by_home: RefCell<Vec<(PathBuf, Listing)>>,
    failing: RefCell<HashSet<String>>,
    generated: RefCell<Vec<String>>,
    builtin_calls: Cell<usize>,
    cache_dir: PathBuf,
    cancel_on: RefCell<Option<(String, CancellationFlag)>>,
}

impl FakeGenerator {
    pub fn new(sandbox: &Sandbox, listing: Listing) -> Self {
        Self {
            listing: RefCell::new(listing),
            listings_by_home: RefCell::new(Vec::new()),
            failing: RefCell::new(HashSet::new()),
            generated: RefCell::new(Vec::new()),
            builtin_calls: Cell::new(0),
            cache_dir: sandbox.cache_dir(),
            cancel_on: RefCell::new(None),
        }
    }

    pub fn set_listing(&self, listing: Listing) {
        *self.listing.borrow_mut() = listing;
    }

    /// Listing returned for an environment other than the main one.
    pub fn add_listing_for(&self, home: &Path, listing: Listing) {
        self.listings_by_home.borrow_mut().push((home.to_path_buf(), listing));
    }

    pub fn fail(&self, module_name: &str) {
        self.failing.borrow_mut().insert(module_name.to_string());
    }

    pub fn heal(&self, module_name: &str) {
        self.failing.borrow_mut().remove(module_name);
    }

    /// Raise `flag` right after generating `module_name`.
    pub fn cancel_after(&self, module_name: &str, flag: CancellationFlag) {
        *self.cancel_on.borrow_mut() = Some((module_name.to_string(), flag));
    }

    /// Module generation requests since the last call, in order.
    pub fn take_generated(&self) -> Vec<String> {
        std::mem::take(&mut *self.generated.borrow_mut())
    }

    pub fn builtin_calls(&self) -> usize {
        self.builtin_calls.get()
    }
}

impl BinaryLister for FakeGenerator {
    fn list(&self, env: &Environment, _extra_search_path: &str) -> Result<Listing, RefreshError> {
        let by_home = self.listings_by_home.borrow();
        if let Some((_, listing)) = by_home.iter().find(|(home, _)| *home == env.home) {
            return Ok(listing.clone());
        }
        Ok(self.listing.borrow().clone())
    }
}

impl Generator for FakeGenerator {
    fn generate(
        &self,
        module_name: &str,
        origin_path: Option<&str>,
        _extra_search_path: &str,
        _environment_root: &Path,
    ) -> Result<bool, RefreshError> {
        self.generated.borrow_mut().push(module_name.to_string());
        if let Some((name, flag)) = &*self.cancel_on.borrow() {
            if name == module_name {
                flag.cancel();
            }
        }
        if self.failing.borrow().contains(module_name) {
            return Ok(false);
        }
        let version = self.listing.borrow().generator_version;
        let path = stubcache::stub::StubLayout::new(&self.cache_dir).module_file(module_name);
        write_stub(&path, module_name, &Header::new(origin_path.unwrap_or_default(), version), "")?;
        Ok(true)
    }

    fn generate_builtins(&self, env: &Environment) -> Result<bool, RefreshError> {
        self.builtin_calls.set(self.builtin_calls.get() + 1);
        let version = self.listing.borrow().generator_version;
        write_stub(&env.builtins_file(), "builtins", &Header::builtin(version), "")?;
        Ok(true)
    }
}
