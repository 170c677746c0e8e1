//! Bootstrap / Migration
//!
//! Seeds a missing or legacy cache without running the generator: from a
//! pregenerated bundle shipped next to the tool, and, for environments
//! derived from a base environment, by copying the base's stubs.

use crate::collaborators::BundleProvider;
use crate::environment::{Environment, OsFamily, Platform};
use crate::error::{RefreshError, StoreError};
use crate::progress::ProgressSink;
use crate::stub::StubLayout;
use crate::types::{FormatVersion, Listing};
use std::cell::RefCell;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zip::result::ZipError;
use zip::ZipArchive;

/// A zip archive of stubs for one platform, runtime and generator version.
pub struct PregeneratedBundle {
    path: PathBuf,
    archive: RefCell<ZipArchive<File>>,
}

impl std::fmt::Debug for PregeneratedBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PregeneratedBundle")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl PregeneratedBundle {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let file = File::open(&path).map_err(|source| StoreError::Read {
            path: path.clone(),
            source,
        })?;
        let archive = ZipArchive::new(file).map_err(|e| bundle_error(&path, e))?;
        Ok(Self {
            path,
            archive: RefCell::new(archive),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Extract every entry into `dest`. Entries whose names would escape
    /// `dest` are skipped. Returns the number of files written.
    pub fn extract_into(&self, dest: &Path) -> Result<usize, StoreError> {
        let mut archive = self.archive.borrow_mut();
        let mut written = 0;
        for index in 0..archive.len() {
            let mut entry = archive.by_index(index).map_err(|e| bundle_error(&self.path, e))?;
            let Some(relative) = entry.enclosed_name() else {
                warn!(bundle = %self.path.display(), entry = entry.name(), "Skipping unsafe bundle entry");
                continue;
            };
            let target = dest.join(relative);
            if entry.is_dir() {
                fs::create_dir_all(&target)?;
                continue;
            }
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&target).map_err(|source| StoreError::Write {
                path: target.clone(),
                source,
            })?;
            io::copy(&mut entry, &mut out)?;
            written += 1;
        }
        Ok(written)
    }

    /// Copy the stub of one module out of the bundle, as a module file or
    /// a package file, whichever the bundle has. Returns `false` when the
    /// bundle has neither.
    pub fn copy_module(&self, module_name: &str, layout: &StubLayout) -> Result<bool, StoreError> {
        let relative = module_name.replace('.', "/");
        let candidates = [
            (format!("{}.py", relative), layout.module_file(module_name)),
            (format!("{}/__init__.py", relative), layout.package_file(module_name)),
        ];
        let mut archive = self.archive.borrow_mut();
        for (entry_name, target) in candidates {
            let mut entry = match archive.by_name(&entry_name) {
                Ok(entry) => entry,
                Err(ZipError::FileNotFound) => continue,
                Err(e) => return Err(bundle_error(&self.path, e)),
            };
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&target).map_err(|source| StoreError::Write {
                path: target.clone(),
                source,
            })?;
            io::copy(&mut entry, &mut out)?;
            info!(module = module_name, "Pregenerated stub copied");
            return Ok(true);
        }
        Ok(false)
    }
}

fn bundle_error(path: &Path, err: ZipError) -> StoreError {
    StoreError::Bundle {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

/// File name of the bundle matching a platform, generator version and
/// runtime version string. `None` when the platform lacks the information
/// needed to pick one.
pub fn bundle_file_name(
    platform: &Platform,
    generator_version: FormatVersion,
    runtime_version: &str,
) -> Option<String> {
    let runtime = runtime_version.to_lowercase().replace(' ', "-");
    match platform.os {
        OsFamily::Mac => {
            let os_version = platform.os_version.as_deref()?;
            // Only major.minor of the OS release takes part in the name.
            let short: Vec<&str> = os_version.splitn(3, '.').take(2).collect();
            Some(format!(
                "skeletons-mac-{}-{}-{}.zip",
                generator_version,
                short.join("."),
                runtime
            ))
        }
        OsFamily::Windows => Some(format!("skeletons-win-{}-{}.zip", generator_version, runtime)),
        OsFamily::Unix => Some(format!("skeletons-nix-{}-{}.zip", generator_version, runtime)),
    }
}

/// Looks bundles up by name in a single directory.
#[derive(Debug, Clone)]
pub struct DirectoryBundleProvider {
    root: PathBuf,
}

impl DirectoryBundleProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl BundleProvider for DirectoryBundleProvider {
    fn resolve(&self, env: &Environment, generator_version: FormatVersion) -> Option<PregeneratedBundle> {
        if env.remote {
            return None;
        }
        let version = env.version_string.as_deref()?;
        let name = bundle_file_name(&env.platform, generator_version, version)?;
        let path = self.root.join(name);
        if !path.exists() {
            info!(path = %path.display(), "No pregenerated stubs");
            return None;
        }
        match PregeneratedBundle::open(&path) {
            Ok(bundle) => {
                info!(path = %path.display(), "Found pregenerated stubs");
                Some(bundle)
            }
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable pregenerated stubs");
                None
            }
        }
    }
}

/// Copy stubs from a base environment's cache for every module whose binary
/// has the same byte size in both environments.
///
/// Size equality is a deliberately weak identity check: two different
/// binaries of the same length are treated as identical.
/// Returns the number of stubs copied; individual copy failures are logged.
/// Cancellation is polled before each module.
pub fn copy_from_base(
    layout: &StubLayout,
    listing: &Listing,
    base_layout: &StubLayout,
    base_listing: &Listing,
    progress: &dyn ProgressSink,
) -> Result<usize, RefreshError> {
    let mut copied = 0;
    for (name, binary) in &listing.modules {
        progress.check_cancelled()?;
        let Some(base_binary) = base_listing.modules.get(name) else {
            continue;
        };
        if binary.byte_size != base_binary.byte_size {
            continue;
        }
        let from = base_layout.locate(name);
        if !from.is_file() {
            continue;
        }
        let to = if from == base_layout.package_file(name) {
            layout.package_file(name)
        } else {
            layout.module_file(name)
        };
        match copy_file(&from, &to) {
            Ok(()) => {
                debug!(module = %name, "Copied stub from base environment");
                copied += 1;
            }
            Err(e) => warn!(module = %name, error = %e, "Error copying base environment stub"),
        }
    }
    Ok(copied)
}

fn copy_file(from: &Path, to: &Path) -> Result<(), StoreError> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(from, to).map_err(|source| StoreError::Write {
        path: to.to_path_buf(),
        source,
    })?;
    Ok(())
}
