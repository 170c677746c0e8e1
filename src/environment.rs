//! Description of the runtime environment whose stubs are being refreshed.

use crate::stub::StubLayout;
use blake3::Hasher;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[cfg(windows)]
const SEARCH_PATH_SEPARATOR: char = ';';
#[cfg(not(windows))]
const SEARCH_PATH_SEPARATOR: char = ':';

/// Length of the hex prefix used for per-environment cache directory names.
const CACHE_DIR_NAME_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Mac,
    Windows,
    Unix,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub os: OsFamily,
    /// `major.minor` of the OS release; only bundles for macOS use it.
    #[serde(default)]
    pub os_version: Option<String>,
}

impl Platform {
    pub fn new(os: OsFamily, os_version: Option<String>) -> Self {
        Self { os, os_version }
    }

    /// Platform of the running process. The OS release is not probed.
    pub fn current() -> Self {
        let os = if cfg!(target_os = "macos") {
            OsFamily::Mac
        } else if cfg!(windows) {
            OsFamily::Windows
        } else {
            OsFamily::Unix
        };
        Self { os, os_version: None }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::current()
    }
}

/// A runtime installation plus the cache directory holding its stubs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    /// Interpreter home path.
    pub home: PathBuf,
    /// Version string reported by the runtime, e.g. `Python 3.11.4`.
    pub version_string: Option<String>,
    /// Class/library roots, in search order.
    pub roots: Vec<PathBuf>,
    pub cache_dir: PathBuf,
    /// Base environment this one was derived from, sharing its binaries.
    pub base: Option<Box<Environment>>,
    pub platform: Platform,
    /// Remote environments never use pregenerated bundles.
    pub remote: bool,
}

impl Environment {
    pub fn new(home: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            version_string: None,
            roots: Vec::new(),
            cache_dir: cache_dir.into(),
            base: None,
            platform: Platform::current(),
            remote: false,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version_string = Some(version.into());
        self
    }

    pub fn with_roots<I, P>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.roots = roots.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_base(mut self, base: Environment) -> Self {
        self.base = Some(Box::new(base));
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn layout(&self) -> StubLayout {
        StubLayout::new(&self.cache_dir)
    }

    pub fn builtins_file(&self) -> PathBuf {
        self.layout().builtins_file(self.version_string.as_deref())
    }

    /// Library roots except the cache directory, joined for the generator's
    /// module search path.
    pub fn extra_search_path(&self) -> String {
        let separator = SEARCH_PATH_SEPARATOR.to_string();
        self.roots
            .iter()
            .filter(|root| root.as_path() != self.cache_dir.as_path())
            .map(|root| root.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(&separator)
    }
}

/// Cache directory for an interpreter home under `cache_root`.
///
/// The directory name is a hash prefix of the home path so that every
/// interpreter gets a stable directory of its own.
pub fn cache_dir_for(cache_root: &Path, home: &Path) -> PathBuf {
    let mut hasher = Hasher::new();
    hasher.update(home.to_string_lossy().as_bytes());
    let digest = hex::encode(hasher.finalize().as_bytes());
    cache_root.join(&digest[..CACHE_DIR_NAME_LEN])
}
