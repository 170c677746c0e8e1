//! Blacklist Store
//!
//! Negative cache of binaries whose stub generation failed. One flat text
//! file per cache directory:
//!
//! ```text
//! # comment lines
//! <origin path> = <major.minor> <timestamp millis>
//! ```
//!
//! The equals sign separates the path so that paths may contain spaces.
//! The file is read once at the start of a run and rewritten wholesale at
//! the end; nothing is appended in between.

use crate::error::StoreError;
use crate::types::{FormatVersion, Millis, UpdateResult};
use crate::version::{from_version_string, to_version_string};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const BLACKLIST_FILE_NAME: &str = ".blacklist";

const FILE_COMMENT: &str = "\
# Stub generation failed for the binaries listed below.
# They are retried automatically once the binary changes
# or a newer generator becomes available.
";

static BLACKLIST_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([^=]+) = (\d+\.\d+) (\d+)\s*$").expect("blacklist line pattern is valid")
});

/// Generator version and binary timestamp recorded at the time of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlacklistEntry {
    pub failed_generator_version: FormatVersion,
    pub binary_modified_at_millis: Millis,
}

impl BlacklistEntry {
    pub fn new(failed_generator_version: FormatVersion, binary_modified_at_millis: Millis) -> Self {
        Self {
            failed_generator_version,
            binary_modified_at_millis,
        }
    }

    /// Whether a retry is warranted: the generator moved on or the binary
    /// was modified after the recorded failure.
    pub fn is_stale(&self, generator_version: FormatVersion, binary_modified_at: Millis) -> bool {
        self.failed_generator_version < generator_version
            || self.binary_modified_at_millis < binary_modified_at
    }
}

/// In-memory snapshot of the blacklist, keyed by origin path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blacklist {
    entries: BTreeMap<String, BlacklistEntry>,
}

impl Blacklist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Location of the blacklist file in a cache directory.
    pub fn path(cache_dir: &Path) -> PathBuf {
        cache_dir.join(BLACKLIST_FILE_NAME)
    }

    /// Snapshot of a run's failures, all recorded against `generator_version`.
    pub fn from_failures<'a, I>(failures: I, generator_version: FormatVersion) -> Self
    where
        I: IntoIterator<Item = &'a UpdateResult>,
    {
        let entries = failures
            .into_iter()
            .map(|failure| {
                (
                    failure.origin_path.clone(),
                    BlacklistEntry::new(generator_version, failure.modified_at_millis),
                )
            })
            .collect();
        Self { entries }
    }

    pub fn get(&self, origin_path: &str) -> Option<&BlacklistEntry> {
        self.entries.get(origin_path)
    }

    pub fn insert(&mut self, origin_path: impl Into<String>, entry: BlacklistEntry) {
        self.entries.insert(origin_path.into(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BlacklistEntry)> {
        self.entries.iter()
    }

    /// Load the blacklist of `cache_dir`. A missing or unreadable file
    /// yields an empty blacklist.
    pub fn load(cache_dir: &Path) -> Self {
        let path = Self::path(cache_dir);
        if !path.exists() {
            return Self::new();
        }
        match fs::read_to_string(&path) {
            Ok(text) => Self::parse(&text, &path),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read blacklist");
                Self::new()
            }
        }
    }

    /// Parse blacklist text. `source` is only used in log messages.
    pub fn parse(text: &str, source: &Path) -> Self {
        let mut blacklist = Self::new();
        for line in text.lines() {
            if is_comment_or_blank(line) {
                continue;
            }
            match parse_line(line) {
                Some((origin, entry)) => blacklist.insert(origin, entry),
                None => warn!(path = %source.display(), line, "Strange line in blacklist"),
            }
        }
        blacklist
    }

    /// Render the full file contents.
    pub fn render(&self) -> String {
        let mut out = String::from(FILE_COMMENT);
        for (origin, entry) in &self.entries {
            out.push_str(&format!(
                "{} = {} {}\n",
                origin,
                to_version_string(entry.failed_generator_version),
                entry.binary_modified_at_millis
            ));
        }
        out
    }

    /// Overwrite the blacklist file of `cache_dir`. Failures are logged.
    pub fn store(&self, cache_dir: &Path) {
        if let Err(e) = self.write(cache_dir) {
            warn!(error = %e, "Failed to store blacklist");
        }
    }

    /// Delete the blacklist file of `cache_dir` if present. Failures are logged.
    pub fn remove(cache_dir: &Path) {
        let path = Self::path(cache_dir);
        if !path.exists() {
            return;
        }
        if let Err(e) = fs::remove_file(&path) {
            warn!(path = %path.display(), error = %e, "Could not delete blacklist file");
        }
    }

    /// Store the snapshot, or remove the file when the snapshot is empty.
    pub fn persist(&self, cache_dir: &Path) {
        if self.is_empty() {
            debug!(cache_dir = %cache_dir.display(), "No failures, removing blacklist");
            Self::remove(cache_dir);
        } else {
            self.store(cache_dir);
        }
    }

    fn write(&self, cache_dir: &Path) -> Result<(), StoreError> {
        let path = Self::path(cache_dir);
        let temp_path = cache_dir.join(format!("{}.tmp", BLACKLIST_FILE_NAME));
        fs::write(&temp_path, self.render()).map_err(|source| StoreError::Write {
            path: temp_path.clone(),
            source,
        })?;
        fs::rename(&temp_path, &path).map_err(|source| {
            let _ = fs::remove_file(&temp_path);
            StoreError::Write { path, source }
        })
    }
}

fn is_comment_or_blank(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with('#')
}

fn parse_line(line: &str) -> Option<(String, BlacklistEntry)> {
    let caps = BLACKLIST_LINE.captures(line)?;
    let version = from_version_string(&caps[2]);
    if version == 0 {
        return None;
    }
    let timestamp = caps[3].parse::<Millis>().ok()?;
    Some((caps[1].to_string(), BlacklistEntry::new(version, timestamp)))
}
