//! Listing of the stubs present in a cache directory.

use crate::blacklist::BLACKLIST_FILE_NAME;
use crate::stub::header::read_header;
use crate::stub::layout::STUB_EXTENSION;
use crate::version::to_version_string;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// One stub file and what its header says about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StubEntry {
    /// Path relative to the cache directory.
    pub path: PathBuf,
    /// `None` for files without a readable header.
    pub format: Option<&'static str>,
    pub origin: Option<String>,
    pub generator_version: Option<String>,
}

/// Every stub file under `root`, sorted by path. The blacklist is skipped.
pub fn inventory(root: &Path) -> Vec<StubEntry> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Failed to walk stub cache");
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_file()
            || entry.file_name() == BLACKLIST_FILE_NAME
            || path.extension().and_then(|e| e.to_str()) != Some(STUB_EXTENSION)
        {
            continue;
        }
        let header = read_header(path);
        entries.push(StubEntry {
            path: path.strip_prefix(root).unwrap_or(path).to_path_buf(),
            format: header.as_ref().map(|h| h.format.as_str()),
            origin: header.as_ref().map(|h| h.origin.clone()),
            generator_version: header.map(|h| to_version_string(h.generator_version)),
        });
    }
    entries
}
