//! Orphan Cleaner
//!
//! Removes stubs whose binary is gone, then prunes directories left empty
//! or holding nothing but an empty package init file.

use crate::blacklist::BLACKLIST_FILE_NAME;
use crate::collaborators::Generator;
use crate::error::RefreshError;
use crate::progress::ProgressSink;
use crate::stub::{read_header, INIT_FILE_NAME};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub removed_files: usize,
    pub removed_dirs: usize,
}

/// Sweep `root` bottom-up. The root directory itself is never removed.
pub fn clean_orphans(
    root: &Path,
    generator: &dyn Generator,
    progress: &dyn ProgressSink,
) -> Result<CleanupReport, RefreshError> {
    let mut report = CleanupReport::default();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .contents_first(true)
        .sort_by_file_name();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Failed to walk stub cache");
                continue;
            }
        };
        let path = entry.path();
        let file_type = entry.file_type();

        if file_type.is_dir() {
            progress.check_cancelled()?;
            progress.set_detail(&path.to_string_lossy());
            prune_directory(path, generator, &mut report);
        } else if file_type.is_file() {
            if is_kept_without_header(path) {
                continue;
            }
            if !may_live(path, generator) {
                debug!(path = %path.display(), "Removing orphaned stub");
                if generator.delete_or_log(path) {
                    report.removed_files += 1;
                }
            }
        }
    }
    Ok(report)
}

/// Empty package init files are versionless; the blacklist is not a stub.
fn is_kept_without_header(path: &Path) -> bool {
    match path.file_name().and_then(|n| n.to_str()) {
        Some(BLACKLIST_FILE_NAME) => true,
        Some(INIT_FILE_NAME) => is_empty_file(path),
        _ => false,
    }
}

fn may_live(path: &Path, generator: &dyn Generator) -> bool {
    match read_header(path) {
        Some(header) => header.is_builtin() || generator.exists(&header.origin),
        None => false,
    }
}

/// Remove `dir` if it is empty, or if all it holds is an empty init file.
fn prune_directory(dir: &Path, generator: &dyn Generator, report: &mut CleanupReport) {
    let remaining: Vec<_> = match fs::read_dir(dir) {
        Ok(entries) => entries.filter_map(Result::ok).map(|e| e.path()).collect(),
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "Failed to list directory");
            return;
        }
    };
    match remaining.as_slice() {
        [] => {
            if generator.delete_or_log(dir) {
                report.removed_dirs += 1;
            }
        }
        [only]
            if only.file_name().and_then(|n| n.to_str()) == Some(INIT_FILE_NAME)
                && is_empty_file(only) =>
        {
            if generator.delete_or_log(only) {
                report.removed_files += 1;
                if generator.delete_or_log(dir) {
                    report.removed_dirs += 1;
                }
            }
        }
        _ => {}
    }
}

fn is_empty_file(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file() && m.len() == 0).unwrap_or(false)
}
