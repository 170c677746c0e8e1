//! Staleness Engine
//!
//! Decides per binary module whether its stub must be rebuilt. Three
//! signals feed the decision: the stub's header version against the policy,
//! the stub's modification time against the binary's, and the blacklist.

use crate::blacklist::Blacklist;
use crate::progress::system_time_millis;
use crate::stub::{read_header, StubLayout};
use crate::types::{BinaryModule, FormatVersion, Millis};
use crate::version::VersionChecker;
use std::path::Path;

/// Why a stub is scheduled for regeneration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildReason {
    /// No stub, or no recognizable header.
    Missing,
    /// Header version below the required version.
    Outdated {
        found: FormatVersion,
        required: FormatVersion,
    },
    /// The binary was modified after the stub was written.
    BinaryChanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    UpToDate,
    Rebuild(RebuildReason),
    /// The blacklist says generation would fail again.
    Suppressed,
}

impl Verdict {
    pub fn needs_rebuild(&self) -> bool {
        matches!(self, Verdict::Rebuild(_))
    }
}

/// Per-run staleness decisions over one cache directory.
pub struct StalenessEngine<'a> {
    layout: &'a StubLayout,
    checker: &'a VersionChecker,
    blacklist: &'a Blacklist,
    generator_version: FormatVersion,
}

impl<'a> StalenessEngine<'a> {
    pub fn new(
        layout: &'a StubLayout,
        checker: &'a VersionChecker,
        blacklist: &'a Blacklist,
        generator_version: FormatVersion,
    ) -> Self {
        Self {
            layout,
            checker,
            blacklist,
            generator_version,
        }
    }

    /// A live blacklist entry wins over every other signal: the module is
    /// reported as still failing and never handed to the generator.
    pub fn assess(&self, module: &BinaryModule) -> Verdict {
        if let Some(entry) = self.blacklist.get(&module.origin_path) {
            if !entry.is_stale(self.generator_version, module.modified_at_millis) {
                return Verdict::Suppressed;
            }
        }

        let stub = self.layout.locate(&module.name);
        match self.rebuild_reason(module, &stub) {
            Some(reason) => Verdict::Rebuild(reason),
            None => Verdict::UpToDate,
        }
    }

    fn rebuild_reason(&self, module: &BinaryModule, stub: &Path) -> Option<RebuildReason> {
        let Some(header) = read_header(stub) else {
            return Some(RebuildReason::Missing);
        };
        let required = self.checker.required_version(&module.name);
        if header.generator_version < required {
            return Some(RebuildReason::Outdated {
                found: header.generator_version,
                required,
            });
        }
        match modified_millis(stub) {
            Some(stub_modified) if module.modified_at_millis > stub_modified => {
                Some(RebuildReason::BinaryChanged)
            }
            _ => None,
        }
    }
}

/// Whether the built-in namespace stub at `path` is missing or below the
/// policy's built-in version. The blacklist never applies here.
pub fn builtins_outdated(path: &Path, checker: &VersionChecker) -> bool {
    read_header(path).map_or(true, |header| {
        header.generator_version < checker.builtin_version()
    })
}

/// Modification time of `path` in milliseconds.
pub fn modified_millis(path: &Path) -> Option<Millis> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    Some(system_time_millis(modified))
}
