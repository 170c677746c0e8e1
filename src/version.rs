//! Stub format versions and the version policy.
//!
//! Format versions travel as `major.minor` strings in stub headers, the
//! blacklist and the rule table. Internally they are integers
//! (`major << 8 | minor`) so they compare monotonically.

use crate::types::FormatVersion;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

/// Header origin and rule-table key of the interpreter's built-in namespace.
pub const BUILTIN_NAME: &str = "(built-in)";

/// Rule-table key of the default requirement.
pub const DEFAULT_NAME: &str = "(default)";

/// Conventional file name of the rule table shipped next to the generator.
pub const REQUIRED_VERSION_FILE_NAME: &str = "required_gen_version";

static RULE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(\w+(?:\.\w+)*|\(built-in\)|\(default\))\s+(\d+\.\d+))?\s*(?:#.*)?$")
        .expect("rule line pattern is valid")
});

/// Decode a `major.minor` string. Anything unparseable decodes to `0`,
/// which every requirement treats as "too old".
pub fn from_version_string(input: &str) -> FormatVersion {
    let Some((major, minor)) = input.trim().split_once('.') else {
        return 0;
    };
    let (Ok(major), Ok(minor)) = (major.parse::<u32>(), minor.parse::<u32>()) else {
        return 0;
    };
    // A minor past 255 would overlap the next major.
    if minor > 0xff {
        return 0;
    }
    major
        .checked_mul(0x100)
        .and_then(|m| m.checked_add(minor))
        .unwrap_or(0)
}

/// Render an integer version back to `major.minor`.
pub fn to_version_string(version: FormatVersion) -> String {
    format!("{}.{}", version >> 8, version & 0xff)
}

/// Parsed `required_gen_version` rule table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRules {
    pub explicit: BTreeMap<String, FormatVersion>,
    pub default: Option<FormatVersion>,
    pub builtin: Option<FormatVersion>,
}

impl VersionRules {
    /// Parse the rule table text. Malformed lines are logged and skipped.
    pub fn parse(text: &str) -> Self {
        let mut rules = VersionRules::default();
        for (index, line) in text.lines().enumerate() {
            let Some(caps) = RULE_LINE.captures(line) else {
                warn!(line = index + 1, content = line, "Malformed version rule, skipping");
                continue;
            };
            let (Some(name), Some(version)) = (caps.get(1), caps.get(2)) else {
                continue; // blank or comment
            };
            let version = from_version_string(version.as_str());
            match name.as_str() {
                DEFAULT_NAME => rules.default = Some(version),
                BUILTIN_NAME => rules.builtin = Some(version),
                module => {
                    rules.explicit.insert(module.to_string(), version);
                }
            }
        }
        rules
    }

    /// Load the rule table from disk. A missing or unreadable file yields
    /// an empty table.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::parse(&text),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "No version rule table, using defaults");
                VersionRules::default()
            }
        }
    }
}

/// Version policy for one refresh run.
///
/// Built once per run from the observed generator version and, optionally,
/// the policy of a previous run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionChecker {
    explicit: BTreeMap<String, FormatVersion>,
    default_version: FormatVersion,
    /// Set when the default came from a `(default)` rule rather than the generator.
    default_pinned: bool,
    builtin_version: Option<FormatVersion>,
}

impl VersionChecker {
    pub fn new(generator_version: FormatVersion, rules: &VersionRules) -> Self {
        Self {
            explicit: rules.explicit.clone(),
            default_version: rules.default.unwrap_or(generator_version),
            default_pinned: rules.default.is_some(),
            builtin_version: rules.builtin,
        }
    }

    /// Derive this run's policy from a cached one.
    ///
    /// The cached rule table is kept. An unknown observed version (`0`)
    /// leaves the cached policy untouched; otherwise an unpinned or unknown
    /// default follows the newly observed generator version.
    pub fn with_default_version_if_unknown(&self, generator_version: FormatVersion) -> Self {
        let mut next = self.clone();
        if generator_version == 0 {
            return next;
        }
        if next.default_version == 0 || !next.default_pinned {
            next.default_version = generator_version;
        }
        next
    }

    /// Minimum header version a stub for `module_name` must carry.
    ///
    /// The rule for the longest dotted prefix of the name wins.
    pub fn required_version(&self, module_name: &str) -> FormatVersion {
        let mut candidate = module_name;
        loop {
            if let Some(version) = self.explicit.get(candidate) {
                return *version;
            }
            match candidate.rfind('.') {
                Some(pos) => candidate = &candidate[..pos],
                None => return self.default_version,
            }
        }
    }

    /// Minimum header version of the built-in namespace stub.
    pub fn builtin_version(&self) -> FormatVersion {
        match self.builtin_version {
            Some(version) if version != 0 => version,
            _ => self.default_version,
        }
    }

    pub fn default_version(&self) -> FormatVersion {
        self.default_version
    }
}
