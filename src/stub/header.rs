//! Provenance header codec.
//!
//! The first two lines of a stub are an encoding declaration and a module
//! declaration; neither matters here. Provenance starts on line three in one
//! of two layouts:
//!
//! ```text
//! # from /usr/lib/foo.so by generator 1.4          (V1, one line)
//!
//! # from /path with spaces/foo.so                  (V2, two lines)
//! # by generator 1.4
//! ```

use crate::types::FormatVersion;
use crate::version::{from_version_string, to_version_string, BUILTIN_NAME};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

/// Lines skipped before the provenance line.
const PREAMBLE_LINES: usize = 2;

static V1_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^# from (\S+) by generator (\S+)\s*$").expect("V1 header pattern is valid")
});
static V2_FROM_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^# from (.*)$").expect("V2 from pattern is valid"));
static V2_BY_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^# by generator (.*)$").expect("V2 by pattern is valid"));

/// Which header layout a stub was written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderFormat {
    /// Single line; the origin path cannot contain whitespace.
    V1,
    /// Origin and generator on separate lines; the origin is taken verbatim.
    V2,
}

impl HeaderFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            HeaderFormat::V1 => "v1",
            HeaderFormat::V2 => "v2",
        }
    }
}

/// Decoded provenance of a stub file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Binary the stub was generated from, or [`BUILTIN_NAME`].
    pub origin: String,
    pub generator_version: FormatVersion,
    pub format: HeaderFormat,
}

impl Header {
    pub fn new(origin: impl Into<String>, generator_version: FormatVersion) -> Self {
        Self {
            origin: origin.into(),
            generator_version,
            format: HeaderFormat::V2,
        }
    }

    pub fn builtin(generator_version: FormatVersion) -> Self {
        Self::new(BUILTIN_NAME, generator_version)
    }

    pub fn is_builtin(&self) -> bool {
        self.origin == BUILTIN_NAME
    }

    /// Render the provenance lines in this header's format.
    pub fn render(&self) -> String {
        let version = to_version_string(self.generator_version);
        match self.format {
            HeaderFormat::V1 => format!("# from {} by generator {}\n", self.origin, version),
            HeaderFormat::V2 => format!("# from {}\n# by generator {}\n", self.origin, version),
        }
    }
}

/// Decode a header from the leading lines of a stub.
///
/// V1 is tried first; V2 only when the third line is not a V1 line.
pub fn parse_header<I, S>(lines: I) -> Option<Header>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut lines = lines.into_iter().skip(PREAMBLE_LINES);
    let line = lines.next()?;
    let line = line.as_ref();

    if let Some(caps) = V1_LINE.captures(line) {
        return Some(Header {
            origin: caps[1].to_string(),
            generator_version: from_version_string(&caps[2]),
            format: HeaderFormat::V1,
        });
    }

    let origin = V2_FROM_LINE.captures(line)?[1].to_string();
    let next = lines.next()?;
    let caps = V2_BY_LINE.captures(next.as_ref())?;
    Some(Header {
        origin,
        generator_version: from_version_string(&caps[1]),
        format: HeaderFormat::V2,
    })
}

/// Read the header of the stub at `path`.
///
/// `None` covers a missing or unreadable file as well as an unrecognized
/// header; all of them mean the stub must be regenerated.
pub fn read_header(path: &Path) -> Option<Header> {
    let file = File::open(path).ok()?;
    let mut lines = Vec::with_capacity(PREAMBLE_LINES + 2);
    for line in BufReader::new(file).lines().take(PREAMBLE_LINES + 2) {
        lines.push(line.ok()?);
    }
    parse_header(lines)
}

/// Write a complete stub: preamble, provenance header, then `body`.
///
/// Parent directories are created as needed. The file is written to a
/// sibling temporary and renamed into place.
pub fn write_stub(
    path: &Path,
    module_name: &str,
    header: &Header,
    body: &str,
) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let temp_path = path.with_extension("py.tmp");
    {
        let mut out = File::create(&temp_path)?;
        write!(out, "# encoding: utf-8\n# module {}\n", module_name)?;
        out.write_all(header.render().as_bytes())?;
        out.write_all(body.as_bytes())?;
        out.sync_all()?;
    }
    std::fs::rename(&temp_path, path).inspect_err(|_| {
        let _ = std::fs::remove_file(&temp_path);
    })
}
