//! Mapping from dotted module names to stub paths inside a cache directory.

use std::path::{Path, PathBuf};

pub const STUB_EXTENSION: &str = "py";
pub const INIT_FILE_NAME: &str = "__init__.py";

/// Built-in namespace stub for 2.x runtimes.
const LEGACY_BUILTINS_FILE_NAME: &str = "__builtin__.py";
const BUILTINS_FILE_NAME: &str = "builtins.py";

/// Stub paths rooted at one cache directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubLayout {
    root: PathBuf,
}

impl StubLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `a.b.c` → `<root>/a/b/c.py`
    pub fn module_file(&self, module_name: &str) -> PathBuf {
        let mut path = self.module_dir(module_name);
        path.set_extension(STUB_EXTENSION);
        path
    }

    /// `a.b.c` → `<root>/a/b/c/__init__.py`
    pub fn package_file(&self, module_name: &str) -> PathBuf {
        self.module_dir(module_name).join(INIT_FILE_NAME)
    }

    /// The module file if it exists, the package file otherwise.
    pub fn locate(&self, module_name: &str) -> PathBuf {
        let module = self.module_file(module_name);
        if module.exists() {
            module
        } else {
            self.package_file(module_name)
        }
    }

    /// Stub of the built-in namespace for a runtime version string.
    pub fn builtins_file(&self, runtime_version: Option<&str>) -> PathBuf {
        self.root.join(builtins_file_name(runtime_version))
    }

    /// Path of `module_name` relative to any root, without extension.
    pub fn relative_module_path(module_name: &str) -> PathBuf {
        module_name.split('.').collect()
    }

    fn module_dir(&self, module_name: &str) -> PathBuf {
        self.root.join(Self::relative_module_path(module_name))
    }
}

/// Runtime version strings look like `Python 2.7.18`; the built-in
/// namespace was renamed with the 3.x line.
pub fn builtins_file_name(runtime_version: Option<&str>) -> &'static str {
    let major = runtime_version
        .and_then(|v| v.split_whitespace().find(|part| part.starts_with(char::is_numeric)))
        .and_then(|number| number.split('.').next());
    match major {
        Some("2") | Some("1") => LEGACY_BUILTINS_FILE_NAME,
        _ => BUILTINS_FILE_NAME,
    }
}
