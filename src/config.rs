//! Configuration System
//!
//! Layered configuration: built-in defaults, the user-level file, workspace
//! files, then `STUBCACHE_*` environment variables. Tests included.

use crate::environment::Platform;
use crate::error::RefreshError;
use crate::logging::LoggingConfig;
use crate::process::GeneratorCommandConfig;
use crate::version::{VersionRules, REQUIRED_VERSION_FILE_NAME};
use config::{Config, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod merge {
    pub mod merge_policy;
}
mod sources {
    pub mod global_file;
    pub mod workspace_file;
}

use merge::merge_policy;
use sources::{global_file, workspace_file};

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StubCacheConfig {
    /// Directory holding one stub cache per environment. Defaults to the
    /// platform data directory.
    #[serde(default)]
    pub cache_root: Option<PathBuf>,

    /// Directory searched for pregenerated stub bundles.
    #[serde(default)]
    pub bundles_dir: Option<PathBuf>,

    /// `required_gen_version` rule table.
    #[serde(default)]
    pub required_versions_file: Option<PathBuf>,

    #[serde(default)]
    pub generator: GeneratorCommandConfig,

    /// Overrides the detected platform when naming bundles.
    #[serde(default)]
    pub platform: Option<Platform>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Path(String, String),
    Generator(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Path(key, msg) => write!(f, "{}: {}", key, msg),
            ValidationError::Generator(msg) => write!(f, "Generator: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl StubCacheConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        let paths = [
            ("cache_root", &self.cache_root),
            ("bundles_dir", &self.bundles_dir),
            ("required_versions_file", &self.required_versions_file),
        ];
        for (key, path) in paths {
            if path.as_ref().is_some_and(|p| p.as_os_str().is_empty()) {
                errors.push(ValidationError::Path(key.to_string(), "cannot be empty".to_string()));
            }
        }

        if let Some(program) = &self.generator.program {
            if program.as_os_str().is_empty() {
                errors.push(ValidationError::Generator("program cannot be empty".to_string()));
            }
        }
        if self.generator.list_args.is_empty() {
            errors.push(ValidationError::Generator("list_args cannot be empty".to_string()));
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            errors.push(ValidationError::Logging(format!(
                "unknown format '{}'",
                self.logging.format
            )));
        }
        match self.logging.output.as_str() {
            "stdout" | "stderr" => {}
            "file" if self.logging.file.is_some() => {}
            "file" => errors.push(ValidationError::Logging(
                "output 'file' needs logging.file".to_string(),
            )),
            other => errors.push(ValidationError::Logging(format!("unknown output '{}'", other))),
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Configured cache root, or `<data dir>/stubs`.
    pub fn resolve_cache_root(&self) -> Result<PathBuf, RefreshError> {
        if let Some(root) = &self.cache_root {
            return Ok(root.clone());
        }
        directories::ProjectDirs::from("", "", "stubcache")
            .map(|dirs| dirs.data_dir().join("stubs"))
            .ok_or_else(|| {
                RefreshError::Config("No home directory; set cache_root explicitly".to_string())
            })
    }

    /// Rule table from `required_versions_file`, else the one shipped next
    /// to the generator script, else an empty one.
    pub fn version_rules(&self) -> VersionRules {
        self.rules_file()
            .map(|path| VersionRules::load(&path))
            .unwrap_or_default()
    }

    fn rules_file(&self) -> Option<PathBuf> {
        if let Some(path) = &self.required_versions_file {
            return Some(path.clone());
        }
        let script = self.generator.args.first()?;
        Some(Path::new(script).parent()?.join(REQUIRED_VERSION_FILE_NAME))
    }

    /// Configured platform, or the one we run on.
    pub fn platform(&self) -> Platform {
        self.platform.clone().unwrap_or_else(Platform::current)
    }
}

/// Loads `StubCacheConfig` from its layered sources.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace.
    ///
    /// Precedence (lowest to highest): defaults, user-level file,
    /// `config/config.toml`, `config/{STUBCACHE_ENV}.toml`, environment.
    pub fn load(workspace_root: &Path) -> Result<StubCacheConfig, RefreshError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let config = builder
            .add_source(merge_policy::environment_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Load configuration from a single file, ignoring every other layer.
    pub fn load_from_file(path: &Path) -> Result<StubCacheConfig, RefreshError> {
        let config = Config::builder()
            .add_source(File::from(path).required(true))
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Built-in defaults only.
    pub fn default() -> StubCacheConfig {
        StubCacheConfig::default()
    }

    /// User-level config file location, if a home is known.
    pub fn xdg_config_path() -> Option<PathBuf> {
        global_file::global_config_path()
    }
}
