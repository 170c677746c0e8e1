//! CLI route: single route table and run context. Dispatches to domain services and presentation.

use crate::blacklist::Blacklist;
use crate::bootstrap::DirectoryBundleProvider;
use crate::cleanup::clean_orphans;
use crate::collaborators::{BundleProvider, NoBundles, NoGenerator};
use crate::config::{ConfigLoader, StubCacheConfig};
use crate::environment::{cache_dir_for, Environment};
use crate::error::RefreshError;
use crate::process::ProcessGenerator;
use crate::progress::{CancellationFlag, LogProgress};
use crate::refresh::Refresher;
use crate::stub::inventory;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

use crate::cli::command_name;
use crate::cli::parse::Commands;
use crate::cli::presentation::{
    format_blacklist_json, format_blacklist_text, format_cleanup_text, format_inventory_json,
    format_inventory_text, format_refresh_json, format_refresh_text,
};

/// Environments described on the command line.
struct RefreshTarget<'a> {
    home: &'a Path,
    version: Option<&'a str>,
    roots: &'a [PathBuf],
    cache_dir: Option<&'a Path>,
    base_home: Option<&'a Path>,
    base_roots: &'a [PathBuf],
}

/// Runtime context for CLI execution: workspace and loaded configuration.
/// Built from workspace path and optional config path using ConfigLoader only.
pub struct RunContext {
    workspace_root: PathBuf,
    config: StubCacheConfig,
    cancel: CancellationFlag,
}

impl RunContext {
    /// Create run context from workspace root and optional config path. Uses ConfigLoader only.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, RefreshError> {
        let config = if let Some(ref cfg_path) = config_path {
            ConfigLoader::load_from_file(cfg_path)?
        } else {
            ConfigLoader::load(&workspace_root)?
        };
        Self::with_config(workspace_root, config)
    }

    /// Create run context from an already loaded configuration.
    pub fn with_config(workspace_root: PathBuf, config: StubCacheConfig) -> Result<Self, RefreshError> {
        if let Err(errors) = config.validate() {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            return Err(RefreshError::Config(messages.join("; ")));
        }
        Ok(Self {
            workspace_root,
            config,
            cancel: CancellationFlag::new(),
        })
    }

    pub fn config(&self) -> &StubCacheConfig {
        &self.config
    }

    /// Flag observed by long-running commands; set it to stop them early.
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> Result<String, RefreshError> {
        let started = Instant::now();
        let name = command_name(command);
        let result = self.execute_inner(command);
        match &result {
            Ok(_) => info!(command = name, elapsed_ms = started.elapsed().as_millis() as u64, "Command finished"),
            Err(e) => warn!(command = name, error = %e, "Command failed"),
        }
        result
    }

    fn execute_inner(&self, command: &Commands) -> Result<String, RefreshError> {
        match command {
            Commands::Refresh {
                home,
                version,
                roots,
                cache_dir,
                base_home,
                base_roots,
                format,
            } => {
                let target = RefreshTarget {
                    home,
                    version: version.as_deref(),
                    roots,
                    cache_dir: cache_dir.as_deref(),
                    base_home: base_home.as_deref(),
                    base_roots,
                };
                self.handle_refresh(&target, format)
            }
            Commands::Inspect { cache_dir, format } => {
                let entries = inventory(&self.resolve(cache_dir));
                if format == "json" {
                    format_inventory_json(&entries)
                } else {
                    Ok(format_inventory_text(&entries))
                }
            }
            Commands::Blacklist { cache_dir, format } => {
                let blacklist = Blacklist::load(&self.resolve(cache_dir));
                if format == "json" {
                    format_blacklist_json(&blacklist)
                } else {
                    Ok(format_blacklist_text(&blacklist))
                }
            }
            Commands::Clean { cache_dir } => {
                let cache_dir = self.resolve(cache_dir);
                if !cache_dir.is_dir() {
                    return Err(RefreshError::Config(format!(
                        "{} is not a directory",
                        cache_dir.display()
                    )));
                }
                let progress = LogProgress::new(self.cancel.clone());
                let report = clean_orphans(&cache_dir, &NoGenerator, &progress)?;
                Ok(format_cleanup_text(&report))
            }
        }
    }

    fn handle_refresh(&self, target: &RefreshTarget<'_>, format: &str) -> Result<String, RefreshError> {
        let cache_root = self.config.resolve_cache_root()?;
        let cache_dir = match target.cache_dir {
            Some(dir) => self.resolve(dir),
            None => cache_dir_for(&cache_root, target.home),
        };

        let mut env = Environment::new(target.home, &cache_dir)
            .with_roots(target.roots.iter().cloned())
            .with_platform(self.config.platform());
        if let Some(version) = target.version {
            env = env.with_version(version);
        }
        if let Some(base_home) = target.base_home {
            let base = Environment::new(base_home, cache_dir_for(&cache_root, base_home))
                .with_roots(target.base_roots.iter().cloned())
                .with_platform(self.config.platform());
            env = env.with_base(base);
        }

        let generator = ProcessGenerator::new(self.config.generator.clone(), &cache_dir)?;
        let bundles: Box<dyn BundleProvider> = match &self.config.bundles_dir {
            Some(dir) => Box::new(DirectoryBundleProvider::new(self.resolve(dir))),
            None => Box::new(NoBundles),
        };
        let progress = LogProgress::new(self.cancel.clone());

        let outcome = Refresher::new(&env, &generator, &generator)
            .with_bundles(bundles.as_ref())
            .with_progress(&progress)
            .with_rules(self.config.version_rules())
            .refresh()?;

        if format == "json" {
            format_refresh_json(&outcome)
        } else {
            Ok(format_refresh_text(&outcome, &cache_dir))
        }
    }

    /// Relative paths are taken relative to the workspace root.
    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        }
    }
}
