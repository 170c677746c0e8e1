//! Refresh Orchestrator
//!
//! One refresh run brings the stub cache of an environment in line with its
//! current binaries:
//!
//! ```text
//! Idle → BlacklistLoaded → Listed → (Bootstrapped) → BuiltinChecked
//!      → ModulesUpdated → Cleaned → Done
//! ```
//!
//! Any step may end in `Error` on cancellation or when the cache directory
//! cannot be created. A [`Refresher`] runs once; construct a new one per
//! refresh request. Callers must not run two refreshers against the same
//! cache directory at the same time.

use crate::blacklist::Blacklist;
use crate::bootstrap::{copy_from_base, PregeneratedBundle};
use crate::cleanup::{clean_orphans, CleanupReport};
use crate::collaborators::{BinaryLister, BundleProvider, Generator, NoBundles};
use crate::environment::Environment;
use crate::error::RefreshError;
use crate::generation::{GenerationDriver, ModulePass};
use crate::progress::{NoProgress, ProgressSink};
use crate::staleness::{builtins_outdated, StalenessEngine};
use crate::stub::read_header;
use crate::types::{FormatVersion, Listing, UpdateResult};
use crate::version::{VersionChecker, VersionRules};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RefreshState {
    Idle,
    BlacklistLoaded,
    Listed,
    Bootstrapped,
    BuiltinChecked,
    ModulesUpdated,
    Cleaned,
    Done,
    Error,
}

/// What a completed refresh run did.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshOutcome {
    /// Modules still failing: fresh failures and blacklist-suppressed ones.
    pub failures: Vec<UpdateResult>,
    /// The cache was missing or in the legacy format when the run started.
    pub migrated: bool,
    /// A pregenerated bundle was extracted into the cache.
    pub bootstrapped: bool,
    /// Stubs copied from a base environment.
    pub copied_from_base: usize,
    pub builtins_updated: bool,
    pub generated: usize,
    pub copied_from_bundle: usize,
    /// `None` when the sweep was skipped for a freshly bootstrapped cache.
    pub cleanup: Option<CleanupReport>,
    pub generator_version: FormatVersion,
    /// Policy used by this run; pass it to the next run as the cached policy.
    pub version_checker: VersionChecker,
}

impl RefreshOutcome {
    /// Names of all modules still failing, sorted.
    pub fn failed_modules(&self) -> Vec<String> {
        let mut names: Vec<String> = self.failures.iter().map(|f| f.module_name.clone()).collect();
        names.sort();
        names
    }

    /// Fresh failures worth telling the user about. Empty for a run that
    /// migrated the cache, where failures are expected.
    pub fn notifiable_failures(&self) -> Vec<String> {
        if self.migrated {
            return Vec::new();
        }
        let mut names: Vec<String> = self
            .failures
            .iter()
            .filter(|f| f.fresh)
            .map(|f| f.module_name.clone())
            .collect();
        names.sort();
        names
    }
}

/// Run-scoped state threaded through the pipeline stages.
struct RefreshContext {
    blacklist: Blacklist,
    listing: Listing,
    checker: VersionChecker,
    extra_search_path: String,
    bundle: Option<PregeneratedBundle>,
}

impl RefreshContext {
    fn generator_version(&self) -> FormatVersion {
        self.listing.generator_version
    }
}

/// Single-use refresher of one environment's stub cache.
pub struct Refresher<'a> {
    env: &'a Environment,
    lister: &'a dyn BinaryLister,
    generator: &'a dyn Generator,
    bundles: &'a dyn BundleProvider,
    progress: &'a dyn ProgressSink,
    rules: VersionRules,
    cached_checker: Option<VersionChecker>,
    state: RefreshState,
}

impl<'a> Refresher<'a> {
    pub fn new(
        env: &'a Environment,
        lister: &'a dyn BinaryLister,
        generator: &'a dyn Generator,
    ) -> Self {
        Self {
            env,
            lister,
            generator,
            bundles: &NoBundles,
            progress: &NoProgress,
            rules: VersionRules::default(),
            cached_checker: None,
            state: RefreshState::Idle,
        }
    }

    pub fn with_bundles(mut self, bundles: &'a dyn BundleProvider) -> Self {
        self.bundles = bundles;
        self
    }

    pub fn with_progress(mut self, progress: &'a dyn ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_rules(mut self, rules: VersionRules) -> Self {
        self.rules = rules;
        self
    }

    /// Policy of a previous run, reused where the new generator version
    /// does not override it.
    pub fn with_cached_checker(mut self, checker: Option<VersionChecker>) -> Self {
        self.cached_checker = checker;
        self
    }

    pub fn state(&self) -> RefreshState {
        self.state
    }

    /// Run the refresh. Fails with [`RefreshError::AlreadyRun`] on a second call.
    pub fn refresh(&mut self) -> Result<RefreshOutcome, RefreshError> {
        if self.state != RefreshState::Idle {
            return Err(RefreshError::AlreadyRun);
        }
        match self.run() {
            Ok(outcome) => {
                self.advance(RefreshState::Done);
                Ok(outcome)
            }
            Err(e) => {
                if e.is_cancelled() {
                    info!(cache_dir = %self.env.cache_dir.display(), "Stub refresh cancelled");
                } else {
                    warn!(cache_dir = %self.env.cache_dir.display(), error = %e, "Stub refresh failed");
                }
                self.state = RefreshState::Error;
                Err(e)
            }
        }
    }

    fn run(&mut self) -> Result<RefreshOutcome, RefreshError> {
        let env = self.env;
        let cache_dir = env.cache_dir.as_path();
        ensure_cache_dir(cache_dir)?;

        let blacklist = Blacklist::load(cache_dir);
        self.advance(RefreshState::BlacklistLoaded);

        let readable_home = env.home.display().to_string();
        self.progress
            .set_text(&format!("Querying binary modules of {}", readable_home));
        self.progress.check_cancelled()?;
        let extra_search_path = env.extra_search_path();
        let listing = self.lister.list(env, &extra_search_path)?;
        self.advance(RefreshState::Listed);

        let generator_version = listing.generator_version;
        let checker = match &self.cached_checker {
            Some(cached) => cached.with_default_version_if_unknown(generator_version),
            None => VersionChecker::new(generator_version, &self.rules),
        };
        let ctx = RefreshContext {
            blacklist,
            bundle: self.bundles.resolve(env, generator_version),
            listing,
            checker,
            extra_search_path,
        };

        let builtins_file = env.builtins_file();
        let migrated = read_header(&builtins_file).map_or(true, |h| h.generator_version == 0);
        let mut bootstrapped = false;
        let mut copied_from_base = 0;
        if migrated {
            info!(cache_dir = %cache_dir.display(), "Stub cache missing or in legacy format");
            bootstrapped = self.extract_bundle(&ctx)?;
            copied_from_base = self.copy_base_stubs(&ctx)?;
            self.advance(RefreshState::Bootstrapped);
        }

        let builtins_updated = self.update_builtins(&ctx, &builtins_file)?;
        self.advance(RefreshState::BuiltinChecked);

        self.progress
            .set_text(&format!("Updating stubs of {}", readable_home));
        let pass = self.update_modules(&ctx)?;
        Blacklist::from_failures(&pass.failures, ctx.generator_version()).persist(cache_dir);
        self.advance(RefreshState::ModulesUpdated);

        let cleanup = if migrated {
            debug!("Skipping orphan sweep of a freshly seeded cache");
            None
        } else {
            self.progress
                .set_text(&format!("Cleaning up stubs of {}", readable_home));
            Some(clean_orphans(cache_dir, self.generator, self.progress)?)
        };
        self.advance(RefreshState::Cleaned);

        Ok(RefreshOutcome {
            failures: pass.failures,
            migrated,
            bootstrapped,
            copied_from_base,
            builtins_updated,
            generated: pass.generated,
            copied_from_bundle: pass.copied,
            cleanup,
            generator_version,
            version_checker: ctx.checker,
        })
    }

    fn extract_bundle(&self, ctx: &RefreshContext) -> Result<bool, RefreshError> {
        let Some(bundle) = &ctx.bundle else {
            return Ok(false);
        };
        self.progress.set_text("Unpacking pregenerated stubs");
        self.progress.check_cancelled()?;
        match bundle.extract_into(&self.env.cache_dir) {
            Ok(files) => {
                info!(bundle = %bundle.path().display(), files, "Unpacked pregenerated stubs");
                Ok(true)
            }
            Err(e) => {
                warn!(error = %e, "Error unpacking pregenerated stubs");
                Ok(false)
            }
        }
    }

    fn copy_base_stubs(&self, ctx: &RefreshContext) -> Result<usize, RefreshError> {
        let Some(base) = self.env.base.as_deref() else {
            return Ok(0);
        };
        self.progress.set_text("Copying base environment stubs");
        self.progress.check_cancelled()?;
        let base_listing = match self.lister.list(base, &base.extra_search_path()) {
            Ok(listing) => listing,
            Err(RefreshError::Cancelled) => return Err(RefreshError::Cancelled),
            Err(e) => {
                warn!(base = %base.home.display(), error = %e, "Could not list base environment binaries");
                return Ok(0);
            }
        };
        let copied = copy_from_base(
            &self.env.layout(),
            &ctx.listing,
            &base.layout(),
            &base_listing,
            self.progress,
        )?;
        info!(copied, base = %base.home.display(), "Copied stubs from base environment");
        Ok(copied)
    }

    fn update_builtins(&self, ctx: &RefreshContext, builtins_file: &Path) -> Result<bool, RefreshError> {
        if !builtins_outdated(builtins_file, &ctx.checker) {
            return Ok(false);
        }
        self.progress
            .set_text(&format!("Updating built-in stubs of {}", self.env.home.display()));
        self.progress.check_cancelled()?;
        match self.generator.generate_builtins(self.env) {
            Ok(true) => Ok(true),
            Ok(false) => {
                warn!("Built-in stub generation failed");
                Ok(false)
            }
            Err(RefreshError::Cancelled) => Err(RefreshError::Cancelled),
            Err(e) => {
                warn!(error = %e, "Built-in stub generation errored");
                Ok(false)
            }
        }
    }

    fn update_modules(&self, ctx: &RefreshContext) -> Result<ModulePass, RefreshError> {
        let layout = self.env.layout();
        let staleness = StalenessEngine::new(
            &layout,
            &ctx.checker,
            &ctx.blacklist,
            ctx.generator_version(),
        );
        GenerationDriver::new(self.generator, self.progress, self.env, &ctx.extra_search_path)
            .with_bundle(ctx.bundle.as_ref())
            .run(&ctx.listing, &staleness)
    }

    fn advance(&mut self, next: RefreshState) {
        debug_assert!(next > self.state, "refresh state went backwards");
        debug!(from = ?self.state, to = ?next, "Refresh state");
        self.state = next;
    }
}

fn ensure_cache_dir(cache_dir: &Path) -> Result<(), RefreshError> {
    std::fs::create_dir_all(cache_dir).map_err(|source| RefreshError::Setup {
        path: cache_dir.to_path_buf(),
        source,
    })
}
