//! Generation Driver
//!
//! Walks the listed modules in name order and regenerates whatever the
//! staleness engine flags, one module at a time. The external generator is
//! not safe for concurrent use against the same cache directory, so there
//! is no parallelism here.

use crate::bootstrap::PregeneratedBundle;
use crate::collaborators::Generator;
use crate::environment::Environment;
use crate::error::RefreshError;
use crate::progress::ProgressSink;
use crate::staleness::{StalenessEngine, Verdict};
use crate::types::{BinaryModule, Listing, UpdateResult};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Result of one pass over the module listing.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ModulePass {
    /// Fresh and blacklist-suppressed failures, in module order.
    pub failures: Vec<UpdateResult>,
    /// Stubs produced by the generator.
    pub generated: usize,
    /// Stubs copied out of a pregenerated bundle instead.
    pub copied: usize,
}

pub struct GenerationDriver<'a> {
    generator: &'a dyn Generator,
    progress: &'a dyn ProgressSink,
    env: &'a Environment,
    extra_search_path: &'a str,
    bundle: Option<&'a PregeneratedBundle>,
}

impl<'a> GenerationDriver<'a> {
    pub fn new(
        generator: &'a dyn Generator,
        progress: &'a dyn ProgressSink,
        env: &'a Environment,
        extra_search_path: &'a str,
    ) -> Self {
        Self {
            generator,
            progress,
            env,
            extra_search_path,
            bundle: None,
        }
    }

    /// Serve stale modules from `bundle` before falling back to the generator.
    pub fn with_bundle(mut self, bundle: Option<&'a PregeneratedBundle>) -> Self {
        self.bundle = bundle;
        self
    }

    /// Bring every listed module up to date.
    ///
    /// Cancellation is polled before each module, never during one. The
    /// generator session is finalized after the last module.
    pub fn run(
        &self,
        listing: &Listing,
        staleness: &StalenessEngine<'_>,
    ) -> Result<ModulePass, RefreshError> {
        let started = Instant::now();
        let mut pass = ModulePass::default();
        let count = listing.modules.len();

        for (index, module) in listing.modules.values().enumerate() {
            self.progress.check_cancelled()?;
            self.progress.report_progress(index as f64 / count as f64);

            match staleness.assess(module) {
                Verdict::UpToDate => {}
                Verdict::Suppressed => {
                    debug!(module = %module.name, "Still blacklisted, not regenerating");
                    pass.failures.push(UpdateResult::suppressed(module));
                }
                Verdict::Rebuild(reason) => {
                    debug!(module = %module.name, ?reason, "Stub is stale");
                    self.progress.set_detail(&module.name);
                    self.rebuild(module, &mut pass)?;
                }
            }
        }

        self.finalize()?;
        self.progress.report_progress(1.0);
        info!(
            modules = count,
            generated = pass.generated,
            copied = pass.copied,
            failed = pass.failures.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Rebuilding stubs for binaries finished"
        );
        Ok(pass)
    }

    fn rebuild(&self, module: &BinaryModule, pass: &mut ModulePass) -> Result<(), RefreshError> {
        if let Some(bundle) = self.bundle {
            match bundle.copy_module(&module.name, &self.env.layout()) {
                Ok(true) => {
                    pass.copied += 1;
                    return Ok(());
                }
                Ok(false) => {}
                Err(e) => warn!(module = %module.name, error = %e, "Error copying pregenerated stub"),
            }
        }

        info!(module = %module.name, "Generating stub");
        let outcome = self.generator.generate(
            &module.name,
            Some(&module.origin_path),
            self.extra_search_path,
            &self.env.home,
        );
        match outcome {
            Ok(true) => pass.generated += 1,
            Ok(false) => {
                warn!(module = %module.name, "Stub generation failed");
                pass.failures.push(UpdateResult::fresh(module));
            }
            Err(RefreshError::Cancelled) => return Err(RefreshError::Cancelled),
            Err(e) => {
                warn!(module = %module.name, error = %e, "Stub generation errored");
                pass.failures.push(UpdateResult::fresh(module));
            }
        }
        Ok(())
    }

    fn finalize(&self) -> Result<(), RefreshError> {
        match self.generator.finalize() {
            Err(RefreshError::Cancelled) => Err(RefreshError::Cancelled),
            Err(e) => {
                warn!(error = %e, "Failed to finalize stub generation");
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }
}
