//! Interfaces of the external collaborators a refresh run depends on.
//!
//! Listing binaries and producing stubs are done by an external generator;
//! the refresher only decides when to call it. [`crate::process`] has a
//! command-backed implementation.

use crate::bootstrap::PregeneratedBundle;
use crate::environment::Environment;
use crate::error::RefreshError;
use crate::types::{FormatVersion, Listing};
use std::path::Path;
use tracing::warn;

/// Lists the binary modules of an environment.
pub trait BinaryLister {
    fn list(&self, env: &Environment, extra_search_path: &str) -> Result<Listing, RefreshError>;
}

/// Produces stubs into one cache directory.
///
/// Implementations are not expected to support concurrent calls; the
/// refresher invokes them strictly one at a time.
pub trait Generator {
    /// Generate the stub for one module. `origin_path` is `None` for the
    /// built-in namespace.
    ///
    /// `Ok(false)` is an ordinary generation failure. `Err(Cancelled)`
    /// aborts the run without recording a failure.
    fn generate(
        &self,
        module_name: &str,
        origin_path: Option<&str>,
        extra_search_path: &str,
        environment_root: &Path,
    ) -> Result<bool, RefreshError>;

    /// Generate the stub of the built-in namespace.
    fn generate_builtins(&self, env: &Environment) -> Result<bool, RefreshError>;

    /// Whether the binary a stub was generated from still exists.
    fn exists(&self, origin_path: &str) -> bool {
        Path::new(origin_path).exists()
    }

    /// Delete a stub file or an empty directory, logging failures.
    fn delete_or_log(&self, path: &Path) -> bool {
        let result = if path.is_dir() {
            std::fs::remove_dir(path)
        } else {
            std::fs::remove_file(path)
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to delete");
                false
            }
        }
    }

    /// Flush or shut down the generator session after a module pass.
    fn finalize(&self) -> Result<(), RefreshError> {
        Ok(())
    }
}

/// Locates a pregenerated bundle for an environment.
pub trait BundleProvider {
    fn resolve(
        &self,
        env: &Environment,
        generator_version: FormatVersion,
    ) -> Option<PregeneratedBundle>;
}

/// Provider for setups that ship no bundles.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBundles;

impl BundleProvider for NoBundles {
    fn resolve(&self, _env: &Environment, _generator_version: FormatVersion) -> Option<PregeneratedBundle> {
        None
    }
}

/// Generator for maintenance runs that only inspect or sweep a cache.
/// Every generation request fails; existence checks hit the filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoGenerator;

impl Generator for NoGenerator {
    fn generate(&self, module_name: &str, _: Option<&str>, _: &str, _: &Path) -> Result<bool, RefreshError> {
        Err(RefreshError::Collaborator(format!(
            "No generator configured to build '{}'",
            module_name
        )))
    }

    fn generate_builtins(&self, _env: &Environment) -> Result<bool, RefreshError> {
        Err(RefreshError::Collaborator("No generator configured".to_string()))
    }
}
