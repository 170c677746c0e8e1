//! Stubcache: Stub Cache Refresher
//!
//! Keeps an on-disk cache of generated interface stubs for a runtime's
//! binary modules coherent with the binaries actually installed. Decides
//! per module whether to regenerate, copy from a bundle or base environment,
//! suppress a known failure, or delete an orphan.

pub mod blacklist;
pub mod bootstrap;
pub mod cleanup;
pub mod cli;
pub mod collaborators;
pub mod config;
pub mod environment;
pub mod error;
pub mod generation;
pub mod logging;
pub mod process;
pub mod progress;
pub mod refresh;
pub mod staleness;
pub mod stub;
pub mod types;
pub mod version;

pub use collaborators::{BinaryLister, BundleProvider, Generator};
pub use environment::Environment;
pub use error::{RefreshError, StoreError};
pub use refresh::{RefreshOutcome, Refresher};
