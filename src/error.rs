//! Error types for the stub cache refresher.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from auxiliary cache files: blacklist, bundles, copied stubs.
///
/// These never abort a refresh run; callers log them and carry on with
/// degraded information.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Bundle {path:?} is unusable: {message}")]
    Bundle { path: PathBuf, message: String },

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Run-level errors surfaced to the caller of a refresh.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("Can't create stub cache directory {path:?}: {source}")]
    Setup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Refresh cancelled")]
    Cancelled,

    #[error("Refresher already ran; construct a new one per refresh")]
    AlreadyRun,

    #[error("Collaborator failed: {0}")]
    Collaborator(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to render output: {0}")]
    Output(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RefreshError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RefreshError::Cancelled)
    }
}

impl From<config::ConfigError> for RefreshError {
    fn from(err: config::ConfigError) -> Self {
        RefreshError::Config(err.to_string())
    }
}
