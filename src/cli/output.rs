//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::RefreshError;

/// Map domain/service errors to a string for CLI output.
pub fn map_error(e: &RefreshError) -> String {
    match e {
        RefreshError::Cancelled => "Cancelled".to_string(),
        RefreshError::Config(msg) => format!("Configuration error: {}", msg),
        _ => e.to_string(),
    }
}
