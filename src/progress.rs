//! Progress reporting and cooperative cancellation for refresh runs.
//!
//! The refresher only ever talks to a [`ProgressSink`]; UI layers supply
//! their own implementation, headless callers use [`NoProgress`].

use crate::error::RefreshError;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// Capability injected into a refresh run.
pub trait ProgressSink {
    /// Headline of the current step.
    fn set_text(&self, _text: &str) {}

    /// Secondary line, e.g. the module currently being processed.
    fn set_detail(&self, _detail: &str) {}

    /// Fraction of the module pass completed, in `0.0..=1.0`.
    fn report_progress(&self, _fraction: f64) {}

    /// Polled between expensive steps. Returns `Err(RefreshError::Cancelled)`
    /// once the caller asked to stop.
    fn check_cancelled(&self) -> Result<(), RefreshError> {
        Ok(())
    }
}

/// Sink that ignores everything and never cancels.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {}

/// Shared flag a caller flips to cancel a running refresh.
#[derive(Debug, Default, Clone)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl ProgressSink for CancellationFlag {
    fn check_cancelled(&self) -> Result<(), RefreshError> {
        if self.is_cancelled() {
            Err(RefreshError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Sink that mirrors progress into the log, for the CLI.
#[derive(Debug, Default, Clone)]
pub struct LogProgress {
    cancel: CancellationFlag,
    /// Last reported percentage.
    last_percent: Arc<AtomicU64>,
}

impl LogProgress {
    pub fn new(cancel: CancellationFlag) -> Self {
        Self {
            cancel,
            last_percent: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl ProgressSink for LogProgress {
    fn set_text(&self, text: &str) {
        info!("{}", text);
    }

    fn set_detail(&self, detail: &str) {
        debug!(detail, "Refresh step");
    }

    fn report_progress(&self, fraction: f64) {
        let percent = (fraction.clamp(0.0, 1.0) * 100.0) as u64;
        let last = self.last_percent.load(Ordering::Relaxed);
        if percent / 10 > last / 10 {
            self.last_percent.store(percent, Ordering::Relaxed);
            info!(percent, "Regenerating stubs");
        }
    }

    fn check_cancelled(&self) -> Result<(), RefreshError> {
        self.cancel.check_cancelled()
    }
}

/// Milliseconds since the Unix epoch for a filesystem timestamp.
pub fn system_time_millis(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_millis() as i64,
        Err(before) => -(before.duration().as_millis() as i64),
    }
}
