//! Progress-callback trait for per-unit conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ServerConfigBuilder::progress_callback`] to observe each
//! page or image as it is converted and appended to the archive. The server
//! binary installs [`TracingProgressCallback`], which turns the events into
//! structured log lines.
//!
//! A "unit" is one PDF page or one uploaded image. Callbacks fire on the
//! thread doing the conversion (the engine thread for PDFs, a blocking-pool
//! thread for image batches), so implementations must be `Send + Sync` and
//! cheap.

use std::sync::Arc;
use tracing::{debug, info, warn};

/// Called by the conversion pipeline as it processes each unit.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before the first unit is converted.
    ///
    /// # Arguments
    /// * `total_units` — pages in the PDF or images in the batch
    fn on_conversion_start(&self, total_units: usize) {
        let _ = total_units;
    }

    /// Called after a unit was written to the workspace.
    ///
    /// # Arguments
    /// * `unit_num`    — 1-indexed unit number
    /// * `total_units` — total units
    /// * `entry_name`  — archive entry the unit will be stored under
    fn on_unit_complete(&self, unit_num: usize, total_units: usize, entry_name: &str) {
        let _ = (unit_num, total_units, entry_name);
    }

    /// Called when a unit fails; the conversion stops after this.
    fn on_unit_error(&self, unit_num: usize, total_units: usize, error: &str) {
        let _ = (unit_num, total_units, error);
    }

    /// Called once after the loop ends, successfully or not.
    ///
    /// # Arguments
    /// * `total_units`   — units that were expected
    /// * `success_count` — units handed to the archive
    fn on_conversion_complete(&self, total_units: usize, success_count: usize) {
        let _ = (total_units, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Logs every event through `tracing`.
pub struct TracingProgressCallback;

impl ConversionProgressCallback for TracingProgressCallback {
    fn on_conversion_start(&self, total_units: usize) {
        info!(total_units, "conversion started");
    }

    fn on_unit_complete(&self, unit_num: usize, total_units: usize, entry_name: &str) {
        debug!(unit = unit_num, total_units, entry = entry_name, "unit converted");
    }

    fn on_unit_error(&self, unit_num: usize, total_units: usize, error: &str) {
        warn!(unit = unit_num, total_units, error, "unit failed");
    }

    fn on_conversion_complete(&self, total_units: usize, success_count: usize) {
        info!(total_units, success_count, "conversion finished");
    }
}

/// Convenience alias matching the type stored in [`crate::config::ServerConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

/// The configured callback, or a no-op one.
pub(crate) fn resolve(callback: Option<&ProgressCallback>) -> ProgressCallback {
    callback
        .cloned()
        .unwrap_or_else(|| Arc::new(NoopProgressCallback))
}
