//! Progress reporting for the feature pass.
//!
//! Computing counts over a few million incidents takes long enough that the
//! CLI shows a progress bar. The engine only talks to the
//! [`ProgressCallback`] trait; the `indicatif` implementation lives in
//! `crime_features_cli_utils`.

use std::sync::Arc;

/// Receives progress updates from the feature pass.
///
/// Workers report from several threads at once, hence `Send + Sync`.
pub trait ProgressCallback: Send + Sync {
    /// Set the total number of incidents to process.
    fn set_total(&self, total: u64);

    /// Advance progress by `delta` incidents.
    fn inc(&self, delta: u64);

    /// Mark the pass as complete with a final message.
    fn finish(&self, msg: String);
}

/// Discards all progress updates. Used by tests and library callers.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn finish(&self, _msg: String) {}
}

/// Returns a shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
