//! Window lengths and parallelism for the feature pass.

use std::num::NonZeroUsize;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::WindowError;

/// Configuration for [`compute_counts`](crate::compute_counts).
///
/// Deserialized from the `[features]` table of the pipeline config. Every
/// field has a default, so an empty table is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Short trailing window for the per-location count, in days.
    pub location_short_window_days: u32,
    /// Long trailing window for the per-location count, in days.
    pub location_long_window_days: u32,
    /// Trailing window for the per-hour count, in days.
    pub hour_window_days: u32,
    /// Number of worker threads. `None` uses the available parallelism.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    /// Below this many incidents per worker, fewer workers are used.
    pub min_records_per_worker: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            location_short_window_days: 7,
            location_long_window_days: 30,
            hour_window_days: 30,
            workers: None,
            min_records_per_worker: 4096,
        }
    }
}

/// Validated window durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureWindows {
    /// Per-location short window.
    pub location_short: TimeDelta,
    /// Per-location long window.
    pub location_long: TimeDelta,
    /// Per-hour window.
    pub hour: TimeDelta,
}

impl FeatureConfig {
    /// Converts the configured day counts into durations.
    ///
    /// # Errors
    ///
    /// Returns [`WindowError::InvalidWindow`] if any window is zero days,
    /// or [`WindowError::InconsistentWindows`] if the short location window
    /// is longer than the long one.
    pub fn windows(&self) -> Result<FeatureWindows, WindowError> {
        let windows = FeatureWindows {
            location_short: days(self.location_short_window_days)?,
            location_long: days(self.location_long_window_days)?,
            hour: days(self.hour_window_days)?,
        };

        if windows.location_short > windows.location_long {
            return Err(WindowError::InconsistentWindows {
                short_days: self.location_short_window_days,
                long_days: self.location_long_window_days,
            });
        }

        Ok(windows)
    }

    /// Number of workers to use for `record_count` incidents. Always at
    /// least 1.
    #[must_use]
    pub fn worker_count(&self, record_count: usize) -> usize {
        let requested = self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
        });
        let by_size = record_count / self.min_records_per_worker.max(1);

        requested.min(by_size).max(1)
    }
}

fn days(days: u32) -> Result<TimeDelta, WindowError> {
    let window = TimeDelta::days(i64::from(days));
    if window <= TimeDelta::zero() {
        return Err(WindowError::InvalidWindow { window });
    }
    Ok(window)
}
