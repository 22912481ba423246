#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Trailing time-window feature engine.
//!
//! For every incident, counts the incidents that happened strictly before
//! it within a trailing window, either at the same location or at the same
//! hour of day. The work is split into three pieces:
//!
//! - [`store::EventStore`] sorts incidents by time once and keeps a sorted
//!   timestamp column per location and per hour.
//! - [`indexer::WindowIndexer`] answers "how many incidents with this key
//!   fall in `[t - D, t)`?" with two binary searches.
//! - [`emitter`] drives the indexer over every incident, in parallel over
//!   contiguous chunks, and attaches the resulting
//!   [`WindowCounts`](crime_features_incident_models::WindowCounts).

pub mod config;
pub mod emitter;
pub mod indexer;
pub mod progress;
pub mod store;

use chrono::TimeDelta;

pub use config::{FeatureConfig, FeatureWindows};
pub use emitter::{annotate, compute_counts, compute_features};
pub use indexer::{WindowIndexer, WindowKey};
pub use store::EventStore;

/// Errors raised by the feature engine.
///
/// Both variants are contract violations by the caller. Nothing is retried
/// or skipped: a silently dropped record would skew the counts of every
/// incident near it.
#[derive(Debug, thiserror::Error)]
pub enum WindowError {
    /// A record reached the event store without a usable timestamp or hour.
    #[error("Invalid record at position {index} (incident {incident_id}): {reason}")]
    InvalidRecord {
        /// Position of the record in the input collection.
        index: usize,
        /// Incident identifier of the offending record.
        incident_id: String,
        /// What is wrong with it.
        reason: InvalidRecordReason,
    },

    /// A window duration was zero or negative.
    #[error("Invalid window {window}: duration must be positive")]
    InvalidWindow {
        /// The rejected duration.
        window: TimeDelta,
    },

    /// The short location window is longer than the long one, which would
    /// break `count_7d_location <= count_30d_location`.
    #[error(
        "Inconsistent location windows: short window ({short_days} days) exceeds long window ({long_days} days)"
    )]
    InconsistentWindows {
        /// Configured short location window.
        short_days: u32,
        /// Configured long location window.
        long_days: u32,
    },
}

/// Why a record was rejected by [`EventStore::build`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InvalidRecordReason {
    /// `event_time` is missing.
    #[error("missing event time")]
    MissingEventTime,
    /// `hour_of_day` is present but not in 0-23.
    #[error("hour of day {hour} is outside 0-23")]
    HourOutOfRange {
        /// The rejected hour.
        hour: u8,
    },
}
