//! Trailing-window counting over an [`EventStore`].

use chrono::{DateTime, TimeDelta, Utc};

use crate::WindowError;
use crate::store::EventStore;

/// Which incidents a window counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKey<'a> {
    /// Every incident, regardless of location or hour.
    Any,
    /// Incidents at this location.
    Location(&'a str),
    /// Incidents at this hour of day.
    Hour(u8),
}

/// Counts incidents in trailing windows `[anchor - window, anchor)`.
///
/// Each count is two binary searches over the key's sorted timestamp
/// column, so a query is `O(log n)` regardless of how many incidents the
/// window covers.
#[derive(Clone, Copy)]
pub struct WindowIndexer<'a> {
    store: &'a EventStore,
}

impl<'a> WindowIndexer<'a> {
    /// Creates an indexer over a built store.
    #[must_use]
    pub const fn new(store: &'a EventStore) -> Self {
        Self { store }
    }

    /// Counts incidents matching `key` with event time in
    /// `[anchor - window, anchor)`.
    ///
    /// An incident at exactly `anchor` is never counted, so an incident
    /// never counts itself or anything simultaneous with it. A window
    /// reaching before the earliest incident (or before the representable
    /// time range) just counts everything earlier than `anchor`.
    ///
    /// # Errors
    ///
    /// Returns [`WindowError::InvalidWindow`] if `window` is not positive.
    pub fn count(
        &self,
        anchor: DateTime<Utc>,
        window: TimeDelta,
        key: WindowKey<'_>,
    ) -> Result<u64, WindowError> {
        if window <= TimeDelta::zero() {
            return Err(WindowError::InvalidWindow { window });
        }

        let times = self.store.key_times(key);
        let end = times.partition_point(|t| *t < anchor);
        let start = anchor
            .checked_sub_signed(window)
            .map_or(0, |start| times[..end].partition_point(|t| *t < start));

        Ok((end - start) as u64)
    }
}
