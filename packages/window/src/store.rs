//! Time-ordered incident store with per-key timestamp columns.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use crime_features_incident_models::IncidentRecord;

use crate::indexer::WindowKey;
use crate::{InvalidRecordReason, WindowError};

const HOURS_PER_DAY: usize = 24;

/// Incidents sorted by event time, plus one sorted timestamp column per
/// location and per hour of day. Incidents without an hour are only in
/// their location column.
///
/// Immutable once built, so it can be shared across worker threads by
/// reference.
pub struct EventStore {
    /// Records in non-decreasing `event_time` order.
    records: Vec<IncidentRecord>,
    /// `event_time` of `records[i]`, unwrapped.
    times: Vec<DateTime<Utc>>,
    by_location: BTreeMap<String, Vec<DateTime<Utc>>>,
    by_hour: [Vec<DateTime<Utc>>; HOURS_PER_DAY],
}

impl EventStore {
    /// Builds the store from records in any order.
    ///
    /// Records sharing a timestamp keep their input order.
    ///
    /// # Errors
    ///
    /// Returns [`WindowError::InvalidRecord`] for the first record with a
    /// missing `event_time` or an `hour_of_day` above 23. A missing hour is
    /// allowed. Nothing is skipped.
    pub fn build(records: Vec<IncidentRecord>) -> Result<Self, WindowError> {
        let mut timed = Vec::with_capacity(records.len());

        for (index, record) in records.into_iter().enumerate() {
            let reason = match (record.event_time, record.hour_of_day) {
                (None, _) => InvalidRecordReason::MissingEventTime,
                (Some(_), Some(hour)) if usize::from(hour) >= HOURS_PER_DAY => {
                    InvalidRecordReason::HourOutOfRange { hour }
                }
                (Some(time), _) => {
                    timed.push((time, record));
                    continue;
                }
            };

            return Err(WindowError::InvalidRecord {
                index,
                incident_id: record.incident_id,
                reason,
            });
        }

        timed.sort_by_key(|(time, _)| *time);

        let mut times = Vec::with_capacity(timed.len());
        let mut by_location: BTreeMap<String, Vec<DateTime<Utc>>> = BTreeMap::new();
        let mut by_hour: [Vec<DateTime<Utc>>; HOURS_PER_DAY] = std::array::from_fn(|_| Vec::new());

        // Pushing in global time order keeps every key column sorted.
        for (time, record) in &timed {
            times.push(*time);
            if let Some(hour) = record.hour_of_day {
                by_hour[usize::from(hour)].push(*time);
            }
            if let Some(column) = by_location.get_mut(record.location_id.as_str()) {
                column.push(*time);
            } else {
                by_location.insert(record.location_id.clone(), vec![*time]);
            }
        }

        let records: Vec<IncidentRecord> = timed.into_iter().map(|(_, record)| record).collect();

        log::debug!(
            "Built event store: {} incidents, {} locations",
            records.len(),
            by_location.len()
        );

        Ok(Self {
            records,
            times,
            by_location,
            by_hour,
        })
    }

    /// Number of incidents in the store.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no incidents.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of distinct locations.
    #[must_use]
    pub fn location_count(&self) -> usize {
        self.by_location.len()
    }

    /// All records, in non-decreasing event time order.
    #[must_use]
    pub fn records(&self) -> &[IncidentRecord] {
        &self.records
    }

    /// Event times parallel to [`Self::records`].
    #[must_use]
    pub fn times(&self) -> &[DateTime<Utc>] {
        &self.times
    }

    /// Consumes the store, returning its records in time order.
    #[must_use]
    pub fn into_records(self) -> Vec<IncidentRecord> {
        self.records
    }

    /// Returns the records with `event_time` in `[start, end)`.
    ///
    /// An empty or inverted interval yields an empty slice.
    #[must_use]
    pub fn range_query(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> &[IncidentRecord] {
        if start >= end {
            return &[];
        }
        let lo = self.times.partition_point(|t| *t < start);
        let hi = self.times.partition_point(|t| *t < end);
        &self.records[lo..hi]
    }

    /// Sorted timestamps of the records matching `key`.
    #[must_use]
    pub fn key_times(&self, key: WindowKey<'_>) -> &[DateTime<Utc>] {
        match key {
            WindowKey::Any => &self.times,
            WindowKey::Location(location) => self
                .by_location
                .get(location)
                .map(Vec::as_slice)
                .unwrap_or_default(),
            WindowKey::Hour(hour) => self
                .by_hour
                .get(usize::from(hour))
                .map(Vec::as_slice)
                .unwrap_or_default(),
        }
    }
}
