//! Turns joined offense rows into validated incident records.
//!
//! Rows that cannot become a valid record (no incident id, no location,
//! unparseable date) are dropped here and counted, so that the feature
//! engine only ever sees complete records. A missing or unusable hour does
//! not drop the row: the incident still counts toward its location's
//! windows.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use crime_features_crime_models::CrimeGroup;
use crime_features_incident_models::IncidentRecord;
use rand::SeedableRng as _;
use rand::rngs::StdRng;

use crate::IngestError;
use crate::nibrs::OffenseRow;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d-%b-%y", "%m/%d/%Y"];

/// Number of rows dropped per reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DropCounts {
    /// Empty `incident_id`.
    pub missing_incident_id: u64,
    /// Empty or unparseable `incident_date`.
    pub invalid_date: u64,
    /// Empty `location_id`.
    pub missing_location: u64,
}

impl DropCounts {
    /// Total number of dropped rows.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.missing_incident_id + self.invalid_date + self.missing_location
    }
}

/// Result of [`clean`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanOutcome {
    /// Valid records, in input order.
    pub records: Vec<IncidentRecord>,
    /// What was dropped.
    pub dropped: DropCounts,
    /// Kept records whose `incident_hour` was empty, non-integer or out of
    /// range. Their `hour_of_day` is `None`.
    pub missing_hour: u64,
}

/// Validates and converts joined offense rows.
#[must_use]
pub fn clean(rows: Vec<OffenseRow>) -> CleanOutcome {
    let mut records = Vec::with_capacity(rows.len());
    let mut dropped = DropCounts::default();
    let mut missing_hour = 0u64;

    for row in rows {
        if row.incident_id.is_empty() {
            dropped.missing_incident_id += 1;
            continue;
        }
        let Some(event_time) = parse_incident_date(&row.incident_date) else {
            dropped.invalid_date += 1;
            continue;
        };
        if row.location_id.is_empty() {
            dropped.missing_location += 1;
            continue;
        }
        let hour = parse_hour(&row.incident_hour);
        if hour.is_none() {
            missing_hour += 1;
        }

        let crime_group = CrimeGroup::from_optional_category(row.offense_category_name.as_deref());
        records.push(IncidentRecord::new(
            row.incident_id,
            event_time,
            row.location_id,
            hour,
            crime_group,
        ));
    }

    log::info!(
        "Cleaned {} records ({missing_hour} without a usable hour)",
        records.len()
    );
    if dropped.total() > 0 {
        log::warn!(
            "Dropped {} rows: {} without incident id, {} with invalid date, {} without location",
            dropped.total(),
            dropped.missing_incident_id,
            dropped.invalid_date,
            dropped.missing_location
        );
    }

    CleanOutcome {
        records,
        dropped,
        missing_hour,
    }
}

/// Keeps a seeded random `fraction` of `records`, in their original order.
///
/// The number kept is `fraction * len`, rounded. The same seed always keeps
/// the same records.
///
/// # Errors
///
/// Returns [`IngestError::InvalidSampleFraction`] unless `0 < fraction <= 1`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
pub fn sample(
    records: Vec<IncidentRecord>,
    fraction: f64,
    seed: u64,
) -> Result<Vec<IncidentRecord>, IngestError> {
    if fraction.is_nan() || fraction <= 0.0 || fraction > 1.0 {
        return Err(IngestError::InvalidSampleFraction { fraction });
    }

    let len = records.len();
    let amount = ((len as f64) * fraction).round() as usize;
    if amount >= len {
        return Ok(records);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut keep = rand::seq::index::sample(&mut rng, len, amount).into_vec();
    keep.sort_unstable();

    let mut keep = keep.into_iter().peekable();
    let sampled: Vec<IncidentRecord> = records
        .into_iter()
        .enumerate()
        .filter_map(|(i, record)| keep.next_if_eq(&i).map(|_| record))
        .collect();

    log::info!(
        "Sampled {} of {len} records (fraction {fraction}, seed {seed})",
        sampled.len()
    );

    Ok(sampled)
}

/// Parses a NIBRS `incident_date`. Date-only values are midnight UTC.
#[must_use]
pub fn parse_incident_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return Some(date.and_time(chrono::NaiveTime::MIN).and_utc());
        }
    }

    None
}

/// Parses an hour of day in 0-23. Accepts whole-number floats such as
/// `"9.0"`, which is how pandas-exported files write integer columns that
/// contain blanks.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn parse_hour(s: &str) -> Option<u8> {
    let s = s.trim();

    let hour = s.parse::<u8>().ok().or_else(|| {
        let value = s.parse::<f64>().ok()?;
        if value.fract() != 0.0 || !(0.0..24.0).contains(&value) {
            return None;
        }
        Some(value as u8)
    })?;

    (hour < 24).then_some(hour)
}
