//! CSV files between and after the pipeline stages.
//!
//! The cleaned file holds one row per validated record. The feature file
//! adds calendar features and the three trailing-window counts, with the
//! column names the model-training stage expects.

use std::io::{Read, Write};
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use crime_features_crime_models::CrimeGroup;
use crime_features_incident_models::{
    HourGroup, IncidentRecord, Season, TimeFeatures, WindowCounts,
};
use serde::{Deserialize, Serialize};

use crate::IngestError;
use crate::clean::parse_incident_date;

/// A row of the cleaned-records file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanedRow {
    /// Incident identifier.
    pub incident_id: String,
    /// RFC 3339 event time. May be empty in hand-edited files.
    pub incident_date: String,
    /// NIBRS location identifier.
    pub location_id: String,
    /// Hour of day. Empty when unknown.
    pub incident_hour: Option<u8>,
    /// Coarse crime group label.
    pub crime_group: CrimeGroup,
}

impl From<&IncidentRecord> for CleanedRow {
    fn from(record: &IncidentRecord) -> Self {
        Self {
            incident_id: record.incident_id.clone(),
            incident_date: record.event_time.map(format_time).unwrap_or_default(),
            location_id: record.location_id.clone(),
            incident_hour: record.hour_of_day,
            crime_group: record.crime_group,
        }
    }
}

impl From<CleanedRow> for IncidentRecord {
    /// An empty or unparseable date becomes `event_time: None`, which the
    /// event store rejects.
    fn from(row: CleanedRow) -> Self {
        Self {
            incident_id: row.incident_id,
            event_time: parse_incident_date(&row.incident_date),
            location_id: row.location_id,
            hour_of_day: row.incident_hour,
            crime_group: row.crime_group,
            counts: WindowCounts::default(),
        }
    }
}

/// A row of the feature table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureRow {
    /// Incident identifier.
    pub incident_id: String,
    /// RFC 3339 event time.
    pub incident_date: String,
    /// NIBRS location identifier.
    pub location_id: String,
    /// Hour of day. Empty when unknown.
    pub incident_hour: Option<u8>,
    /// Full weekday name.
    pub day_of_week: &'static str,
    /// Month, 1-12.
    pub month: u32,
    /// Season of the month.
    pub season: Season,
    /// Six-hour bucket of the hour. Empty when the hour is unknown.
    pub hour_group: Option<HourGroup>,
    /// Saturday or Sunday.
    pub is_weekend: bool,
    /// Coarse crime group label.
    pub crime_group: CrimeGroup,
    /// Incidents at this location in the short window.
    pub crime_count_7d_location: u64,
    /// Incidents at this location in the long window.
    pub crime_count_30d_location: u64,
    /// Incidents at this hour of day in the hour window.
    pub crime_count_30d_hour: u64,
}

impl FeatureRow {
    /// Builds the output row for an annotated record.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::IncompleteRecord`] if the record has no event
    /// time or an hour above 23.
    pub fn from_record(record: &IncidentRecord) -> Result<Self, IngestError> {
        let (Some(event_time), Some(features)) =
            (record.event_time, TimeFeatures::from_record(record))
        else {
            return Err(IngestError::IncompleteRecord {
                incident_id: record.incident_id.clone(),
            });
        };

        Ok(Self {
            incident_id: record.incident_id.clone(),
            incident_date: format_time(event_time),
            location_id: record.location_id.clone(),
            incident_hour: record.hour_of_day,
            day_of_week: features.day_name(),
            month: features.month,
            season: features.season,
            hour_group: features.hour_group,
            is_weekend: features.is_weekend,
            crime_group: record.crime_group,
            crime_count_7d_location: record.counts.count_7d_location,
            crime_count_30d_location: record.counts.count_30d_location,
            crime_count_30d_hour: record.counts.count_30d_hour,
        })
    }
}

fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Writes cleaned records to `path`, creating parent directories.
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be created or written.
pub fn write_cleaned(path: &Path, records: &[IncidentRecord]) -> Result<u64, IngestError> {
    let count = write_cleaned_to(create(path)?, records)?;
    log::info!("Wrote {count} cleaned records to {}", path.display());
    Ok(count)
}

/// Writes cleaned records as CSV to any writer.
///
/// # Errors
///
/// Returns [`IngestError::Csv`] if serialization or the write fails.
pub fn write_cleaned_to<W: Write>(
    writer: W,
    records: &[IncidentRecord],
) -> Result<u64, IngestError> {
    let mut writer = csv::Writer::from_writer(writer);
    for record in records {
        writer.serialize(CleanedRow::from(record))?;
    }
    writer.flush().map_err(csv::Error::from)?;
    Ok(records.len() as u64)
}

/// Reads a cleaned-records file.
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be opened or a row is
/// malformed.
pub fn read_cleaned(path: &Path) -> Result<Vec<IncidentRecord>, IngestError> {
    let file = std::fs::File::open(path).map_err(|e| IngestError::io(path, e))?;
    let records = read_cleaned_from(file)?;
    log::info!("Read {} cleaned records from {}", records.len(), path.display());
    Ok(records)
}

/// Reads cleaned records from any reader.
///
/// # Errors
///
/// Returns [`IngestError::Csv`] if a row is malformed.
pub fn read_cleaned_from<R: Read>(reader: R) -> Result<Vec<IncidentRecord>, IngestError> {
    csv::Reader::from_reader(reader)
        .deserialize::<CleanedRow>()
        .map(|row| Ok(IncidentRecord::from(row?)))
        .collect()
}

/// Writes the feature table to `path`, creating parent directories.
///
/// # Errors
///
/// Returns [`IngestError`] if a record is incomplete or the file cannot be
/// written.
pub fn write_features(path: &Path, records: &[IncidentRecord]) -> Result<u64, IngestError> {
    let count = write_features_to(create(path)?, records)?;
    log::info!("Wrote {count} feature rows to {}", path.display());
    Ok(count)
}

/// Writes the feature table as CSV to any writer.
///
/// # Errors
///
/// Returns [`IngestError`] if a record is incomplete or the write fails.
pub fn write_features_to<W: Write>(
    writer: W,
    records: &[IncidentRecord],
) -> Result<u64, IngestError> {
    let mut writer = csv::Writer::from_writer(writer);
    for record in records {
        writer.serialize(FeatureRow::from_record(record)?)?;
    }
    writer.flush().map_err(csv::Error::from)?;
    Ok(records.len() as u64)
}

fn create(path: &Path) -> Result<std::fs::File, IngestError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| IngestError::io(parent, e))?;
    }
    std::fs::File::create(path).map_err(|e| IngestError::io(path, e))
}
