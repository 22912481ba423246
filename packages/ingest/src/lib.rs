#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Upstream stages of the feature pipeline.
//!
//! Yearly NIBRS extracts arrive as zip archives of CSV tables. This crate
//! extracts them ([`archive`]), joins the incident, offense and offense
//! type tables ([`nibrs`]), turns the joined rows into validated
//! [`IncidentRecord`](crime_features_incident_models::IncidentRecord)s
//! ([`clean`]) and reads/writes the intermediate and final CSV files
//! ([`csv_io`]).
//!
//! Every stage takes its input explicitly and returns its output; nothing
//! is shared between stages except what is passed along.

pub mod archive;
pub mod clean;
pub mod csv_io;
pub mod nibrs;

use std::path::Path;

use crate::archive::ArchiveSource;
use crate::nibrs::OffenseRow;

/// Errors that can occur while ingesting or persisting incident data.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// I/O error at a specific path.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The zip archive could not be read.
    #[error("Zip error in {path}: {source}")]
    Zip {
        /// Archive that caused the error.
        path: String,
        /// Underlying zip error.
        source: zip::result::ZipError,
    },

    /// CSV read or write failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A NIBRS table is missing one of the columns we need.
    #[error("{file} has no '{column}' column")]
    MissingColumn {
        /// Table file name.
        file: String,
        /// Column that was looked for (case-insensitive).
        column: String,
    },

    /// A NIBRS table file is missing from an extracted archive.
    #[error("{file} not found in {dir}")]
    MissingTable {
        /// Expected file name (case-insensitive).
        file: String,
        /// Directory that was searched.
        dir: String,
    },

    /// A sample fraction outside `(0, 1]`.
    #[error("Sample fraction {fraction} is outside (0, 1]")]
    InvalidSampleFraction {
        /// The rejected fraction.
        fraction: f64,
    },

    /// A record cannot be written to the feature table because it lacks an
    /// event time or has an hour above 23.
    #[error("Incident {incident_id} has no valid event time or hour")]
    IncompleteRecord {
        /// Offending incident.
        incident_id: String,
    },
}

impl IngestError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Extracts every configured archive, then loads and concatenates their
/// joined offense rows in the given order.
///
/// # Errors
///
/// Returns [`IngestError`] if an archive is missing or unreadable, or a
/// table is missing or malformed.
pub fn load_archives(
    data_dir: &Path,
    extract_dir: &Path,
    archives: &[ArchiveSource],
) -> Result<Vec<OffenseRow>, IngestError> {
    let tables_dirs = archives
        .iter()
        .map(|source| archive::extract_archive(source, data_dir, extract_dir))
        .collect::<Result<Vec<_>, _>>()?;

    let rows = nibrs::load_years(&tables_dirs)?;

    log::info!(
        "Combined {} offense rows from {} archive(s)",
        rows.len(),
        archives.len()
    );

    Ok(rows)
}
