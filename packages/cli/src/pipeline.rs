//! The two pipeline stages, clean and features, wired to files and
//! progress bars.
//!
//! Each stage takes its input explicitly and returns its output. `run`
//! chains them without re-reading the cleaned file.

use std::path::Path;
use std::time::Instant;

use crime_features_cli_utils::{IndicatifProgress, MultiProgress};
use crime_features_incident_models::IncidentRecord;
use crime_features_ingest::csv_io::{self, FeatureRow};
use crime_features_ingest::{IngestError, clean};
use crime_features_window::{EventStore, FeatureConfig, WindowError, annotate};

use crate::config::{ConfigError, PipelineConfig};

/// Number of feature rows logged after the feature stage.
const SAMPLE_ROWS: usize = 5;

/// Errors surfaced by the `crime_features` binary.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Extraction, loading or CSV persistence failed.
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// The feature engine rejected its input.
    #[error(transparent)]
    Window(#[from] WindowError),

    /// The effective configuration could not be rendered as TOML.
    #[error("Failed to render config: {0}")]
    Render(#[from] toml::ser::Error),
}

/// Extracts, loads and cleans every configured archive, optionally
/// subsamples, then writes the cleaned records to `output`.
///
/// # Errors
///
/// Returns [`PipelineError::Ingest`] if any archive or table cannot be
/// processed, or the output cannot be written.
pub fn clean_stage(
    config: &PipelineConfig,
    output: &Path,
) -> Result<Vec<IncidentRecord>, PipelineError> {
    let start = Instant::now();

    if config.archives.is_empty() {
        log::warn!("No archives configured; the cleaned file will be empty");
    }

    let rows = crime_features_ingest::load_archives(
        &config.data_dir,
        &config.extract_dir,
        &config.archives,
    )?;
    let outcome = clean::clean(rows);
    let dropped = outcome.dropped.total();
    let records = match config.sample {
        Some(sample) => clean::sample(outcome.records, sample.fraction, sample.seed)?,
        None => outcome.records,
    };
    csv_io::write_cleaned(output, &records)?;

    log::info!(
        "Clean stage complete: {} records ({dropped} dropped) in {:.1}s",
        records.len(),
        start.elapsed().as_secs_f64()
    );

    Ok(records)
}

/// Computes trailing-window counts for `records` and writes the feature
/// table to `output`.
///
/// # Errors
///
/// Returns [`PipelineError::Window`] if a record or window is invalid, or
/// [`PipelineError::Ingest`] if the output cannot be written.
pub fn features_stage(
    records: Vec<IncidentRecord>,
    config: &FeatureConfig,
    output: &Path,
    multi: &MultiProgress,
) -> Result<Vec<IncidentRecord>, PipelineError> {
    let start = Instant::now();

    let store = EventStore::build(records)?;
    log::info!(
        "Indexed {} incidents across {} locations",
        store.len(),
        store.location_count()
    );

    let progress = IndicatifProgress::attach(multi, "Computing trailing-window counts");
    let annotated = annotate(store, config, &progress)?;

    csv_io::write_features(output, &annotated)?;
    log_sample(&annotated);

    log::info!(
        "Feature stage complete: {} rows in {:.1}s",
        annotated.len(),
        start.elapsed().as_secs_f64()
    );

    Ok(annotated)
}

/// Logs the first few feature rows as JSON.
fn log_sample(records: &[IncidentRecord]) {
    for record in records.iter().take(SAMPLE_ROWS) {
        let Ok(row) = FeatureRow::from_record(record) else {
            continue;
        };
        match serde_json::to_string(&row) {
            Ok(json) => log::info!("  {json}"),
            Err(e) => log::debug!("Could not render sample row: {e}"),
        }
    }
}
