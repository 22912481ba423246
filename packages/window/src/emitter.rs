//! Drives the [`WindowIndexer`] over every incident in a store.
//!
//! The store is split into contiguous chunks of its time-ordered records
//! and each chunk is counted on a scoped worker thread. Workers only read
//! the store, and chunk results are concatenated in chunk order, so the
//! output never depends on the worker count or on scheduling.

use std::ops::Range;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use crime_features_incident_models::{IncidentRecord, WindowCounts};

use crate::WindowError;
use crate::config::{FeatureConfig, FeatureWindows};
use crate::indexer::{WindowIndexer, WindowKey};
use crate::progress::ProgressCallback;
use crate::store::EventStore;

/// How many incidents a worker processes between progress updates.
const PROGRESS_BATCH: usize = 1024;

/// Builds an [`EventStore`] from `records` and returns every record with its
/// [`WindowCounts`] attached, in event time order.
///
/// # Errors
///
/// Returns [`WindowError`] if a record is invalid or the configured windows
/// are invalid.
pub fn compute_features(
    records: Vec<IncidentRecord>,
    config: &FeatureConfig,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<Vec<IncidentRecord>, WindowError> {
    let store = EventStore::build(records)?;
    annotate(store, config, progress)
}

/// Consumes a built store and returns its records with counts attached, in
/// event time order.
///
/// # Errors
///
/// Returns [`WindowError`] if the configured windows are invalid.
pub fn annotate(
    store: EventStore,
    config: &FeatureConfig,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<Vec<IncidentRecord>, WindowError> {
    let counts = compute_counts(&store, config, progress)?;

    Ok(store
        .into_records()
        .into_iter()
        .zip(counts)
        .map(|(record, counts)| record.with_counts(counts))
        .collect())
}

/// Computes the counts for every record of `store`. The result is parallel
/// to [`EventStore::records`].
///
/// # Errors
///
/// Returns [`WindowError`] if the configured windows are invalid. Windows
/// are validated before any query is issued.
pub fn compute_counts(
    store: &EventStore,
    config: &FeatureConfig,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<Vec<WindowCounts>, WindowError> {
    let windows = config.windows()?;
    let total = store.len();

    progress.set_total(total as u64);

    if store.is_empty() {
        progress.finish("No incidents to process".to_string());
        return Ok(Vec::new());
    }

    let workers = config.worker_count(total);
    let chunk_size = total.div_ceil(workers);

    log::info!(
        "Computing trailing-window counts for {total} incidents across {} locations ({workers} worker(s))",
        store.location_count()
    );

    let emitter = Emitter {
        indexer: WindowIndexer::new(store),
        records: store.records(),
        times: store.times(),
        windows,
    };
    let progress: &dyn ProgressCallback = progress.as_ref();

    let counts = if workers == 1 {
        emitter.run(0..total, progress)?
    } else {
        let ranges: Vec<Range<usize>> = (0..total)
            .step_by(chunk_size)
            .map(|start| start..(start + chunk_size).min(total))
            .collect();

        let chunks = std::thread::scope(|scope| {
            let handles: Vec<_> = ranges
                .into_iter()
                .map(|range| {
                    let emitter = &emitter;
                    scope.spawn(move || emitter.run(range, progress))
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|payload| std::panic::resume_unwind(payload))
                })
                .collect::<Vec<_>>()
        });

        let mut counts = Vec::with_capacity(total);
        for chunk in chunks {
            counts.extend(chunk?);
        }
        counts
    };

    progress.finish(format!("Computed window counts for {total} incidents"));
    log::info!("Finished window counts for {total} incidents");

    Ok(counts)
}

/// Per-pass state shared read-only by all workers.
struct Emitter<'a> {
    indexer: WindowIndexer<'a>,
    records: &'a [IncidentRecord],
    times: &'a [DateTime<Utc>],
    windows: FeatureWindows,
}

impl Emitter<'_> {
    fn run(
        &self,
        range: Range<usize>,
        progress: &dyn ProgressCallback,
    ) -> Result<Vec<WindowCounts>, WindowError> {
        let mut out = Vec::with_capacity(range.len());
        let mut pending = 0;

        for i in range {
            out.push(self.counts_for(self.times[i], &self.records[i])?);

            pending += 1;
            if pending == PROGRESS_BATCH {
                progress.inc(pending as u64);
                pending = 0;
            }
        }
        progress.inc(pending as u64);

        Ok(out)
    }

    fn counts_for(
        &self,
        anchor: DateTime<Utc>,
        record: &IncidentRecord,
    ) -> Result<WindowCounts, WindowError> {
        let location = WindowKey::Location(&record.location_id);

        Ok(WindowCounts {
            count_7d_location: self
                .indexer
                .count(anchor, self.windows.location_short, location)?,
            count_30d_location: self
                .indexer
                .count(anchor, self.windows.location_long, location)?,
            count_30d_hour: match record.hour_of_day {
                Some(hour) => self
                    .indexer
                    .count(anchor, self.windows.hour, WindowKey::Hour(hour))?,
                None => 0,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicU64, Ordering};

    use chrono::TimeZone as _;
    use crime_features_crime_models::CrimeGroup;

    use super::*;
    use crate::progress::null_progress;

    fn jan(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 1, d, 0, 0, 0).unwrap()
    }

    fn record(id: &str, time: DateTime<Utc>, location: &str, hour: u8) -> IncidentRecord {
        IncidentRecord::new(id, time, location, hour, CrimeGroup::Other)
    }

    fn by_id(records: &[IncidentRecord]) -> BTreeMap<String, WindowCounts> {
        records
            .iter()
            .map(|r| (r.incident_id.clone(), r.counts))
            .collect()
    }

    #[test]
    fn computes_counts_for_same_day_incidents() {
        let records = vec![
            record("a", jan(1), "L1", 9),
            record("b", jan(1), "L1", 9),
            record("c", jan(5), "L1", 9),
            record("d", jan(5), "L1", 14),
        ];

        let out = compute_features(records, &FeatureConfig::default(), &null_progress()).unwrap();
        let counts = by_id(&out);

        assert_eq!(counts["c"].count_7d_location, 2);
        assert_eq!(counts["c"].count_30d_location, 2);
        assert_eq!(counts["c"].count_30d_hour, 2);
        assert_eq!(counts["d"].count_7d_location, 2);
        assert_eq!(counts["d"].count_30d_hour, 0);
        assert_eq!(counts["a"], WindowCounts::default());
        assert_eq!(counts["b"], WindowCounts::default());
    }

    #[test]
    fn incidents_without_hour_still_count_toward_location() {
        let mut hourless = record("a", jan(1), "L1", 0);
        hourless.hour_of_day = None;
        let records = vec![hourless, record("b", jan(1), "L1", 9), record("c", jan(5), "L1", 9)];

        let out = compute_features(records, &FeatureConfig::default(), &null_progress()).unwrap();
        let counts = by_id(&out);

        assert_eq!(counts["c"].count_7d_location, 2);
        assert_eq!(counts["c"].count_30d_location, 2);
        assert_eq!(counts["c"].count_30d_hour, 1);

        let mut late = record("z", jan(6), "L1", 0);
        late.hour_of_day = None;
        let out = compute_features(
            vec![record("x", jan(2), "L1", 0), late],
            &FeatureConfig::default(),
            &null_progress(),
        )
        .unwrap();
        let counts = by_id(&out);
        assert_eq!(counts["z"].count_7d_location, 1);
        assert_eq!(counts["z"].count_30d_hour, 0);
    }

    #[test]
    fn never_counts_itself_or_simultaneous_duplicates() {
        let records = (0..5)
            .map(|i| record(&i.to_string(), jan(3), "L1", 4))
            .collect();

        let out = compute_features(records, &FeatureConfig::default(), &null_progress()).unwrap();

        assert!(out.iter().all(|r| r.counts == WindowCounts::default()));
    }

    #[test]
    fn short_window_never_exceeds_long_window() {
        let records = (1..=31)
            .flat_map(|d| {
                [
                    record(&format!("x{d}"), jan(d), "L1", 1),
                    record(&format!("y{d}"), jan(d), if d % 3 == 0 { "L2" } else { "L1" }, 2),
                ]
            })
            .collect();

        let out = compute_features(records, &FeatureConfig::default(), &null_progress()).unwrap();

        for r in &out {
            assert!(r.counts.count_7d_location <= r.counts.count_30d_location);
        }
        let counts = by_id(&out);
        // Jan 31 at L1: Jan 24..=30 in the short window, Jan 1..=30 in the
        // long one, two L1 incidents per day except on multiples of three.
        assert_eq!(counts["x31"].count_7d_location, 7 + 4);
        assert_eq!(counts["x31"].count_30d_location, 30 + 20);
        assert_eq!(counts["x31"].count_30d_hour, 30);
    }

    #[test]
    fn result_independent_of_input_order_and_workers() {
        let records: Vec<IncidentRecord> = (0..200u32)
            .map(|i| {
                let time = jan(1) + chrono::TimeDelta::hours(i64::from(i * 7 % 900));
                record(
                    &format!("r{i}"),
                    time,
                    ["L1", "L2", "L3"][(i % 3) as usize],
                    u8::try_from(i % 24).unwrap(),
                )
            })
            .collect();

        let sequential = FeatureConfig {
            workers: Some(1),
            ..FeatureConfig::default()
        };
        let parallel = FeatureConfig {
            workers: Some(4),
            min_records_per_worker: 10,
            ..FeatureConfig::default()
        };

        let mut reversed = records.clone();
        reversed.reverse();
        let mut rotated = records.clone();
        rotated.rotate_left(77);

        let baseline = by_id(&compute_features(records, &sequential, &null_progress()).unwrap());
        let from_reversed =
            by_id(&compute_features(reversed, &parallel, &null_progress()).unwrap());
        let from_rotated = by_id(&compute_features(rotated, &parallel, &null_progress()).unwrap());

        assert_eq!(baseline.len(), 200);
        assert_eq!(baseline, from_reversed);
        assert_eq!(baseline, from_rotated);
    }

    #[test]
    fn empty_input_is_not_an_error() {
        let out =
            compute_features(Vec::new(), &FeatureConfig::default(), &null_progress()).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn invalid_config_is_rejected_before_counting() {
        let config = FeatureConfig {
            location_long_window_days: 0,
            ..FeatureConfig::default()
        };
        let err = compute_features(vec![record("a", jan(1), "L1", 0)], &config, &null_progress())
            .unwrap_err();
        assert!(matches!(err, WindowError::InvalidWindow { .. }));
    }

    struct CountingProgress {
        total: AtomicU64,
        done: AtomicU64,
    }

    impl ProgressCallback for CountingProgress {
        fn set_total(&self, total: u64) {
            self.total.store(total, Ordering::SeqCst);
        }
        fn inc(&self, delta: u64) {
            self.done.fetch_add(delta, Ordering::SeqCst);
        }
        fn finish(&self, _msg: String) {}
    }

    #[test]
    fn reports_progress_for_every_incident() {
        let progress = Arc::new(CountingProgress {
            total: AtomicU64::new(0),
            done: AtomicU64::new(0),
        });
        let shared: Arc<dyn ProgressCallback> = progress.clone();

        let records = (0..3000u32)
            .map(|i| record(&i.to_string(), jan(1 + i % 28), "L1", 0))
            .collect();
        let config = FeatureConfig {
            workers: Some(3),
            min_records_per_worker: 100,
            ..FeatureConfig::default()
        };

        compute_features(records, &config, &shared).unwrap();

        assert_eq!(progress.total.load(Ordering::SeqCst), 3000);
        assert_eq!(progress.done.load(Ordering::SeqCst), 3000);
    }
}
