//! Loading and joining the NIBRS incident, offense and offense type tables.
//!
//! Column and file names vary in case between extract years, so both are
//! matched case-insensitively.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::IngestError;

const INCIDENT_TABLE: &str = "NIBRS_incident.csv";
const OFFENSE_TABLE: &str = "NIBRS_OFFENSE.csv";
const OFFENSE_TYPE_TABLE: &str = "NIBRS_OFFENSE_TYPE.csv";

/// One offense joined with its incident and offense type.
///
/// Values are kept as raw strings; parsing and validation happen in
/// [`crate::clean`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffenseRow {
    /// Incident the offense belongs to.
    pub incident_id: String,
    /// Raw `incident_date` of the incident.
    pub incident_date: String,
    /// Raw `incident_hour` of the incident. Often empty.
    pub incident_hour: String,
    /// NIBRS location type of the offense.
    pub location_id: String,
    /// NIBRS offense code (e.g. `"23H"`).
    pub offense_code: String,
    /// Category name from the offense type table; `None` for codes missing
    /// from it.
    pub offense_category_name: Option<String>,
}

struct IncidentFields {
    date: String,
    hour: String,
}

/// Loads one year's tables from `dir` and joins them.
///
/// Offenses are inner-joined to incidents on `incident_id` (offenses of
/// unknown incidents are dropped) and left-joined to offense types on
/// `offense_code`. One row is returned per offense, in offense table order.
///
/// # Errors
///
/// Returns [`IngestError`] if a table is missing, unreadable, or lacks a
/// required column.
pub fn load_year(dir: &Path) -> Result<Vec<OffenseRow>, IngestError> {
    let incidents = load_incidents(&find_table(dir, INCIDENT_TABLE)?)?;
    let categories = load_offense_types(&find_table(dir, OFFENSE_TYPE_TABLE)?)?;

    let offense_path = find_table(dir, OFFENSE_TABLE)?;
    let mut reader = open(&offense_path)?;
    let columns = Columns::new(&mut reader, &offense_path)?;
    let incident_col = columns.require("incident_id")?;
    let code_col = columns.require("offense_code")?;
    let location_col = columns.require("location_id")?;

    let mut rows = Vec::new();
    let mut orphaned = 0u64;

    for record in reader.records() {
        let record = record?;
        let incident_id = field(&record, incident_col);

        let Some(incident) = incidents.get(incident_id) else {
            orphaned += 1;
            continue;
        };
        let offense_code = field(&record, code_col);

        rows.push(OffenseRow {
            incident_id: incident_id.to_string(),
            incident_date: incident.date.clone(),
            incident_hour: incident.hour.clone(),
            location_id: field(&record, location_col).to_string(),
            offense_code: offense_code.to_string(),
            offense_category_name: categories.get(offense_code).cloned(),
        });
    }

    if orphaned > 0 {
        log::warn!(
            "{}: dropped {orphaned} offense(s) with no matching incident",
            offense_path.display()
        );
    }
    log::debug!(
        "{}: {} incidents, {} offense rows",
        dir.display(),
        incidents.len(),
        rows.len()
    );

    Ok(rows)
}

/// Loads and concatenates several years of already-extracted tables.
///
/// # Errors
///
/// Returns the first [`IngestError`] encountered.
pub fn load_years(dirs: &[PathBuf]) -> Result<Vec<OffenseRow>, IngestError> {
    let mut rows = Vec::new();
    for dir in dirs {
        let year_rows = load_year(dir)?;
        log::info!("{}: loaded {} offense rows", dir.display(), year_rows.len());
        rows.extend(year_rows);
    }
    Ok(rows)
}

fn load_incidents(path: &Path) -> Result<BTreeMap<String, IncidentFields>, IngestError> {
    let mut reader = open(path)?;
    let columns = Columns::new(&mut reader, path)?;
    let id_col = columns.require("incident_id")?;
    let date_col = columns.require("incident_date")?;
    let hour_col = columns.require("incident_hour")?;

    let mut incidents = BTreeMap::new();
    for record in reader.records() {
        let record = record?;
        incidents.insert(
            field(&record, id_col).to_string(),
            IncidentFields {
                date: field(&record, date_col).to_string(),
                hour: field(&record, hour_col).to_string(),
            },
        );
    }

    Ok(incidents)
}

fn load_offense_types(path: &Path) -> Result<BTreeMap<String, String>, IngestError> {
    let mut reader = open(path)?;
    let columns = Columns::new(&mut reader, path)?;
    let code_col = columns.require("offense_code")?;
    let category_col = columns.require("offense_category_name")?;

    let mut categories = BTreeMap::new();
    for record in reader.records() {
        let record = record?;
        let category = field(&record, category_col);
        if !category.is_empty() {
            categories.insert(field(&record, code_col).to_string(), category.to_string());
        }
    }

    Ok(categories)
}

/// Finds `name` in `dir`, ignoring case.
fn find_table(dir: &Path, name: &str) -> Result<PathBuf, IngestError> {
    let entries = std::fs::read_dir(dir).map_err(|e| IngestError::io(dir, e))?;

    for entry in entries {
        let entry = entry.map_err(|e| IngestError::io(dir, e))?;
        if entry.file_name().to_string_lossy().eq_ignore_ascii_case(name) {
            return Ok(entry.path());
        }
    }

    Err(IngestError::MissingTable {
        file: name.to_string(),
        dir: dir.display().to_string(),
    })
}

fn open(path: &Path) -> Result<csv::Reader<std::fs::File>, IngestError> {
    Ok(csv::ReaderBuilder::new().flexible(true).from_path(path)?)
}

fn field<'a>(record: &'a csv::StringRecord, index: usize) -> &'a str {
    record.get(index).map_or("", str::trim)
}

/// Header name → column index, keyed by lowercase name.
struct Columns {
    file: String,
    by_name: BTreeMap<String, usize>,
}

impl Columns {
    fn new(reader: &mut csv::Reader<std::fs::File>, path: &Path) -> Result<Self, IngestError> {
        let by_name = reader
            .headers()?
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim().to_ascii_lowercase(), i))
            .collect();

        Ok(Self {
            file: path
                .file_name()
                .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned()),
            by_name,
        })
    }

    fn require(&self, column: &str) -> Result<usize, IngestError> {
        self.by_name
            .get(column)
            .copied()
            .ok_or_else(|| IngestError::MissingColumn {
                file: self.file.clone(),
                column: column.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_tables(dir: &Path, incident: &str, offense: &str, offense_type: &str) {
        let _ = std::fs::remove_dir_all(dir);
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join("NIBRS_incident.csv"), incident).unwrap();
        std::fs::write(dir.join("NIBRS_OFFENSE.csv"), offense).unwrap();
        std::fs::write(dir.join("nibrs_offense_type.csv"), offense_type).unwrap();
    }

    #[test]
    fn joins_offenses_with_incidents_and_types() {
        let dir = std::env::temp_dir().join("crime_features_nibrs_join");
        write_tables(
            &dir,
            "data_year,incident_id,incident_date,incident_hour\n\
             2021,100,2021-01-05,9\n\
             2021,200,2021-01-06,\n",
            "offense_id,incident_id,offense_code,location_id\n\
             1,100,13A,20\n\
             2,100,23H,20\n\
             3,200,999,13\n\
             4,300,13A,5\n",
            "OFFENSE_CODE,OFFENSE_NAME,OFFENSE_CATEGORY_NAME\n\
             13A,Aggravated Assault,Assault Offenses\n\
             23H,All Other Larceny,Larceny/Theft Offenses\n",
        );

        let rows = load_year(&dir).unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(
            rows[0],
            OffenseRow {
                incident_id: "100".to_string(),
                incident_date: "2021-01-05".to_string(),
                incident_hour: "9".to_string(),
                location_id: "20".to_string(),
                offense_code: "13A".to_string(),
                offense_category_name: Some("Assault Offenses".to_string()),
            }
        );
        assert_eq!(
            rows[1].offense_category_name.as_deref(),
            Some("Larceny/Theft Offenses")
        );
        // Unknown offense code: left join keeps the row.
        assert_eq!(rows[2].incident_id, "200");
        assert_eq!(rows[2].incident_hour, "");
        assert_eq!(rows[2].offense_category_name, None);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_column_is_reported() {
        let dir = std::env::temp_dir().join("crime_features_nibrs_missing_column");
        write_tables(
            &dir,
            "incident_id,incident_date\n1,2021-01-01\n",
            "incident_id,offense_code,location_id\n",
            "offense_code,offense_category_name\n",
        );

        let err = load_year(&dir).unwrap_err();
        match err {
            IngestError::MissingColumn { file, column } => {
                assert_eq!(file, "NIBRS_incident.csv");
                assert_eq!(column, "incident_hour");
            }
            other => panic!("unexpected error: {other}"),
        }

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_table_is_reported() {
        let dir = std::env::temp_dir().join("crime_features_nibrs_missing_table");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        let err = load_year(&dir).unwrap_err();
        assert!(matches!(err, IngestError::MissingTable { .. }));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn concatenates_years() {
        let a = std::env::temp_dir().join("crime_features_nibrs_year_a");
        let b = std::env::temp_dir().join("crime_features_nibrs_year_b");
        for (dir, id) in [(&a, "1"), (&b, "2")] {
            write_tables(
                dir,
                &format!("incident_id,incident_date,incident_hour\n{id},2022-02-02,3\n"),
                &format!("incident_id,offense_code,location_id\n{id},35A,1\n"),
                "offense_code,offense_category_name\n35A,Drug/Narcotic Offenses\n",
            );
        }

        let rows = load_years(&[a.clone(), b.clone()]).unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.incident_id.as_str()).collect();
        assert_eq!(ids, ["1", "2"]);

        let _ = std::fs::remove_dir_all(&a);
        let _ = std::fs::remove_dir_all(&b);
    }
}
