//! Extraction of yearly NIBRS zip archives.

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::IngestError;

/// One yearly NIBRS extract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveSource {
    /// Data year; also names the extraction subdirectory.
    pub year: u16,
    /// Archive file name, relative to the data directory.
    pub file: String,
    /// Path inside the archive that holds the CSV tables, when they are
    /// not at the top level (e.g. `"NY-2023/NY"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subfolder: Option<String>,
}

/// Extracts `data_dir/<file>` into `extract_dir/<year>/` and returns the
/// directory containing the NIBRS tables.
///
/// Existing files are overwritten. Entries whose paths would escape the
/// destination are skipped.
///
/// # Errors
///
/// Returns [`IngestError::Io`] if the archive is missing or files cannot be
/// written, or [`IngestError::Zip`] if the archive is corrupt.
pub fn extract_archive(
    source: &ArchiveSource,
    data_dir: &Path,
    extract_dir: &Path,
) -> Result<PathBuf, IngestError> {
    let archive_path = data_dir.join(&source.file);
    let dest = extract_dir.join(source.year.to_string());

    log::info!(
        "[{}] Extracting {} -> {}",
        source.year,
        archive_path.display(),
        dest.display()
    );

    let file = File::open(&archive_path).map_err(|e| IngestError::io(&archive_path, e))?;
    let zip_error = |err| IngestError::Zip {
        path: archive_path.display().to_string(),
        source: err,
    };
    let mut archive = zip::ZipArchive::new(file).map_err(zip_error)?;

    std::fs::create_dir_all(&dest).map_err(|e| IngestError::io(&dest, e))?;

    let mut extracted = 0u64;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(zip_error)?;

        let Some(relative) = entry.enclosed_name() else {
            log::warn!("  skipping unsafe zip entry: {}", entry.name());
            continue;
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(|e| IngestError::io(&out_path, e))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| IngestError::io(parent, e))?;
        }
        let mut out = File::create(&out_path).map_err(|e| IngestError::io(&out_path, e))?;
        std::io::copy(&mut entry, &mut out).map_err(|e| IngestError::io(&out_path, e))?;

        log::debug!("  extracted {}", out_path.display());
        extracted += 1;
    }

    log::info!("[{}] Extracted {extracted} file(s)", source.year);

    Ok(match &source.subfolder {
        Some(sub) => dest.join(sub),
        None => dest,
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut zip_writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        for (name, contents) in entries {
            zip_writer.start_file(*name, options).unwrap();
            zip_writer.write_all(contents.as_bytes()).unwrap();
        }
        zip_writer.finish().unwrap();
    }

    #[test]
    fn extracts_into_year_directory() {
        let tmp = std::env::temp_dir().join("crime_features_archive_flat");
        let _ = std::fs::remove_dir_all(&tmp);
        let data_dir = tmp.join("data");
        std::fs::create_dir_all(&data_dir).unwrap();
        write_zip(
            &data_dir.join("NY-2021.zip"),
            &[("NIBRS_incident.csv", "incident_id\n1\n")],
        );

        let source = ArchiveSource {
            year: 2021,
            file: "NY-2021.zip".to_string(),
            subfolder: None,
        };
        let dir = extract_archive(&source, &data_dir, &tmp.join("tmp_data")).unwrap();

        assert_eq!(dir, tmp.join("tmp_data").join("2021"));
        assert_eq!(
            std::fs::read_to_string(dir.join("NIBRS_incident.csv")).unwrap(),
            "incident_id\n1\n"
        );

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn resolves_nested_subfolder() {
        let tmp = std::env::temp_dir().join("crime_features_archive_nested");
        let _ = std::fs::remove_dir_all(&tmp);
        let data_dir = tmp.join("data");
        std::fs::create_dir_all(&data_dir).unwrap();
        write_zip(
            &data_dir.join("NY-2023.zip"),
            &[("NY-2023/NY/NIBRS_OFFENSE.csv", "offense_id\n")],
        );

        let source = ArchiveSource {
            year: 2023,
            file: "NY-2023.zip".to_string(),
            subfolder: Some("NY-2023/NY".to_string()),
        };
        let dir = extract_archive(&source, &data_dir, &tmp.join("out")).unwrap();

        assert!(dir.join("NIBRS_OFFENSE.csv").is_file());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_archive_is_io_error() {
        let tmp = std::env::temp_dir().join("crime_features_archive_missing");
        let source = ArchiveSource {
            year: 2022,
            file: "does-not-exist.zip".to_string(),
            subfolder: None,
        };
        let err = extract_archive(&source, &tmp, &tmp.join("out")).unwrap_err();
        assert!(matches!(err, IngestError::Io { .. }));
    }
}
