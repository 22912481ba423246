//! Pipeline configuration loaded from TOML.
//!
//! A default configuration covering the New York 2021-2023 extracts is
//! embedded at compile time via [`include_str!`]; `--config` replaces it
//! with a file on disk.

use std::path::{Path, PathBuf};

use crime_features_ingest::archive::ArchiveSource;
use crime_features_window::FeatureConfig;
use serde::{Deserialize, Serialize};

/// The embedded default configuration.
const DEFAULT_CONFIG: &str = include_str!("../pipeline.toml");

/// Errors that can occur while loading a pipeline configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config {path}: {source}")]
    Io {
        /// Path of the config file.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The config is not valid TOML or does not match the schema.
    #[error("Failed to parse config {path}: {source}")]
    Parse {
        /// Path of the config file, or `<embedded>`.
        path: String,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory holding the yearly zip archives.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Directory archives are extracted into, one subdirectory per year.
    #[serde(default = "default_extract_dir")]
    pub extract_dir: PathBuf,
    /// Archives to ingest, in order.
    #[serde(default)]
    pub archives: Vec<ArchiveSource>,
    /// Random subsample of the cleaned records. Absent means keep all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample: Option<SampleConfig>,
    /// Trailing-window settings.
    #[serde(default)]
    pub features: FeatureConfig,
    /// Output file names.
    #[serde(default)]
    pub output: OutputConfig,
}

/// `[sample]`: keep a seeded random fraction of the cleaned records.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleConfig {
    /// Fraction to keep, in `(0, 1]`.
    pub fraction: f64,
    /// RNG seed.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

const fn default_seed() -> u64 {
    42
}

/// Where `run` writes its files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Cleaned records CSV.
    pub cleaned: PathBuf,
    /// Feature table CSV.
    pub features: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            cleaned: PathBuf::from("cleaned_data.csv"),
            features: PathBuf::from("crime_smart_features.csv"),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_extract_dir() -> PathBuf {
    PathBuf::from("tmp_data")
}

impl PipelineConfig {
    /// Loads the config at `path`, or the embedded default when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Self::embedded();
        };

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&contents, &path.display().to_string())?;

        log::info!(
            "Loaded config from {} ({} archive(s))",
            path.display(),
            config.archives.len()
        );

        Ok(config)
    }

    /// Parses the embedded default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the embedded TOML is malformed.
    pub fn embedded() -> Result<Self, ConfigError> {
        Self::from_toml_str(DEFAULT_CONFIG, "<embedded>")
    }

    /// Parses a TOML string. `origin` names the source in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the TOML is malformed.
    pub fn from_toml_str(contents: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::de::from_str(contents).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })
    }

    /// Renders the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`toml::ser::Error`] if a value cannot be represented.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
