#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the crime feature pipeline.
//!
//! Uses `indicatif-log-bridge` (via
//! [`crime_features_cli_utils::init_logger`]) so that log lines and the
//! feature progress bar never fight for the terminal. `RUST_LOG` controls
//! verbosity.

mod config;
mod pipeline;

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand};
use crime_features_cli_utils::MultiProgress;
use crime_features_ingest::csv_io;

use crate::config::PipelineConfig;
use crate::pipeline::PipelineError;

#[derive(Parser)]
#[command(
    name = "crime_features",
    about = "Trailing-window crime features from NIBRS extracts"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract, join and clean the configured archives into a CSV
    Clean {
        /// Pipeline config (TOML). Defaults to the built-in NY 2021-2023 config.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Cleaned CSV to write. Defaults to `[output].cleaned`.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Compute trailing-window features for a cleaned CSV
    Features {
        /// Cleaned CSV produced by `clean`
        #[arg(long)]
        input: PathBuf,
        /// Feature table to write. Defaults to `[output].features`.
        #[arg(long)]
        output: Option<PathBuf>,
        /// Pipeline config (TOML) to take `[features]` from
        #[arg(long)]
        config: Option<PathBuf>,
        /// Number of worker threads (overrides `[features].workers`)
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Run clean and features back to back
    Run {
        /// Pipeline config (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Number of worker threads (overrides `[features].workers`)
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Print the effective configuration as TOML
    Config {
        /// Pipeline config (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = crime_features_cli_utils::init_logger();
    let cli = Cli::parse();

    let start = Instant::now();
    execute(cli.command, &multi)?;
    log::debug!("Done in {:.1}s", start.elapsed().as_secs_f64());

    Ok(())
}

fn load_config(
    path: Option<&Path>,
    workers: Option<usize>,
) -> Result<PipelineConfig, PipelineError> {
    let mut config = PipelineConfig::load(path)?;
    if workers.is_some() {
        config.features.workers = workers;
    }
    Ok(config)
}

fn execute(command: Commands, multi: &MultiProgress) -> Result<(), PipelineError> {
    match command {
        Commands::Clean { config, output } => {
            let config = load_config(config.as_deref(), None)?;
            let output = output.unwrap_or_else(|| config.output.cleaned.clone());
            pipeline::clean_stage(&config, &output)?;
        }
        Commands::Features {
            input,
            output,
            config,
            workers,
        } => {
            let config = load_config(config.as_deref(), workers)?;
            let output = output.unwrap_or_else(|| config.output.features.clone());
            let records = csv_io::read_cleaned(&input)?;
            pipeline::features_stage(records, &config.features, &output, multi)?;
        }
        Commands::Run { config, workers } => {
            let config = load_config(config.as_deref(), workers)?;
            let records = pipeline::clean_stage(&config, &config.output.cleaned)?;
            pipeline::features_stage(records, &config.features, &config.output.features, multi)?;
        }
        Commands::Config { config } => {
            let config = load_config(config.as_deref(), None)?;
            print!("{}", config.to_toml_string()?);
        }
    }

    Ok(())
}
