//! CLI Entry Point for cytogate
//!
//! Provides command-line access to:
//! - Inspecting an FCS file's metadata
//! - Exporting (optionally compensated) event data to CSV
//! - Discovering the distinct channel/marker mappings across many files
//!
//! # Usage
//!
//! ```bash
//! cytogate inspect sample.fcs
//! cytogate export sample.fcs --out events.csv --compensate
//! cytogate mappings data/*.fcs
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cytogate::config::AppConfig;
use cytogate::discovery;
use cytogate::fcs::FcsFile;
use cytogate::logging;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "cytogate")]
#[command(about = "FCS loading, compensation and channel mapping discovery", long_about = None)]
struct Cli {
    /// Optional TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a JSON summary of a file's metadata
    Inspect {
        /// Path to the .fcs file
        file: PathBuf,

        /// External CSV compensation matrix, overriding the embedded one
        #[arg(long)]
        comp_matrix: Option<PathBuf>,
    },

    /// Export event data to CSV with "{channel}_{marker}" columns
    Export {
        /// Path to the .fcs file
        file: PathBuf,

        /// Output CSV path
        #[arg(long)]
        out: PathBuf,

        /// External CSV compensation matrix, overriding the embedded one
        #[arg(long)]
        comp_matrix: Option<PathBuf>,

        /// Apply spillover compensation before exporting
        #[arg(long)]
        compensate: bool,
    },

    /// List the distinct channel/marker mappings across files
    Mappings {
        /// FCS files to scan
        files: Vec<PathBuf>,

        /// Keep compensation control files (name containing "comp")
        #[arg(long)]
        include_comps: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => AppConfig::load().context("loading configuration")?,
    };
    logging::init_from_config(&config).map_err(anyhow::Error::msg)?;

    match cli.command {
        Commands::Inspect { file, comp_matrix } => inspect(file, comp_matrix),
        Commands::Export {
            file,
            out,
            comp_matrix,
            compensate,
        } => export(&config, file, out, comp_matrix, compensate),
        Commands::Mappings {
            files,
            include_comps,
        } => mappings(&config, files, include_comps).await,
    }
}

fn inspect(file: PathBuf, comp_matrix: Option<PathBuf>) -> Result<()> {
    let fcs = FcsFile::open_with_compensation(&file, comp_matrix.as_ref())
        .with_context(|| format!("reading {}", file.display()))?;
    println!("{}", serde_json::to_string_pretty(&fcs.summary())?);
    Ok(())
}

fn export(
    config: &AppConfig,
    file: PathBuf,
    out: PathBuf,
    comp_matrix: Option<PathBuf>,
    compensate: bool,
) -> Result<()> {
    let mut fcs = FcsFile::open_with_compensation(&file, comp_matrix.as_ref())
        .with_context(|| format!("reading {}", file.display()))?;
    if compensate {
        fcs.compensate_with(&config.compensation.scatter_patterns)?;
    }
    fcs.dataframe()
        .write_csv(&out)
        .with_context(|| format!("writing {}", out.display()))?;
    info!(out = %out.display(), compensated = compensate, "Export complete");
    Ok(())
}

async fn mappings(config: &AppConfig, files: Vec<PathBuf>, include_comps: bool) -> Result<()> {
    let exclude_comps = config.discovery.exclude_comps && !include_comps;
    let files = discovery::filter_fcs_files(&files, exclude_comps);
    let unique = discovery::explore_channel_mappings(files, config.discovery_workers()).await?;
    println!("{}", serde_json::to_string_pretty(&unique)?);
    Ok(())
}
