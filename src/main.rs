//! # GHG Factors CLI (`ghgf`)
//!
//! The `ghgf` binary drives the conversion-factor pipeline: downloading the
//! published workbook, extracting it into the dataset artifact, querying
//! the artifact, and serving the HTTP API.
//!
//! ## Usage
//!
//! ```bash
//! ghgf --config ./config/ghgf.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ghgf fetch` | Download the published flat-file workbook |
//! | `ghgf parse` | Extract the workbook into the dataset artifact |
//! | `ghgf summary` | Print dataset statistics from the artifact |
//! | `ghgf search` | Filter factors by criteria and print matches |
//! | `ghgf get <id>` | Print one conversion factor by id |
//! | `ghgf serve` | Start the read-only HTTP API |
//!
//! ## Examples
//!
//! ```bash
//! # Full refresh of the artifact from the published source
//! ghgf fetch --config ./config/ghgf.toml
//! ghgf parse --config ./config/ghgf.toml
//!
//! # Find diesel factors priced per litre
//! ghgf search diesel --activity-unit litres
//!
//! # Serve the API
//! ghgf serve --config ./config/ghgf.toml
//! ```

mod config;
mod dataset;
mod extract;
mod fetch;
mod get;
mod models;
mod search;
mod server;
mod workbook;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::search::SearchCriteria;

/// GHG Factors CLI — parse and serve UK Government greenhouse-gas
/// conversion factors.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/ghgf.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "ghgf",
    about = "GHG Factors — a parse-and-serve pipeline for UK Government greenhouse-gas conversion factors",
    version,
    long_about = "GHG Factors ingests the UK Government's published conversion-factor \
    spreadsheet into a structured JSON dataset artifact, and exposes that artifact through \
    a CLI and a read-only HTTP API."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/ghgf.toml`. Source, artifact, and server
    /// settings are read from this file.
    #[arg(long, global = true, default_value = "./config/ghgf.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Download the published workbook to the configured local path.
    ///
    /// Fetches `[source].url` into `[source].workbook`, creating parent
    /// directories as needed.
    Fetch,

    /// Extract the workbook into the dataset artifact.
    ///
    /// Reads the configured sheet, maps each data row into a factor record
    /// (skipping malformed rows with a warning), aggregates dataset
    /// statistics, and writes the JSON artifact. The artifact is only
    /// written when the whole run succeeds.
    Parse,

    /// Print dataset statistics from an existing artifact.
    ///
    /// Shows the total factor count, the top categories, and the per-scope
    /// counts.
    Summary,

    /// Filter conversion factors and print matches.
    ///
    /// All given criteria must hold; text criteria are case-insensitive
    /// substring matches.
    Search {
        /// Free-text term matched against tags and category names.
        term: Option<String>,

        /// Filter by emission scope (e.g. "Scope 1").
        #[arg(long)]
        scope: Option<String>,

        /// Filter by top-level category (e.g. "Fuels").
        #[arg(long)]
        category: Option<String>,

        /// Filter by activity unit (e.g. "kWh", "litres").
        #[arg(long)]
        activity_unit: Option<String>,

        /// Filter by emission unit (e.g. "kg CO2e").
        #[arg(long)]
        emission_unit: Option<String>,

        /// Inclusive lower bound on the conversion factor.
        #[arg(long)]
        min_factor: Option<f64>,

        /// Inclusive upper bound on the conversion factor.
        #[arg(long)]
        max_factor: Option<f64>,

        /// Maximum number of matches to print.
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Print one conversion factor by id.
    Get {
        /// Factor id as published in the source sheet (e.g. "1.1").
        id: String,
    },

    /// Start the read-only HTTP API.
    ///
    /// Loads the dataset artifact once and binds to `[server].bind`. Fails
    /// at startup when the artifact is missing or unreadable.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Fetch => {
            fetch::run_fetch(&cfg).await?;
        }
        Commands::Parse => {
            extract::run_parse(&cfg)?;
        }
        Commands::Summary => {
            extract::run_summary(&cfg)?;
        }
        Commands::Search {
            term,
            scope,
            category,
            activity_unit,
            emission_unit,
            min_factor,
            max_factor,
            limit,
        } => {
            let criteria = SearchCriteria {
                scope,
                category_level1: category,
                activity_unit,
                emission_unit,
                search_term: term,
                min_factor,
                max_factor,
                ..Default::default()
            };
            search::run_search(&cfg, &criteria, limit)?;
        }
        Commands::Get { id } => {
            get::run_get(&cfg, &id)?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
