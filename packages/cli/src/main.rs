#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for LGCP grid discretization.
//!
//! Builds a square-cell grid over a `GeoJSON` boundary, counts CSV point
//! events per cell per year, and writes the time-stacked count table,
//! grid dimensions, and cell geometry for downstream model fitting.
//!
//! Logging goes through [`lgcp_grid_cli_utils::init_logger`]; set
//! `RUST_LOG=info` (or `debug` for per-slice detail) to see it.

mod pipeline;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use lgcp_grid_generate::{Output, parse_outputs};
use lgcp_grid_ingest::boundary::load_boundary;
use lgcp_grid_ingest::events::{EventColumns, EventFilter, YearRange, assign_slices, load_events};
use lgcp_grid_ingest::{load_study_inputs, study::load_study};

use crate::pipeline::IndexRun;

#[derive(Parser)]
#[command(name = "lgcp_grid", about = "Grid discretization for point-pattern count models")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the grid over a boundary and write its cells and dimensions
    Grid {
        /// `GeoJSON` boundary file
        #[arg(long)]
        boundary: PathBuf,
        /// Cell side length, in boundary coordinate units
        #[arg(long)]
        resolution: f64,
        /// Prefix for output file names
        #[arg(long, default_value = "grid")]
        id: String,
        /// Output directory
        #[arg(long, default_value = "data/generated")]
        output: PathBuf,
    },
    /// Count events per cell per year and write the stacked table
    Index {
        /// `GeoJSON` boundary file
        #[arg(long)]
        boundary: PathBuf,
        /// CSV event file
        #[arg(long)]
        events: PathBuf,
        /// Cell side length, in boundary coordinate units
        #[arg(long)]
        resolution: f64,
        /// Prefix for output file names
        #[arg(long, default_value = "index")]
        id: String,
        #[command(flatten)]
        columns: ColumnArgs,
        /// Keep only events with this region code
        #[arg(long)]
        region: Option<String>,
        /// Inclusive year range (e.g., "2010-2015"); the first year is slice 1
        #[arg(long)]
        years: Option<String>,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Run a study described by a TOML file
    Run {
        /// Study definition file
        study: PathBuf,
        #[command(flatten)]
        run: RunArgs,
    },
}

#[derive(Args)]
struct ColumnArgs {
    /// Column holding the x coordinate
    #[arg(long, default_value = "x")]
    x_column: String,
    /// Column holding the y coordinate
    #[arg(long, default_value = "y")]
    y_column: String,
    /// Column holding the integer year
    #[arg(long, conflicts_with = "date_column")]
    year_column: Option<String>,
    /// Column holding a date the year is taken from
    #[arg(long)]
    date_column: Option<String>,
    /// Column holding the region code
    #[arg(long)]
    region_column: Option<String>,
}

impl ColumnArgs {
    fn into_columns(self) -> EventColumns {
        let year = if self.year_column.is_none() && self.date_column.is_none() {
            Some("year".to_string())
        } else {
            self.year_column
        };
        EventColumns {
            x: self.x_column,
            y: self.y_column,
            year,
            date: self.date_column,
            region: self.region_column,
        }
    }
}

#[derive(Args)]
struct RunArgs {
    /// Comma-separated outputs: observations, dimensions, cells
    #[arg(long, default_value = "observations,dimensions,cells")]
    outputs: String,
    /// Count time slices one after another instead of in parallel
    #[arg(long)]
    sequential: bool,
    /// Output directory (overrides the study's `output_dir`)
    #[arg(long)]
    output: Option<PathBuf>,
}

impl RunArgs {
    fn outputs(&self) -> Result<Vec<Output>, Box<dyn std::error::Error>> {
        Ok(parse_outputs(&self.outputs)?)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = lgcp_grid_cli_utils::init_logger();
    let cli = Cli::parse();

    let written = match cli.command {
        Commands::Grid {
            boundary,
            resolution,
            id,
            output,
        } => {
            let boundary = load_boundary(&boundary)?;
            pipeline::run_grid(&id, &boundary, resolution, &output)?
        }
        Commands::Index {
            boundary,
            events,
            resolution,
            id,
            columns,
            region,
            years,
            run,
        } => {
            let years = years.as_deref().map(str::parse::<YearRange>).transpose()?;
            let filter = EventFilter { region, years };

            let boundary = load_boundary(&boundary)?;
            let raw = load_events(&events, &columns.into_columns(), &filter)?;
            let events = assign_slices(&raw, years)?;

            let index_run = IndexRun {
                id,
                boundary,
                events,
                resolution,
                output_dir: run
                    .output
                    .clone()
                    .unwrap_or_else(|| PathBuf::from("data/generated")),
                outputs: run.outputs()?,
                sequential: run.sequential,
            };
            pipeline::run_index(index_run, &multi).await?
        }
        Commands::Run { study, run } => {
            let study = load_study(&study)?;
            let inputs = load_study_inputs(&study)?;

            let index_run = IndexRun {
                id: study.id.clone(),
                boundary: inputs.boundary,
                events: inputs.events,
                resolution: study.resolution,
                output_dir: run.output.clone().unwrap_or(study.output_dir),
                outputs: run.outputs()?,
                sequential: run.sequential,
            };
            pipeline::run_index(index_run, &multi).await?
        }
    };

    for path in &written {
        println!("{}", path.display());
    }

    Ok(())
}
