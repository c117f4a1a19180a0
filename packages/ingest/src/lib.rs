#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Boundary and point event loading.
//!
//! Reads the observation window from `GeoJSON` and point events from CSV,
//! filters events by region code and year range, and maps years onto the
//! contiguous 1-based time slices the grid indexer counts over. Runs can be
//! described by TOML [`study::StudyDefinition`] files.

pub mod boundary;
pub mod events;
pub mod study;

use lgcp_grid::BoundaryRegion;

use crate::events::TimedEvents;
use crate::study::StudyDefinition;

/// Errors that can occur while loading inputs.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// I/O error reading an input file.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// CSV parsing error.
    #[error("CSV error in {path}: {source}")]
    Csv {
        /// Path or label of the CSV input.
        path: String,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// `GeoJSON` parsing or conversion failed.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// Study definition TOML failed to parse.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A configured column is not in the CSV header.
    #[error("Column '{column}' not found in CSV header")]
    MissingColumn {
        /// The missing column name.
        column: String,
    },

    /// The boundary document has no polygon geometry.
    #[error("Boundary contains no polygon geometry")]
    NoPolygons,

    /// No events to derive a time window from.
    #[error("No events to derive a time window from")]
    NoEvents,

    /// Year range with `first > last`.
    #[error("Invalid year range {first}-{last}")]
    InvalidYearRange {
        /// First year.
        first: i32,
        /// Last year.
        last: i32,
    },

    /// Inconsistent configuration.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },
}

/// Everything a study needs to be indexed.
pub struct StudyInputs {
    pub boundary: BoundaryRegion,
    pub events: TimedEvents,
}

/// Loads the boundary and time-sliced events a study describes.
///
/// # Errors
///
/// Returns an error if either input cannot be loaded.
pub fn load_study_inputs(study: &StudyDefinition) -> Result<StudyInputs, IngestError> {
    log::info!("Loading inputs for study '{}'", study.display_name());

    let boundary = boundary::load_boundary(&study.boundary)?;
    let raw = events::load_events(&study.events, &study.columns, &study.filter())?;
    let events = events::assign_slices(&raw, study.years)?;

    Ok(StudyInputs { boundary, events })
}
