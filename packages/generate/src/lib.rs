#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Output writers for grid indexing results.
//!
//! Writes the time-stacked observation table as CSV and the grid
//! dimensions as JSON for the regression engine, and the cell geometries
//! as `GeoJSON` for map rendering. Each output is selected independently
//! through [`Output`].

pub mod cells;

use std::io::{BufWriter, Write as _};
use std::path::{Path, PathBuf};

use lgcp_grid::Grid;
use lgcp_grid_models::{CellObservation, GridDimensions};
use strum_macros::{AsRefStr, Display, EnumString};

/// Errors that can occur while writing outputs.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    /// I/O error creating or writing an output file.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// CSV serialization failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A file the generator can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Output {
    /// `{id}_observations.csv`: the `(t, cell_id)` ordered count table.
    Observations,
    /// `{id}_dimensions.json`: grid rows/cols, resolution, and origin.
    Dimensions,
    /// `{id}_cells.geojson`: cell squares with per-slice counts.
    Cells,
}

impl Output {
    pub const ALL: &[Self] = &[Self::Observations, Self::Dimensions, Self::Cells];

    /// File name of this output for the run named `id`.
    #[must_use]
    pub fn file_name(self, id: &str) -> String {
        let extension = match self {
            Self::Observations => "csv",
            Self::Dimensions => "json",
            Self::Cells => "geojson",
        };
        format!("{id}_{}.{extension}", self.as_ref())
    }
}

/// Parses a comma-separated output list such as `"observations,cells"`.
///
/// # Errors
///
/// Returns the first name that is not a known output.
pub fn parse_outputs(list: &str) -> Result<Vec<Output>, String> {
    let mut outputs: Vec<Output> = list
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().map_err(|_| format!("unknown output '{s}'")))
        .collect::<Result<_, _>>()?;
    outputs.sort_unstable();
    outputs.dedup();
    Ok(outputs)
}

/// Writes observation rows as CSV with a header row.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn write_observations(path: &Path, rows: &[CellObservation]) -> Result<(), GenerateError> {
    let file = create(path)?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(file));
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush().map_err(|e| io_error(path, e))?;

    log::info!("Wrote {} observations to {}", rows.len(), path.display());
    Ok(())
}

/// Writes grid dimensions as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn write_dimensions(path: &Path, dimensions: &GridDimensions) -> Result<(), GenerateError> {
    let file = create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, dimensions)?;
    writer.write_all(b"\n").map_err(|e| io_error(path, e))?;
    writer.flush().map_err(|e| io_error(path, e))?;

    log::info!("Wrote grid dimensions to {}", path.display());
    Ok(())
}

/// Writes cell geometries (with counts, when given) as `GeoJSON`.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn write_cells(
    path: &Path,
    grid: &Grid,
    observations: Option<&[CellObservation]>,
    in_boundary_only: bool,
) -> Result<(), GenerateError> {
    let collection = cells::cells_feature_collection(grid, observations, in_boundary_only);
    let file = create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, &collection)?;
    writer.flush().map_err(|e| io_error(path, e))?;

    log::info!(
        "Wrote {} cells to {}",
        collection.features.len(),
        path.display()
    );
    Ok(())
}

/// Everything a run produced, ready to be written.
pub struct RunOutputs<'a> {
    /// Names the output files.
    pub id: &'a str,
    pub grid: &'a Grid,
    /// Empty when only the grid was built.
    pub observations: &'a [CellObservation],
    pub dimensions: &'a GridDimensions,
}

/// Writes the selected outputs into `dir`, creating it if needed.
///
/// Returns the paths written, in [`Output`] order.
///
/// # Errors
///
/// Returns an error if the directory or any output cannot be written.
pub fn generate_outputs(
    dir: &Path,
    run: &RunOutputs<'_>,
    outputs: &[Output],
) -> Result<Vec<PathBuf>, GenerateError> {
    std::fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;

    let mut selected = outputs.to_vec();
    selected.sort_unstable();
    selected.dedup();

    let mut written = Vec::with_capacity(selected.len());
    for output in selected {
        let path = dir.join(output.file_name(run.id));
        match output {
            Output::Observations => write_observations(&path, run.observations)?,
            Output::Dimensions => write_dimensions(&path, run.dimensions)?,
            Output::Cells => {
                let observations = (!run.observations.is_empty()).then_some(run.observations);
                write_cells(&path, run.grid, observations, false)?;
            }
        }
        written.push(path);
    }

    Ok(written)
}

fn create(path: &Path) -> Result<std::fs::File, GenerateError> {
    std::fs::File::create(path).map_err(|e| io_error(path, e))
}

fn io_error(path: &Path, source: std::io::Error) -> GenerateError {
    GenerateError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use geo::{Rect, coord};
    use lgcp_grid::{BoundaryRegion, build_grid};
    use lgcp_grid_models::PointEvent;

    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("lgcp_grid_generate_{name}"));
        std::fs::remove_dir_all(&dir).ok();
        dir
    }

    fn square_grid() -> Grid {
        let region = BoundaryRegion::from(Rect::new(
            coord! { x: 0.0, y: 0.0 },
            coord! { x: 10.0, y: 10.0 },
        ));
        build_grid(&region, 5.0).unwrap()
    }

    #[test]
    fn parses_output_lists() {
        assert_eq!(
            parse_outputs("cells, observations,cells").unwrap(),
            vec![Output::Observations, Output::Cells]
        );
        assert_eq!(parse_outputs("Dimensions").unwrap(), vec![Output::Dimensions]);
        assert!(parse_outputs("observations,plots").is_err());
    }

    #[test]
    fn names_files_after_the_run() {
        assert_eq!(Output::Observations.file_name("demo"), "demo_observations.csv");
        assert_eq!(Output::Dimensions.file_name("demo"), "demo_dimensions.json");
        assert_eq!(Output::Cells.file_name("demo"), "demo_cells.geojson");
    }

    #[test]
    fn writes_observation_csv_with_header() {
        let grid = square_grid();
        let rows = lgcp_grid::index_events(&grid, &[PointEvent::new(1.0, 6.0, 1)], 1).unwrap();

        let dir = temp_dir("csv");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("obs.csv");
        write_observations(&path, &rows).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_dir_all(&dir).ok();

        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "cell_id,t,id_time,count,cell_area,in_boundary");
        assert_eq!(lines[1], "1,1,1,1,25.0,true");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn generates_all_outputs() {
        let grid = square_grid();
        let rows = lgcp_grid::index_events(&grid, &[], 2).unwrap();
        let dimensions = grid.dimensions(2, Some(2009));
        let run = RunOutputs {
            id: "demo",
            grid: &grid,
            observations: &rows,
            dimensions: &dimensions,
        };

        let dir = temp_dir("all");
        let written = generate_outputs(&dir, &run, Output::ALL).unwrap();
        assert_eq!(written.len(), 3);
        assert!(written.iter().all(|p| p.exists()));

        let dims: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.join("demo_dimensions.json")).unwrap())
                .unwrap();
        assert_eq!(dims["nSlices"], 2);
        assert_eq!(dims["baseYear"], 2009);

        let cells: geojson::GeoJson = std::fs::read_to_string(dir.join("demo_cells.geojson"))
            .unwrap()
            .parse()
            .unwrap();
        std::fs::remove_dir_all(&dir).ok();
        let geojson::GeoJson::FeatureCollection(collection) = cells else {
            panic!("expected a FeatureCollection");
        };
        assert_eq!(collection.features.len(), 4);
    }
}
