//! End-to-end runs: build the grid, index events, write outputs.

use std::path::PathBuf;
use std::time::Instant;

use lgcp_grid::{BoundaryRegion, GridIndexer};
use lgcp_grid_cli_utils::{IndicatifProgress, MultiProgress};
use lgcp_grid_generate::{Output, RunOutputs, generate_outputs};
use lgcp_grid_ingest::events::TimedEvents;

/// A fully loaded indexing run.
pub struct IndexRun {
    pub id: String,
    pub boundary: BoundaryRegion,
    pub events: TimedEvents,
    pub resolution: f64,
    pub output_dir: PathBuf,
    pub outputs: Vec<Output>,
    /// Count slices one after another instead of on worker tasks.
    pub sequential: bool,
}

/// Builds the grid over `boundary` and writes its cells and dimensions.
///
/// # Errors
///
/// Returns an error if the grid cannot be built or the outputs written.
pub fn run_grid(
    id: &str,
    boundary: &BoundaryRegion,
    resolution: f64,
    output_dir: &std::path::Path,
) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let indexer = GridIndexer::new(boundary, resolution)?;
    let dimensions = indexer.dimensions(0, None);

    let run = RunOutputs {
        id,
        grid: indexer.grid(),
        observations: &[],
        dimensions: &dimensions,
    };
    Ok(generate_outputs(
        output_dir,
        &run,
        &[Output::Cells, Output::Dimensions],
    )?)
}

/// Indexes the run's events and writes the selected outputs.
///
/// # Errors
///
/// Returns an error if the grid cannot be built, indexing fails, or the
/// outputs cannot be written.
pub async fn run_index(
    run: IndexRun,
    multi: &MultiProgress,
) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let IndexRun {
        id,
        boundary,
        events,
        resolution,
        output_dir,
        outputs,
        sequential,
    } = run;

    let indexer = GridIndexer::new(&boundary, resolution)?;
    let n_slices = events.n_slices;

    let observations = if sequential {
        indexer.index(&events.events, n_slices)?
    } else {
        let progress = IndicatifProgress::slices_bar(multi, "Indexing time slices");
        indexer
            .index_concurrent(events.events, n_slices, progress)
            .await?
    };

    let dimensions = indexer.dimensions(n_slices, Some(events.offset.base_year()));
    let written = generate_outputs(
        &output_dir,
        &RunOutputs {
            id: &id,
            grid: indexer.grid(),
            observations: &observations,
            dimensions: &dimensions,
        },
        &outputs,
    )?;

    log::info!(
        "Indexed '{id}': {} rows over {n_slices} slices x {} cells in {:.2?}",
        observations.len(),
        dimensions.n_in_boundary,
        start.elapsed()
    );

    Ok(written)
}

#[cfg(test)]
mod tests {
    use lgcp_grid_ingest::boundary::parse_boundary;
    use lgcp_grid_models::{PointEvent, TimeOffset};

    use super::*;

    const SQUARE: &str =
        r#"{"type": "Polygon", "coordinates": [[[0, 0], [10, 0], [10, 10], [0, 10], [0, 0]]]}"#;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("lgcp_grid_cli_{name}"));
        std::fs::remove_dir_all(&dir).ok();
        dir
    }

    #[test]
    fn grid_run_writes_cells_and_dimensions() {
        let dir = temp_dir("grid");
        let boundary = parse_boundary(SQUARE).unwrap();
        let written = run_grid("demo", &boundary, 5.0, &dir).unwrap();
        std::fs::remove_dir_all(&dir).ok();
        assert_eq!(written.len(), 2);
    }

    #[tokio::test]
    async fn sequential_index_run_writes_observations() {
        let dir = temp_dir("index");
        let run = IndexRun {
            id: "demo".to_string(),
            boundary: parse_boundary(SQUARE).unwrap(),
            events: TimedEvents {
                events: vec![PointEvent::new(1.0, 1.0, 1), PointEvent::new(6.0, 6.0, 2)],
                offset: TimeOffset::starting_at(2020).unwrap(),
                n_slices: 2,
            },
            resolution: 5.0,
            output_dir: dir.clone(),
            outputs: vec![Output::Observations],
            sequential: true,
        };

        let written = run_index(run, &MultiProgress::new()).await.unwrap();
        let contents = std::fs::read_to_string(&written[0]).unwrap();
        std::fs::remove_dir_all(&dir).ok();

        // header + 2 slices x 4 cells
        assert_eq!(contents.lines().count(), 9);
    }
}
