//! Time-stacking of per-slice counts into the regression table.
//!
//! The table holds one block per time slice, each block listing every
//! in-boundary cell in ascending id order with its count (zeros included).
//! Blocks are independent, so [`index_events_concurrent`] computes them on
//! blocking worker tasks and merges them back in `t` order.

use std::collections::BTreeMap;
use std::sync::Arc;

use lgcp_grid_models::{CellObservation, PointEvent};
use tokio::task::JoinSet;

use crate::GridError;
use crate::count::{SliceCounts, count_events};
use crate::grid::{Cell, Grid, GridSpec, validate_cells};
use crate::progress::ProgressCallback;

/// Stacks per-slice counts into `(t, cell_id)`-ordered observations.
///
/// Slices may be supplied in any order; the output is sorted by `t`.
///
/// # Errors
///
/// * [`GridError::MisalignedGridReuse`] if `cells` are not the cells of
///   `spec`, a slice was counted on a different grid, or a slice holds a
///   count for an id the grid does not have.
/// * [`GridError::DuplicateTimeSlice`] if two slices share a `t`.
pub fn stack_timeslices(
    spec: &GridSpec,
    cells: &[Cell],
    per_t_counts: &[SliceCounts],
) -> Result<Vec<CellObservation>, GridError> {
    validate_cells(spec, cells)?;

    let mut ordered = BTreeMap::new();
    for slice in per_t_counts {
        if slice.spec() != spec {
            return Err(GridError::misaligned(format!(
                "counts for t={} were binned on a different grid",
                slice.t()
            )));
        }
        if let Some((id, _)) = slice.iter().find(|(id, _)| spec.row_col(*id).is_none()) {
            return Err(GridError::misaligned(format!(
                "counts for t={} reference cell {id}, grid has {} cells",
                slice.t(),
                spec.n_cells()
            )));
        }
        if ordered.insert(slice.t(), slice).is_some() {
            return Err(GridError::DuplicateTimeSlice { t: slice.t() });
        }
    }

    let cell_area = spec.cell_area();
    let rows: Vec<CellObservation> = ordered
        .values()
        .flat_map(|slice| slice_block(cells, slice, cell_area))
        .collect();

    log::info!(
        "Stacked {} time slices into {} observations",
        ordered.len(),
        rows.len()
    );

    Ok(rows)
}

/// Counts and stacks `events` over slices `1..=n_slices`.
///
/// Slices without events are materialized as zeros. `n_slices = 1` covers
/// the single-period case.
///
/// # Errors
///
/// Propagates [`stack_timeslices`] errors.
pub fn index_events(
    grid: &Grid,
    events: &[PointEvent],
    n_slices: u32,
) -> Result<Vec<CellObservation>, GridError> {
    let mut by_t = group_by_slice(events, n_slices);

    let slices: Vec<SliceCounts> = (1..=n_slices)
        .map(|t| {
            let events = by_t.remove(&t).unwrap_or_default();
            count_events(grid.spec(), &events, t)
        })
        .collect();

    stack_timeslices(grid.spec(), grid.cells(), &slices)
}

/// Same output as [`index_events`], with each slice counted on its own
/// blocking task.
///
/// Workers share the grid read-only. Results are merged by `t`, so the
/// output order does not depend on which worker finishes first.
///
/// # Errors
///
/// Returns [`GridError::Join`] if a worker task panics or is cancelled.
pub async fn index_events_concurrent(
    grid: Arc<Grid>,
    events: Vec<PointEvent>,
    n_slices: u32,
    progress: Arc<dyn ProgressCallback>,
) -> Result<Vec<CellObservation>, GridError> {
    let mut by_t = group_by_slice(&events, n_slices);
    drop(events);

    progress.set_total(u64::from(n_slices));
    progress.set_message(format!("Counting {n_slices} time slices"));

    let mut workers = JoinSet::new();
    for t in 1..=n_slices {
        let grid = Arc::clone(&grid);
        let events = by_t.remove(&t).unwrap_or_default();
        workers.spawn_blocking(move || {
            let slice = count_events(grid.spec(), &events, t);
            let block = slice_block(grid.cells(), &slice, grid.spec().cell_area());
            (t, block)
        });
    }

    let mut blocks = BTreeMap::new();
    while let Some(result) = workers.join_next().await {
        let (t, block) = result?;
        blocks.insert(t, block);
        progress.inc(1);
    }

    let rows: Vec<CellObservation> = blocks.into_values().flatten().collect();
    progress.finish(format!(
        "Stacked {n_slices} time slices into {} observations",
        rows.len()
    ));
    log::info!(
        "Stacked {n_slices} time slices into {} observations",
        rows.len()
    );

    Ok(rows)
}

/// One row per in-boundary cell, ascending by id.
fn slice_block(cells: &[Cell], slice: &SliceCounts, cell_area: f64) -> Vec<CellObservation> {
    cells
        .iter()
        .filter(|cell| cell.in_boundary)
        .map(|cell| CellObservation {
            cell_id: cell.id,
            t: slice.t(),
            id_time: slice.t(),
            count: slice.count(cell.id),
            cell_area,
            in_boundary: true,
        })
        .collect()
}

fn group_by_slice(events: &[PointEvent], n_slices: u32) -> BTreeMap<u32, Vec<PointEvent>> {
    let mut by_t: BTreeMap<u32, Vec<PointEvent>> = BTreeMap::new();
    let mut out_of_range = 0u64;

    for event in events {
        if (1..=n_slices).contains(&event.t) {
            by_t.entry(event.t).or_default().push(*event);
        } else {
            out_of_range += 1;
        }
    }

    if out_of_range > 0 {
        log::warn!("Ignoring {out_of_range} events outside time slices 1..={n_slices}");
    }

    by_t
}
