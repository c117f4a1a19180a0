#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Grid discretization and spatio-temporal cell indexing for point
//! patterns.
//!
//! Turns a boundary polygon, a cell resolution, and a set of timestamped
//! points into the count table a log-Gaussian Cox process regression
//! consumes: one row per in-boundary cell per time slice, ordered by
//! `(t, cell_id)`, with zero counts materialized.
//!
//! The grid is built once and shared by every slice so a cell id names the
//! same square at every `t`. Slices are independent; the concurrent path
//! counts each one on its own blocking task.

pub mod boundary;
pub mod count;
pub mod grid;
pub mod progress;
pub mod stack;

use std::sync::Arc;

use lgcp_grid_models::{CellObservation, GridDimensions, PointEvent};

pub use boundary::{Boundary, BoundaryRegion};
pub use count::{SliceCounts, count_events};
pub use grid::{Cell, Grid, GridSpec, build_grid};
pub use stack::{index_events, index_events_concurrent, stack_timeslices};

use crate::progress::ProgressCallback;

/// Errors from building or indexing a grid.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    /// Resolution is not positive, or larger than the boundary extent.
    #[error(
        "Invalid resolution {resolution}: must be positive and no larger than the \
         boundary extent ({width} x {height})"
    )]
    InvalidResolution {
        /// The rejected resolution.
        resolution: f64,
        /// Bounding box width (NaN if not yet known).
        width: f64,
        /// Bounding box height (NaN if not yet known).
        height: f64,
    },

    /// Boundary has no polygons, no extent, or zero area.
    #[error("Boundary is empty or degenerate")]
    EmptyBoundary,

    /// Cells or counts do not belong to the grid they were used with.
    #[error("Misaligned grid reuse: {message}")]
    MisalignedGridReuse {
        /// What did not line up.
        message: String,
    },

    /// Two count slices share the same time index.
    #[error("Duplicate counts for time slice {t}")]
    DuplicateTimeSlice {
        /// The repeated time index.
        t: u32,
    },

    /// A slice worker task failed.
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl GridError {
    pub(crate) fn misaligned(message: impl Into<String>) -> Self {
        Self::MisalignedGridReuse {
            message: message.into(),
        }
    }
}

/// A grid built once from a boundary, reused for every time slice.
///
/// Cheap to clone; clones share the same grid.
#[derive(Debug, Clone)]
pub struct GridIndexer {
    grid: Arc<Grid>,
}

impl GridIndexer {
    /// Builds the grid over `boundary`.
    ///
    /// # Errors
    ///
    /// See [`build_grid`].
    pub fn new<B: Boundary + ?Sized>(boundary: &B, resolution: f64) -> Result<Self, GridError> {
        Ok(Self::from_grid(build_grid(boundary, resolution)?))
    }

    #[must_use]
    pub fn from_grid(grid: Grid) -> Self {
        Self {
            grid: Arc::new(grid),
        }
    }

    #[must_use]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    #[must_use]
    pub fn spec(&self) -> &GridSpec {
        self.grid.spec()
    }

    /// Counts the events of slice `t`.
    #[must_use]
    pub fn count(&self, events: &[PointEvent], t: u32) -> SliceCounts {
        count_events(self.grid.spec(), events, t)
    }

    /// Stacks previously counted slices.
    ///
    /// # Errors
    ///
    /// See [`stack_timeslices`].
    pub fn stack(&self, per_t_counts: &[SliceCounts]) -> Result<Vec<CellObservation>, GridError> {
        stack_timeslices(self.grid.spec(), self.grid.cells(), per_t_counts)
    }

    /// Counts and stacks slices `1..=n_slices` sequentially.
    ///
    /// # Errors
    ///
    /// See [`index_events`].
    pub fn index(
        &self,
        events: &[PointEvent],
        n_slices: u32,
    ) -> Result<Vec<CellObservation>, GridError> {
        index_events(&self.grid, events, n_slices)
    }

    /// Counts and stacks slices `1..=n_slices`, one blocking task per slice.
    ///
    /// # Errors
    ///
    /// See [`index_events_concurrent`].
    pub async fn index_concurrent(
        &self,
        events: Vec<PointEvent>,
        n_slices: u32,
        progress: Arc<dyn ProgressCallback>,
    ) -> Result<Vec<CellObservation>, GridError> {
        index_events_concurrent(Arc::clone(&self.grid), events, n_slices, progress).await
    }

    #[must_use]
    pub fn dimensions(&self, n_slices: u32, base_year: Option<i32>) -> GridDimensions {
        self.grid.dimensions(n_slices, base_year)
    }
}
