#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Point event, cell observation, and grid dimension types.
//!
//! These types form the tabular contract between the grid indexer and its
//! consumers: the event loaders produce [`PointEvent`]s, the indexer turns
//! them into [`CellObservation`] rows, and the regression engine reads those
//! rows together with the [`GridDimensions`] of the grid they were counted
//! on.

use serde::{Deserialize, Serialize};

/// A single observation at `(x, y)` during time slice `t`.
///
/// Coordinates are in the same reference system as the boundary the grid
/// was built from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointEvent {
    /// Easting / longitude.
    pub x: f64,
    /// Northing / latitude.
    pub y: f64,
    /// 1-based time slice index.
    pub t: u32,
}

impl PointEvent {
    #[must_use]
    pub const fn new(x: f64, y: f64, t: u32) -> Self {
        Self { x, y, t }
    }
}

/// One row of the time-stacked table handed to the regression engine.
///
/// Rows are emitted in ascending `(t, cell_id)` order, one row per
/// in-boundary cell per time slice, including cells with zero events.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellObservation {
    /// Row-major cell identifier (1-based, top row first). Stable across
    /// time slices built from the same grid.
    pub cell_id: u32,
    /// 1-based time slice index.
    pub t: u32,
    /// Temporal grouping index for the spatio-temporal random effect.
    /// Always equal to `t`.
    pub id_time: u32,
    /// Number of events in the cell during slice `t`.
    pub count: u64,
    /// Area of the (unclipped) cell, `resolution^2`.
    pub cell_area: f64,
    /// Whether the cell overlaps the boundary region.
    pub in_boundary: bool,
}

/// Dimensions and placement of a grid, exported alongside the observation
/// table so the consumer can rebuild the lattice for its spatial effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridDimensions {
    pub n_rows: u32,
    pub n_cols: u32,
    pub resolution: f64,
    /// Lower-left corner of the grid extent.
    pub origin_x: f64,
    pub origin_y: f64,
    pub cell_area: f64,
    pub n_cells: u32,
    /// Number of cells that survive the boundary filter.
    pub n_in_boundary: u32,
    /// Number of time slices stacked into the table (0 if none yet).
    pub n_slices: u32,
    /// Calendar year that maps to `t = 0`, when the events came from years.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub base_year: Option<i32>,
}

/// Maps raw calendar years onto contiguous 1-based time slice indices.
///
/// The earliest year becomes `t = 1`; that is, `t = year - (min_year - 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOffset {
    base_year: i32,
}

impl TimeOffset {
    /// Offset that makes `first_year` slice 1.
    ///
    /// Returns `None` for `i32::MIN`, whose preceding year does not fit.
    #[must_use]
    pub const fn starting_at(first_year: i32) -> Option<Self> {
        match first_year.checked_sub(1) {
            Some(base_year) => Some(Self { base_year }),
            None => None,
        }
    }

    /// The year that maps to `t = 0`.
    #[must_use]
    pub const fn base_year(self) -> i32 {
        self.base_year
    }

    /// Time slice index of `year`, or `None` if it falls before slice 1.
    #[must_use]
    pub fn t_for(self, year: i32) -> Option<u32> {
        u32::try_from(i64::from(year) - i64::from(self.base_year))
            .ok()
            .filter(|t| *t >= 1)
    }

    /// Calendar year of slice `t`.
    #[must_use]
    pub fn year_for(self, t: u32) -> i32 {
        i32::try_from(t).map_or(i32::MAX, |t| self.base_year.saturating_add(t))
    }

    /// Number of slices needed to cover every year up to `last_year`.
    #[must_use]
    pub fn slices_through(self, last_year: i32) -> u32 {
        self.t_for(last_year).unwrap_or(0)
    }
}
