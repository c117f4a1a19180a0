//! Grid skeleton and cell construction.
//!
//! A [`GridSpec`] is the pure arithmetic of the lattice: where it starts,
//! how big each cell is, and how `(row, col)` maps to a cell id and back.
//! [`build_grid`] combines a spec with a [`Boundary`] to produce the
//! ordered [`Cell`] list.
//!
//! Cells are numbered row-major starting from the top row:
//! `id = row * n_cols + col + 1`. Every edge coordinate is computed as
//! `origin + index * resolution`, both when building cell geometry and when
//! locating points, so the two can never disagree about which side of an
//! edge a point is on.

use geo::{Coord, Polygon, Rect, coord};
use lgcp_grid_models::GridDimensions;

use crate::GridError;
use crate::boundary::Boundary;

/// Ratios within this relative distance of an integer are snapped to it
/// when sizing the grid, so `10.0 / 0.1` yields 100 columns and not 101.
const SNAP_TOLERANCE: f64 = 1e-9;

/// Placement and dimensions of a square-cell lattice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpec {
    origin: Coord<f64>,
    resolution: f64,
    n_rows: u32,
    n_cols: u32,
}

impl GridSpec {
    /// Sizes a lattice of `resolution`-sided cells over `extent`, anchored
    /// at its lower-left corner.
    ///
    /// # Errors
    ///
    /// * [`GridError::InvalidResolution`] if `resolution` is not a positive
    ///   finite number, exceeds the smaller side of `extent`, or would
    ///   produce more cells than fit in a `u32` id.
    /// * [`GridError::EmptyBoundary`] if `extent` is degenerate.
    pub fn from_extent(extent: Rect<f64>, resolution: f64) -> Result<Self, GridError> {
        let width = extent.width();
        let height = extent.height();

        let invalid = || GridError::InvalidResolution {
            resolution,
            width,
            height,
        };

        if !resolution.is_finite() || resolution <= 0.0 {
            return Err(invalid());
        }
        if !(width.is_finite() && height.is_finite()) || width <= 0.0 || height <= 0.0 {
            return Err(GridError::EmptyBoundary);
        }
        if resolution > width.min(height) {
            return Err(invalid());
        }

        let (min, max) = (extent.min(), extent.max());
        let n_cols = cells_spanning(min.x, max.x, resolution).ok_or_else(invalid)?;
        let n_rows = cells_spanning(min.y, max.y, resolution).ok_or_else(invalid)?;
        if n_rows.checked_mul(n_cols).is_none() {
            return Err(invalid());
        }

        Ok(Self {
            origin: extent.min(),
            resolution,
            n_rows,
            n_cols,
        })
    }

    /// Lower-left corner of the grid extent.
    #[must_use]
    pub const fn origin(&self) -> Coord<f64> {
        self.origin
    }

    #[must_use]
    pub const fn resolution(&self) -> f64 {
        self.resolution
    }

    #[must_use]
    pub const fn n_rows(&self) -> u32 {
        self.n_rows
    }

    #[must_use]
    pub const fn n_cols(&self) -> u32 {
        self.n_cols
    }

    #[must_use]
    pub const fn n_cells(&self) -> u32 {
        self.n_rows * self.n_cols
    }

    #[must_use]
    pub fn cell_area(&self) -> f64 {
        self.resolution * self.resolution
    }

    /// The area covered by all cells. Points on its upper x/y edges are
    /// outside the grid.
    #[must_use]
    pub fn extent(&self) -> Rect<f64> {
        Rect::new(
            self.origin,
            coord! { x: self.x_edge(self.n_cols), y: self.y_edge(self.n_rows) },
        )
    }

    /// Id of the cell at `(row, col)`, with row 0 at the top.
    #[must_use]
    pub const fn cell_id(&self, row: u32, col: u32) -> Option<u32> {
        if row < self.n_rows && col < self.n_cols {
            Some(row * self.n_cols + col + 1)
        } else {
            None
        }
    }

    /// `(row, col)` of the cell with the given id.
    #[must_use]
    pub const fn row_col(&self, id: u32) -> Option<(u32, u32)> {
        if id == 0 || id > self.n_cells() {
            return None;
        }
        let index = id - 1;
        Some((index / self.n_cols, index % self.n_cols))
    }

    /// Square covering `[x0, x0 + res) x [y0, y0 + res)` for the cell at
    /// `(row, col)`.
    #[must_use]
    pub fn cell_rect(&self, row: u32, col: u32) -> Rect<f64> {
        let from_bottom = self.n_rows - 1 - row;
        Rect::new(
            coord! { x: self.x_edge(col), y: self.y_edge(from_bottom) },
            coord! { x: self.x_edge(col + 1), y: self.y_edge(from_bottom + 1) },
        )
    }

    /// Locates the cell containing `(x, y)` using closed-lower/open-upper
    /// intervals on both axes. Returns `None` outside the grid extent.
    #[must_use]
    pub fn locate(&self, x: f64, y: f64) -> Option<(u32, u32)> {
        let col = axis_index(self.origin.x, self.resolution, self.n_cols, x)?;
        let from_bottom = axis_index(self.origin.y, self.resolution, self.n_rows, y)?;
        Some((self.n_rows - 1 - from_bottom, col))
    }

    /// Id of the cell containing `(x, y)`.
    #[must_use]
    pub fn locate_id(&self, x: f64, y: f64) -> Option<u32> {
        let (row, col) = self.locate(x, y)?;
        self.cell_id(row, col)
    }

    fn x_edge(&self, col: u32) -> f64 {
        edge(self.origin.x, self.resolution, i64::from(col))
    }

    fn y_edge(&self, from_bottom: u32) -> f64 {
        edge(self.origin.y, self.resolution, i64::from(from_bottom))
    }
}

#[allow(clippy::cast_precision_loss)]
fn edge(origin: f64, resolution: f64, index: i64) -> f64 {
    origin + index as f64 * resolution
}

/// Smallest number of `resolution`-sized spans from `min` whose last edge
/// reaches `max`.
///
/// A ratio within tolerance of an integer uses that integer only while
/// its edge still reaches `max`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn cells_spanning(min: f64, max: f64, resolution: f64) -> Option<u32> {
    let ratio = (max - min) / resolution;
    let nearest = ratio.round();
    let spans = if (ratio - nearest).abs() <= SNAP_TOLERANCE * nearest.max(1.0) {
        nearest
    } else {
        ratio.ceil()
    };
    if spans < 1.0 || spans > f64::from(u32::MAX) {
        return None;
    }

    let mut n = spans as i64;
    while edge(min, resolution, n) < max {
        n += 1;
    }
    u32::try_from(n).ok()
}

/// Index of the half-open interval `[edge(i), edge(i + 1))` holding
/// `value`, for `i` in `0..n`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn axis_index(origin: f64, resolution: f64, n: u32, value: f64) -> Option<u32> {
    if !value.is_finite() {
        return None;
    }

    let n = i64::from(n);
    let guess = ((value - origin) / resolution).floor();
    if guess < -1.0 || guess > n as f64 {
        return None;
    }

    // The division can land one interval off near an edge; settle it
    // against the exact edge coordinates.
    let mut index = guess as i64;
    while index >= 0 && value < edge(origin, resolution, index) {
        index -= 1;
    }
    while index < n && value >= edge(origin, resolution, index + 1) {
        index += 1;
    }

    if (0..n).contains(&index) {
        Some(index as u32)
    } else {
        None
    }
}

/// One grid entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    /// Row-major id, 1-based, top row first.
    pub id: u32,
    /// 0-based row, 0 = top.
    pub row: u32,
    /// 0-based column, 0 = left.
    pub col: u32,
    /// The unclipped cell square.
    pub geometry: Polygon<f64>,
    /// Whether the square overlaps the boundary with non-zero area.
    pub in_boundary: bool,
}

/// A [`GridSpec`] together with every cell it generates, in id order.
///
/// Built once and shared by every time slice so that a given cell id
/// refers to the same square throughout.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    spec: GridSpec,
    cells: Vec<Cell>,
}

impl Grid {
    /// Reassembles a grid from parts produced elsewhere.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::MisalignedGridReuse`] if `cells` are not exactly
    /// the cells `spec` generates.
    pub fn from_parts(spec: GridSpec, cells: Vec<Cell>) -> Result<Self, GridError> {
        validate_cells(&spec, &cells)?;
        Ok(Self { spec, cells })
    }

    #[must_use]
    pub const fn spec(&self) -> &GridSpec {
        &self.spec
    }

    /// All cells in ascending id order, including out-of-boundary ones.
    #[must_use]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    #[must_use]
    pub fn cell(&self, id: u32) -> Option<&Cell> {
        let index = usize::try_from(id.checked_sub(1)?).ok()?;
        self.cells.get(index)
    }

    /// Cells that survive the boundary filter, in ascending id order.
    pub fn in_boundary_cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter().filter(|cell| cell.in_boundary)
    }

    #[must_use]
    pub fn n_in_boundary(&self) -> u32 {
        u32::try_from(self.in_boundary_cells().count()).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn into_parts(self) -> (GridSpec, Vec<Cell>) {
        (self.spec, self.cells)
    }

    /// Dimensions to export alongside a table of `n_slices` time slices.
    #[must_use]
    pub fn dimensions(&self, n_slices: u32, base_year: Option<i32>) -> GridDimensions {
        GridDimensions {
            n_rows: self.spec.n_rows(),
            n_cols: self.spec.n_cols(),
            resolution: self.spec.resolution(),
            origin_x: self.spec.origin().x,
            origin_y: self.spec.origin().y,
            cell_area: self.spec.cell_area(),
            n_cells: self.spec.n_cells(),
            n_in_boundary: self.n_in_boundary(),
            n_slices,
            base_year,
        }
    }
}

/// Builds the grid covering `boundary` and flags the cells that overlap it.
///
/// # Errors
///
/// * [`GridError::InvalidResolution`] if `resolution` is not positive or is
///   larger than the bounding box's smaller side.
/// * [`GridError::EmptyBoundary`] if the boundary has no extent or no area.
pub fn build_grid<B: Boundary + ?Sized>(boundary: &B, resolution: f64) -> Result<Grid, GridError> {
    if !resolution.is_finite() || resolution <= 0.0 {
        return Err(GridError::InvalidResolution {
            resolution,
            width: f64::NAN,
            height: f64::NAN,
        });
    }

    let extent = boundary.bounding_rect().ok_or(GridError::EmptyBoundary)?;
    if boundary.area() <= 0.0 {
        return Err(GridError::EmptyBoundary);
    }

    let spec = GridSpec::from_extent(extent, resolution)?;

    let mut cells = Vec::with_capacity(spec.n_cells() as usize);
    for row in 0..spec.n_rows() {
        for col in 0..spec.n_cols() {
            let geometry = spec.cell_rect(row, col).to_polygon();
            let in_boundary = boundary.overlaps_with_area(&geometry);
            cells.push(Cell {
                id: row * spec.n_cols() + col + 1,
                row,
                col,
                geometry,
                in_boundary,
            });
        }
    }

    let grid = Grid { spec, cells };
    log::info!(
        "Built {}x{} grid at resolution {}: {} cells, {} in boundary",
        spec.n_rows(),
        spec.n_cols(),
        resolution,
        spec.n_cells(),
        grid.n_in_boundary()
    );

    Ok(grid)
}

/// Checks that `cells` are exactly the cells `spec` generates: one per
/// id in order, with matching row/col and bit-identical geometry.
pub(crate) fn validate_cells(spec: &GridSpec, cells: &[Cell]) -> Result<(), GridError> {
    if cells.len() != spec.n_cells() as usize {
        return Err(GridError::misaligned(format!(
            "grid spec has {} cells but {} were supplied",
            spec.n_cells(),
            cells.len()
        )));
    }

    for (expected_id, cell) in (1..).zip(cells) {
        if cell.id != expected_id {
            return Err(GridError::misaligned(format!(
                "cell at position {expected_id} has id {}",
                cell.id
            )));
        }
        if spec.row_col(cell.id) != Some((cell.row, cell.col)) {
            return Err(GridError::misaligned(format!(
                "cell {} claims row {} col {}",
                cell.id, cell.row, cell.col
            )));
        }
        if cell.geometry != spec.cell_rect(cell.row, cell.col).to_polygon() {
            return Err(GridError::misaligned(format!(
                "cell {} geometry differs from the grid spec",
                cell.id
            )));
        }
    }

    Ok(())
}
