//! Cell geometry export as a `GeoJSON` `FeatureCollection`.
//!
//! Each feature is one cell square with its id, row, column, and boundary
//! flag. When observations are supplied, each slice's count is added as a
//! `count_t{t}` property so the file can be styled per period directly.

use std::collections::BTreeMap;

use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value, feature::Id};
use lgcp_grid::{Cell, Grid};
use lgcp_grid_models::CellObservation;

/// Builds the cell `FeatureCollection` for `grid`.
///
/// With `in_boundary_only`, excluded cells are omitted.
#[must_use]
pub fn cells_feature_collection(
    grid: &Grid,
    observations: Option<&[CellObservation]>,
    in_boundary_only: bool,
) -> FeatureCollection {
    let mut counts: BTreeMap<u32, Vec<(u32, u64)>> = BTreeMap::new();
    for row in observations.unwrap_or_default() {
        counts
            .entry(row.cell_id)
            .or_default()
            .push((row.t, row.count));
    }

    let features = grid
        .cells()
        .iter()
        .filter(|cell| cell.in_boundary || !in_boundary_only)
        .map(|cell| cell_feature(cell, counts.get(&cell.id).map(Vec::as_slice)))
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

fn cell_feature(cell: &Cell, counts: Option<&[(u32, u64)]>) -> Feature {
    let mut properties = JsonObject::new();
    properties.insert("id".to_string(), cell.id.into());
    properties.insert("row".to_string(), cell.row.into());
    properties.insert("col".to_string(), cell.col.into());
    properties.insert("in_boundary".to_string(), cell.in_boundary.into());
    for (t, count) in counts.unwrap_or_default() {
        properties.insert(format!("count_t{t}"), (*count).into());
    }

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::from(&cell.geometry))),
        id: Some(Id::Number(cell.id.into())),
        properties: Some(properties),
        foreign_members: None,
    }
}
