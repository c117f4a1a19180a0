//! Per-time-slice point-in-cell counting.

use std::collections::BTreeMap;

use lgcp_grid_models::PointEvent;

use crate::grid::GridSpec;

/// Event counts for one time slice, keyed by cell id.
///
/// Only cells with at least one event are stored; every other cell of the
/// grid has an implicit count of zero. The counts remember the [`GridSpec`]
/// they were binned against so they cannot be stacked onto a different grid.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceCounts {
    spec: GridSpec,
    t: u32,
    counts: BTreeMap<u32, u64>,
    dropped: u64,
}

impl SliceCounts {
    /// An all-zero slice.
    #[must_use]
    pub const fn empty(spec: GridSpec, t: u32) -> Self {
        Self {
            spec,
            t,
            counts: BTreeMap::new(),
            dropped: 0,
        }
    }

    /// Wraps counts computed elsewhere (for example from a raster).
    ///
    /// Ids are checked against `spec` when the slice is stacked.
    #[must_use]
    pub fn from_counts(spec: GridSpec, t: u32, counts: BTreeMap<u32, u64>) -> Self {
        let counts = counts.into_iter().filter(|(_, count)| *count > 0).collect();
        Self {
            spec,
            t,
            counts,
            dropped: 0,
        }
    }

    #[must_use]
    pub const fn spec(&self) -> &GridSpec {
        &self.spec
    }

    #[must_use]
    pub const fn t(&self) -> u32 {
        self.t
    }

    /// Count for `cell_id`, zero if no event fell in it.
    #[must_use]
    pub fn count(&self, cell_id: u32) -> u64 {
        self.counts.get(&cell_id).copied().unwrap_or(0)
    }

    /// Non-zero counts in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u64)> + '_ {
        self.counts.iter().map(|(id, count)| (*id, *count))
    }

    /// Total events binned into the grid.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Events of this slice that fell outside the grid extent.
    #[must_use]
    pub const fn dropped(&self) -> u64 {
        self.dropped
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// Bins the events of slice `t` into the cells of `spec`.
///
/// Events with a different `t` are ignored. Events outside the grid extent
/// are dropped and tallied in [`SliceCounts::dropped`]; boundaries are not
/// rectangular, so the grid over-covers them and stray points are expected.
/// A slice with no binned events is valid and yields all-zero counts.
#[must_use]
pub fn count_events(spec: &GridSpec, events: &[PointEvent], t: u32) -> SliceCounts {
    let mut slice = SliceCounts::empty(*spec, t);

    for event in events.iter().filter(|event| event.t == t) {
        match spec.locate_id(event.x, event.y) {
            Some(id) => *slice.counts.entry(id).or_insert(0) += 1,
            None => slice.dropped += 1,
        }
    }

    if slice.dropped > 0 {
        log::debug!(
            "t={t}: dropped {} events outside the grid extent",
            slice.dropped
        );
    }
    if slice.is_empty() {
        log::warn!("No events in window for t={t}, slice will be all zeros");
    } else {
        log::debug!(
            "t={t}: binned {} events into {} cells",
            slice.total(),
            slice.counts.len()
        );
    }

    slice
}

#[cfg(test)]
mod tests {
    use geo::{Rect, coord};

    use super::*;

    fn spec_10x10_at_5() -> GridSpec {
        GridSpec::from_extent(
            Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 10.0, y: 10.0 }),
            5.0,
        )
        .unwrap()
    }

    #[test]
    fn counts_three_events_into_row_major_cells() {
        let spec = spec_10x10_at_5();
        let events = [
            PointEvent::new(1.0, 1.0, 1),
            PointEvent::new(6.0, 1.0, 1),
            PointEvent::new(1.0, 6.0, 1),
        ];
        let slice = count_events(&spec, &events, 1);

        // top-left, top-right, bottom-left, bottom-right
        assert_eq!(slice.count(1), 1);
        assert_eq!(slice.count(2), 0);
        assert_eq!(slice.count(3), 1);
        assert_eq!(slice.count(4), 1);
        assert_eq!(slice.total(), 3);
        assert_eq!(slice.dropped(), 0);
    }

    #[test]
    fn only_counts_the_requested_slice() {
        let spec = spec_10x10_at_5();
        let events = [
            PointEvent::new(1.0, 1.0, 1),
            PointEvent::new(1.0, 1.0, 2),
            PointEvent::new(1.0, 1.0, 2),
        ];
        assert_eq!(count_events(&spec, &events, 1).total(), 1);
        assert_eq!(count_events(&spec, &events, 2).count(3), 2);
        assert!(count_events(&spec, &events, 3).is_empty());
    }

    #[test]
    fn conserves_counts_inside_the_extent() {
        let spec = GridSpec::from_extent(
            Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 9.0, y: 7.0 }),
            2.0,
        )
        .unwrap();
        let extent = spec.extent();

        let events: Vec<PointEvent> = (0..400)
            .map(|i| {
                let x = f64::from(i % 23) * 0.55 - 1.0;
                let y = f64::from(i % 17) * 0.6 - 1.5;
                PointEvent::new(x, y, 1)
            })
            .collect();
        let inside = events
            .iter()
            .filter(|e| {
                e.x >= extent.min().x
                    && e.x < extent.max().x
                    && e.y >= extent.min().y
                    && e.y < extent.max().y
            })
            .count() as u64;

        let slice = count_events(&spec, &events, 1);
        assert_eq!(slice.total(), inside);
        assert_eq!(slice.total() + slice.dropped(), events.len() as u64);
    }

    #[test]
    fn points_on_shared_edges_land_in_exactly_one_cell() {
        let spec = spec_10x10_at_5();
        let events = [PointEvent::new(5.0, 5.0, 1), PointEvent::new(5.0, 0.0, 1)];
        let slice = count_events(&spec, &events, 1);
        assert_eq!(slice.count(2), 1);
        assert_eq!(slice.count(4), 1);
        assert_eq!(slice.total(), 2);
    }

    #[test]
    fn upper_extent_edge_is_outside() {
        let spec = spec_10x10_at_5();
        let events = [PointEvent::new(10.0, 2.0, 1), PointEvent::new(2.0, 10.0, 1)];
        let slice = count_events(&spec, &events, 1);
        assert!(slice.is_empty());
        assert_eq!(slice.dropped(), 2);
    }

    #[test]
    fn from_counts_drops_zero_entries() {
        let spec = spec_10x10_at_5();
        let slice = SliceCounts::from_counts(spec, 4, BTreeMap::from([(1, 0), (2, 5)]));
        assert_eq!(slice.iter().collect::<Vec<_>>(), vec![(2, 5)]);
        assert_eq!(slice.t(), 4);
    }
}
