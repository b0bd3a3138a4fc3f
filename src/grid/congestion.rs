//! Congestion-ordered index over valid cells.
//!
//! Orders cells by (congestion, cell id) so the global fallback always yields
//! the least congested cell, ties broken by the shuffled id.

use std::collections::BTreeSet;

use crate::grid::spatial::{GridCoord, SpatialGrid};

type CongestionKey = (u32, u32, GridCoord);

#[derive(Debug, Clone, Default)]
pub struct CongestionIndex {
    ordered: BTreeSet<CongestionKey>,
}

impl CongestionIndex {
    /// Index every valid cell of the grid
    pub fn build(grid: &SpatialGrid) -> Self {
        let ordered = grid
            .iter()
            .filter(|(_, cell)| cell.has_locations())
            .map(|(coord, cell)| (cell.congestion(), cell.id(), coord))
            .collect();
        Self { ordered }
    }

    /// Least congested cell, if any cell is valid
    pub fn least_congested(&self) -> Option<GridCoord> {
        self.ordered.first().map(|&(_, _, coord)| coord)
    }

    /// Re-key a cell after its congestion changed from `old` to `new`.
    /// Cells that were never indexed (invalid cells) are ignored.
    pub fn update(&mut self, coord: GridCoord, id: u32, old: u32, new: u32) {
        if old == new {
            return;
        }
        if self.ordered.remove(&(old, id, coord)) {
            self.ordered.insert((new, id, coord));
        }
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Cells in allocation order
    pub fn iter(&self) -> impl Iterator<Item = GridCoord> + '_ {
        self.ordered.iter().map(|&(_, _, coord)| coord)
    }
}
