//! Dense location grid
//!
//! Partitions the horizontal plane of a rectangular world into square cells.
//! Each cell owns its locations and a congestion counter. Cell ids come from a
//! shuffled permutation so id-based tie-breaks are independent of scan order.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};
use std::sync::Arc;

use crate::config::MapGeometry;
use crate::grid::constants::grid::MAX_CELLS;
use crate::navigation::location::Location;
use crate::util::vec2::Vec2;
use crate::util::vec3::Vec3;

/// Offsets of the 8-neighbourhood: dx outer, dy inner, (0, 0) skipped.
/// Neighbour selection relies on this order for tie-breaks.
pub const NEIGHBOR_OFFSETS: [GridCoord; 8] = [
    GridCoord::new(-1, -1),
    GridCoord::new(-1, 0),
    GridCoord::new(-1, 1),
    GridCoord::new(0, -1),
    GridCoord::new(0, 1),
    GridCoord::new(1, -1),
    GridCoord::new(1, 0),
    GridCoord::new(1, 1),
];

/// Integer cell coordinate (may lie outside the grid)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCoord {
    pub x: i32,
    pub y: i32,
}

impl GridCoord {
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn as_vec2(&self) -> Vec2 {
        Vec2::new(self.x as f32, self.y as f32)
    }

    /// Squared length of the offset
    #[inline]
    pub fn length_sq(&self) -> i32 {
        self.x * self.x + self.y * self.y
    }

    /// 8-neighbours in [`NEIGHBOR_OFFSETS`] order
    pub fn neighbors(self) -> impl Iterator<Item = GridCoord> {
        NEIGHBOR_OFFSETS.into_iter().map(move |offset| self + offset)
    }
}

impl Add for GridCoord {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for GridCoord {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::fmt::Display for GridCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.x, self.y)
    }
}

/// Grid construction errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GridError {
    #[error("cell size must be positive, got {0}")]
    InvalidCellSize(f32),
    #[error("world bounds are empty: [{min_x}, {min_y}] -> [{max_x}, {max_y}]")]
    EmptyBounds {
        min_x: f32,
        min_y: f32,
        max_x: f32,
        max_y: f32,
    },
    #[error("grid of {cols}x{rows} cells exceeds the limit of 16777216 cells")]
    TooLarge { cols: u64, rows: u64 },
}

/// One grid cell
#[derive(Debug, Clone)]
pub struct Cell {
    id: u32,
    locations: Vec<Arc<Location>>,
    congestion: u32,
}

impl Cell {
    fn new(id: u32) -> Self {
        Self {
            id,
            locations: Vec::new(),
            congestion: 0,
        }
    }

    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    pub fn locations(&self) -> &[Arc<Location>] {
        &self.locations
    }

    #[inline]
    pub fn congestion(&self) -> u32 {
        self.congestion
    }

    /// A cell without locations never takes part in allocation
    #[inline]
    pub fn has_locations(&self) -> bool {
        !self.locations.is_empty()
    }

    pub(crate) fn push_location(&mut self, location: Location) {
        self.locations.push(Arc::new(location));
    }

    pub(crate) fn increment_congestion(&mut self) {
        self.congestion += 1;
    }

    /// Decrement, clamping at zero. Returns false if the counter was already zero.
    pub(crate) fn decrement_congestion(&mut self) -> bool {
        match self.congestion.checked_sub(1) {
            Some(value) => {
                self.congestion = value;
                true
            }
            None => false,
        }
    }
}

/// Dense grid of cells over a fixed world rectangle
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    world_min: Vec2,
    world_max: Vec2,
    cell_size: f32,
    /// Inverse cell size for fast position-to-cell conversion
    inv_cell_size: f32,
    cols: i32,
    rows: i32,
    /// Row-major: index = y * cols + x
    cells: Vec<Cell>,
}

impl SpatialGrid {
    /// Create a grid covering `[world_min, world_max]` (world x/z) with square cells.
    /// Cell ids are a uniform random permutation drawn from `rng`.
    pub fn new<R: Rng + ?Sized>(
        world_min: Vec2,
        world_max: Vec2,
        cell_size: f32,
        rng: &mut R,
    ) -> Result<Self, GridError> {
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(GridError::InvalidCellSize(cell_size));
        }
        if !(world_max.x > world_min.x && world_max.y > world_min.y) {
            return Err(GridError::EmptyBounds {
                min_x: world_min.x,
                min_y: world_min.y,
                max_x: world_max.x,
                max_y: world_max.y,
            });
        }

        // Saturating casts: an infinite extent becomes u64::MAX
        let cols = (((world_max.x - world_min.x) / cell_size).ceil() as u64).max(1);
        let rows = (((world_max.y - world_min.y) / cell_size).ceil() as u64).max(1);
        let count = match cols.checked_mul(rows) {
            Some(count) if count <= MAX_CELLS => count as u32,
            _ => return Err(GridError::TooLarge { cols, rows }),
        };
        let (cols, rows) = (cols as i32, rows as i32);

        let mut ids: Vec<u32> = (0..count).collect();
        ids.shuffle(rng);

        // ids[i] is the id of the cell at row-major index i
        let cells = ids.into_iter().map(Cell::new).collect();

        Ok(Self {
            world_min,
            world_max,
            cell_size,
            inv_cell_size: 1.0 / cell_size,
            cols,
            rows,
            cells,
        })
    }

    pub fn from_geometry<R: Rng + ?Sized>(geometry: &MapGeometry, rng: &mut R) -> Result<Self, GridError> {
        Self::new(geometry.min, geometry.max, geometry.cell_size, rng)
    }

    #[inline]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Grid dimensions as (columns, rows)
    #[inline]
    pub fn size(&self) -> GridCoord {
        GridCoord::new(self.cols, self.rows)
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn world_min(&self) -> Vec2 {
        self.world_min
    }

    #[inline]
    pub fn world_max(&self) -> Vec2 {
        self.world_max
    }

    /// Cell containing a world position. The vertical axis is ignored.
    /// The result may be out of bounds.
    #[inline]
    pub fn world_to_cell(&self, position: Vec3) -> GridCoord {
        self.plane_to_cell(position.horizontal())
    }

    /// Cell containing a horizontal-plane position (world x, world z)
    #[inline]
    pub fn plane_to_cell(&self, position: Vec2) -> GridCoord {
        GridCoord::new(
            ((position.x - self.world_min.x) * self.inv_cell_size).floor() as i32,
            ((position.y - self.world_min.y) * self.inv_cell_size).floor() as i32,
        )
    }

    /// Cell center on the ground plane
    #[inline]
    pub fn cell_to_world(&self, coord: GridCoord) -> Vec3 {
        Vec3::on_ground(
            self.world_min.x + (coord.x as f32 + 0.5) * self.cell_size,
            self.world_min.y + (coord.y as f32 + 0.5) * self.cell_size,
        )
    }

    #[inline]
    pub fn in_bounds(&self, coord: GridCoord) -> bool {
        coord.x >= 0 && coord.x < self.cols && coord.y >= 0 && coord.y < self.rows
    }

    /// Nearest in-bounds coordinate
    pub fn clamp(&self, coord: GridCoord) -> GridCoord {
        GridCoord::new(coord.x.clamp(0, self.cols - 1), coord.y.clamp(0, self.rows - 1))
    }

    /// In bounds and holding at least one location
    #[inline]
    pub fn is_valid(&self, coord: GridCoord) -> bool {
        self.cell(coord).is_some_and(Cell::has_locations)
    }

    /// Row-major index of an in-bounds coordinate
    #[inline]
    pub fn index(&self, coord: GridCoord) -> Option<usize> {
        self.in_bounds(coord)
            .then(|| (coord.y * self.cols + coord.x) as usize)
    }

    #[inline]
    pub fn coord_at(&self, index: usize) -> GridCoord {
        let index = index as i32;
        GridCoord::new(index % self.cols, index / self.cols)
    }

    pub fn cell(&self, coord: GridCoord) -> Option<&Cell> {
        self.index(coord).map(|i| &self.cells[i])
    }

    pub(crate) fn cell_mut(&mut self, coord: GridCoord) -> Option<&mut Cell> {
        self.index(coord).map(move |i| &mut self.cells[i])
    }

    /// All cells with their coordinates, row-major
    pub fn iter(&self) -> impl Iterator<Item = (GridCoord, &Cell)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, cell)| (self.coord_at(i), cell))
    }

    pub fn valid_cell_count(&self) -> usize {
        self.cells.iter().filter(|c| c.has_locations()).count()
    }

    pub fn location_count(&self) -> usize {
        self.cells.iter().map(|c| c.locations.len()).sum()
    }

    /// Get statistics about the grid
    pub fn stats(&self) -> GridStats {
        GridStats {
            cells: self.cells.len(),
            valid_cells: self.valid_cell_count(),
            locations: self.location_count(),
            total_congestion: self.cells.iter().map(|c| c.congestion as u64).sum(),
            max_congestion: self.cells.iter().map(|c| c.congestion).max().unwrap_or(0),
        }
    }
}

/// Statistics about the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridStats {
    pub cells: usize,
    pub valid_cells: usize,
    pub locations: usize,
    pub total_congestion: u64,
    pub max_congestion: u32,
}
