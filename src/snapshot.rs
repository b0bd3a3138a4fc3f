//! Serializable view of the grid for external visualization

use serde::{Deserialize, Serialize};

use crate::grid::spatial::{GridCoord, SpatialGrid};
use crate::grid::zones::{Zone, ZoneForceField};
use crate::util::vec2::Vec2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellSnapshot {
    pub coord: GridCoord,
    pub id: u32,
    pub congestion: u32,
    pub locations: usize,
    /// Flow vector at this cell
    pub flow: Vec2,
}

/// Point-in-time copy of grid dimensions, cells, flow field and zones
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSnapshot {
    pub size: GridCoord,
    pub world_min: Vec2,
    pub world_max: Vec2,
    pub cell_size: f32,
    /// Row-major
    pub cells: Vec<CellSnapshot>,
    pub zones: Vec<Zone>,
}

impl GridSnapshot {
    pub fn capture(grid: &SpatialGrid, field: &ZoneForceField) -> Self {
        let cells = grid
            .iter()
            .map(|(coord, cell)| CellSnapshot {
                coord,
                id: cell.id(),
                congestion: cell.congestion(),
                locations: cell.locations().len(),
                flow: field.vector_at(coord),
            })
            .collect();

        Self {
            size: grid.size(),
            world_min: grid.world_min(),
            world_max: grid.world_max(),
            cell_size: grid.cell_size(),
            cells,
            zones: field.zones().to_vec(),
        }
    }

    pub fn cell(&self, coord: GridCoord) -> Option<&CellSnapshot> {
        if coord.x < 0 || coord.x >= self.size.x || coord.y < 0 || coord.y >= self.size.y {
            return None;
        }
        self.cells.get((coord.y * self.size.x + coord.x) as usize)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ZoneScales;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_capture_and_serialize() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let grid = SpatialGrid::new(Vec2::ZERO, Vec2::new(40.0, 30.0), 10.0, &mut rng).unwrap();
        let mut field = ZoneForceField::new(&grid);
        field.rebuild(
            vec![Zone { coords: GridCoord::new(0, 0), radius: 100.0, force: 1.0, decay: 1.0 }],
            &ZoneScales::default(),
        );

        let snapshot = GridSnapshot::capture(&grid, &field);
        assert_eq!(snapshot.size, GridCoord::new(4, 3));
        assert_eq!(snapshot.cells.len(), 12);
        assert_eq!(snapshot.zones.len(), 1);

        let cell = snapshot.cell(GridCoord::new(3, 2)).unwrap();
        assert_eq!(cell.coord, GridCoord::new(3, 2));
        assert_eq!(cell.id, grid.cell(GridCoord::new(3, 2)).unwrap().id());
        assert!(cell.flow.x < 0.0 && cell.flow.y < 0.0);
        assert!(snapshot.cell(GridCoord::new(4, 0)).is_none());

        let json = snapshot.to_json().unwrap();
        let parsed: GridSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, snapshot);
    }
}
