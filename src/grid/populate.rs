//! Location population
//!
//! Fills the grid once per session. Designer-placed candidates are snapped to
//! walkable ground and bucketed first; every cell still empty afterwards is
//! sampled on a sub-grid and each sample must prove it can reach an existing
//! location before it is accepted as a synthetic location.

use bitvec::vec::BitVec;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::VecDeque;
use tracing::{debug, info};

use crate::grid::constants::population::SYNTHETIC_RESOLUTION;
use crate::grid::spatial::{GridCoord, SpatialGrid};
use crate::navigation::gatherer::{LocationFactory, RawLocation};
use crate::navigation::location::Location;
use crate::navigation::mesh::NavMesh;
use crate::util::vec3::Vec3;

/// Outcome of a population pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PopulationReport {
    /// Raw candidates received
    pub candidates: usize,
    /// Candidates snapped and placed into a cell
    pub placed: usize,
    /// Candidates too far from walkable ground
    pub unreachable: usize,
    /// Candidates whose snapped position fell outside the grid
    pub out_of_bounds: usize,
    /// Synthetic locations created
    pub synthetic: usize,
    /// Cells that received synthetic locations
    pub synthetic_cells: usize,
    /// Cells left without locations; excluded for the whole session
    pub abandoned_cells: Vec<GridCoord>,
}

/// Populate `grid` from raw candidates, then synthesize locations for empty cells.
pub fn populate<N, R>(
    grid: &mut SpatialGrid,
    candidates: impl IntoIterator<Item = RawLocation>,
    nav: &N,
    rng: &mut R,
) -> PopulationReport
where
    N: NavMesh + ?Sized,
    R: Rng + ?Sized,
{
    let mut report = PopulationReport::default();
    let mut factory = LocationFactory::new(grid.cell_size());

    let mut locations: Vec<Location> = candidates
        .into_iter()
        .filter_map(|raw| {
            report.candidates += 1;
            let location = factory.validate(&raw, nav);
            if location.is_none() {
                report.unreachable += 1;
            }
            location
        })
        .collect();
    locations.shuffle(rng);

    for location in locations {
        let coord = grid.world_to_cell(location.position);
        match grid.cell_mut(coord) {
            Some(cell) => {
                cell.push_location(location);
                report.placed += 1;
            }
            None => {
                debug!("Dropping {} at {:?}: outside grid ({})", location, location.position, coord);
                report.out_of_bounds += 1;
            }
        }
    }

    let world_size = grid.world_max() - grid.world_min();
    let search_radius = world_size.x.max(world_size.y) / 2.0;

    // x outer, y inner; earlier synthetic locations are connection targets for later cells
    let size = grid.size();
    let coords: Vec<GridCoord> = (0..size.x)
        .flat_map(|x| (0..size.y).map(move |y| GridCoord::new(x, y)))
        .collect();
    for coord in coords {
        if grid.is_valid(coord) {
            continue;
        }

        debug!("Cell {} has no builtin locations, attempting synthetic population", coord);

        let added = populate_cell(grid, coord, search_radius, nav, &mut factory);
        if added > 0 {
            report.synthetic += added;
            report.synthetic_cells += 1;
        } else {
            debug!("Cell {}: no reachable synthetic locations found", coord);
            report.abandoned_cells.push(coord);
        }
    }

    info!(
        "Populated {}x{} grid: {} placed, {} synthetic in {} cells, {} dropped, {} cells abandoned",
        grid.size().x,
        grid.size().y,
        report.placed,
        report.synthetic,
        report.synthetic_cells,
        report.unreachable + report.out_of_bounds,
        report.abandoned_cells.len()
    );

    report
}

/// Sample a sub-grid around the snapped cell center and keep the samples that
/// stay in the cell and connect to an existing location. Returns the number added.
fn populate_cell<N: NavMesh + ?Sized>(
    grid: &mut SpatialGrid,
    coord: GridCoord,
    search_radius: f32,
    nav: &N,
    factory: &mut LocationFactory,
) -> usize {
    let Some(center) = nav.sample_position(grid.cell_to_world(coord), search_radius) else {
        return 0;
    };
    if grid.world_to_cell(center) != coord {
        debug!("Cell {}: center snapped into {}", coord, grid.world_to_cell(center));
        return 0;
    }

    let sub_size = grid.cell_size() / 2.0;
    let spacing = sub_size / (SYNTHETIC_RESOLUTION - 1) as f32;
    let half = sub_size / 2.0;
    let mut added = 0;

    for zi in 0..SYNTHETIC_RESOLUTION {
        for xi in 0..SYNTHETIC_RESOLUTION {
            let candidate = Vec3::new(
                center.x + xi as f32 * spacing - half,
                center.y,
                center.z + zi as f32 * spacing - half,
            );

            let Some(snapped) = nav.sample_position(candidate, sub_size) else {
                continue;
            };
            if grid.world_to_cell(snapped) != coord {
                continue;
            }
            if !is_connected(grid, coord, snapped, nav) {
                continue;
            }

            let location = factory.synthetic(snapped);
            if let Some(cell) = grid.cell_mut(coord) {
                cell.push_location(location);
                added += 1;
            }
        }
    }

    debug!("Cell {}: found {} synthetic locations", coord, added);
    added
}

/// Breadth-first search outward from `start` over the 8-neighbourhood. True if
/// a path from `candidate` fully arrives at any location in a visited cell.
pub fn is_connected<N: NavMesh + ?Sized>(
    grid: &SpatialGrid,
    start: GridCoord,
    candidate: Vec3,
    nav: &N,
) -> bool {
    let Some(start_index) = grid.index(start) else {
        return false;
    };

    let mut visited: BitVec = BitVec::repeat(false, grid.cell_count());
    let mut queue = VecDeque::new();
    visited.set(start_index, true);
    queue.push_back(start);

    while let Some(current) = queue.pop_front() {
        if let Some(cell) = grid.cell(current) {
            let reachable = cell.locations().iter().any(|location| {
                nav.calculate_path(candidate, location.position)
                    .arrives_at(location.position)
            });
            if reachable {
                return true;
            }
        }

        for neighbor in current.neighbors() {
            if let Some(index) = grid.index(neighbor) {
                if !visited[index] {
                    visited.set(index, true);
                    queue.push_back(neighbor);
                }
            }
        }
    }

    false
}
