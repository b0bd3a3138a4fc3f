//! Congestion-aware location allocator
//!
//! One [`LocationSystem`] per world session. Agents ask for a location near
//! their position; the allocator steers them to a neighbouring cell chosen by
//! travel momentum, the zone flow at their cell and a little jitter, and falls
//! back to the globally least congested cell when no neighbour fits. Each
//! assignment pushes a repulsion into the flow field that release takes back out.

use hashbrown::HashMap;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use smallvec::SmallVec;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{maps, AllocatorConfig, ConfigError, MapGeometry, MapZones, ZoneScales};
use crate::grid::congestion::CongestionIndex;
use crate::grid::populate::{populate, PopulationReport};
use crate::grid::spatial::{GridCoord, GridError, SpatialGrid};
use crate::grid::zones::{resolve_zones, Zone, ZoneError, ZoneForceField, ZoneMarker};
use crate::metrics::{LocationMetrics, PickKind};
use crate::navigation::gatherer::RawLocation;
use crate::navigation::location::Location;
use crate::navigation::mesh::NavMesh;
use crate::snapshot::GridSnapshot;
use crate::util::vec2::Vec2;
use crate::util::vec3::Vec3;

/// Errors building or reconfiguring a location system
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SystemError {
    #[error("unknown map id '{0}'")]
    UnknownMap(String),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("grid error: {0}")]
    Grid(#[from] GridError),
    #[error("zone error: {0}")]
    Zone(#[from] ZoneError),
}

/// An entity's current hold on a location
#[derive(Debug, Clone)]
pub struct Assignment {
    pub cell: GridCoord,
    pub location: Arc<Location>,
}

/// Location allocator for one world session
#[derive(Debug)]
pub struct LocationSystem<E> {
    grid: SpatialGrid,
    field: ZoneForceField,
    index: CongestionIndex,
    assignments: HashMap<E, Assignment>,
    definitions: MapZones,
    markers: Vec<ZoneMarker>,
    config: AllocatorConfig,
    rng: ChaCha8Rng,
    population: PopulationReport,
    metrics: Arc<LocationMetrics>,
}

impl<E> LocationSystem<E>
where
    E: Eq + Hash + Clone + Debug,
{
    /// Build the grid, populate it from `candidates` and compute the zone field.
    pub fn new<N: NavMesh + ?Sized>(
        geometry: &MapGeometry,
        definitions: MapZones,
        markers: Vec<ZoneMarker>,
        config: AllocatorConfig,
        candidates: impl IntoIterator<Item = RawLocation>,
        nav: &N,
    ) -> Result<Self, SystemError> {
        config.validate()?;
        geometry.validate()?;

        let mut rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let mut grid = SpatialGrid::from_geometry(geometry, &mut rng)?;
        let population = populate(&mut grid, candidates, nav, &mut rng);
        let index = CongestionIndex::build(&grid);
        let field = ZoneForceField::new(&grid);

        let metrics = Arc::new(LocationMetrics::new());
        metrics.valid_cells.store(grid.valid_cell_count() as u64, Ordering::Relaxed);
        metrics.locations.store(grid.location_count() as u64, Ordering::Relaxed);

        let mut system = Self {
            grid,
            field,
            index,
            assignments: HashMap::new(),
            definitions,
            markers,
            config,
            rng,
            population,
            metrics,
        };
        system.calculate_zones()?;

        let size = system.grid.size();
        info!(
            "Location grid size: {}x{}, cell size: {:.1}, locations: {}, valid cells: {}",
            size.x,
            size.y,
            system.grid.cell_size(),
            system.grid.location_count(),
            system.index.len()
        );
        info!(
            "Location grid world bounds: [{:.0},{:.0}] -> [{:.0},{:.0}]",
            geometry.min.x, geometry.min.y, geometry.max.x, geometry.max.y
        );

        Ok(system)
    }

    /// Build a system from the built-in geometry and zone tables of a map
    pub fn for_map<N: NavMesh + ?Sized>(
        map_id: &str,
        markers: Vec<ZoneMarker>,
        config: AllocatorConfig,
        candidates: impl IntoIterator<Item = RawLocation>,
        nav: &N,
    ) -> Result<Self, SystemError> {
        let geometry =
            maps::geometry(map_id).ok_or_else(|| SystemError::UnknownMap(map_id.to_string()))?;
        Self::new(&geometry, maps::zones(map_id), markers, config, candidates, nav)
    }

    /// Assign a location near `world_pos` to `entity`, releasing any location
    /// it already holds. `None` means no cell in the world has locations.
    pub fn request_near(
        &mut self,
        entity: E,
        world_pos: Vec3,
        previous: Option<&Location>,
    ) -> Option<Arc<Location>> {
        let started = Instant::now();
        self.metrics.requests.fetch_add(1, Ordering::Relaxed);

        self.unassign(&entity);

        let request = self.grid.clamp(self.grid.world_to_cell(world_pos));
        let previous_cell = previous.map_or(request, |l| self.grid.world_to_cell(l.position));

        let neighbors: SmallVec<[GridCoord; 8]> = request
            .neighbors()
            .filter(|&coord| self.grid.is_valid(coord))
            .collect();

        let momentum = (request - previous_cell).as_vec2().normalize();
        let advection = self.field.vector_at(request);
        let jitter = Vec2::random_in_unit_circle(&mut self.rng);
        let preference = momentum * self.config.momentum_weight
            + advection
            + jitter * self.config.jitter_weight;

        debug!(
            "Requesting location around {} with previous cell {}: preference {:?} (momentum {:?}, advection {:?}, jitter {:?})",
            request, previous_cell, preference, momentum, advection, jitter
        );

        let chosen = if preference.is_zero() {
            if self.grid.is_valid(request) {
                Some((request, PickKind::CurrentCell))
            } else {
                self.index.least_congested().map(|coord| (coord, PickKind::Far))
            }
        } else {
            best_neighbor(request, &neighbors, preference)
                .map(|coord| (coord, PickKind::Neighbor))
                .or_else(|| self.index.least_congested().map(|coord| (coord, PickKind::Far)))
        };

        let Some((coord, kind)) = chosen else {
            debug!("No valid cells, request for {:?} unanswered", entity);
            self.metrics.empty_results.fetch_add(1, Ordering::Relaxed);
            self.metrics.record_request_time(started.elapsed());
            return None;
        };

        debug!("Picked {} ({:?})", coord, kind);
        self.metrics.record_pick(kind);
        let result = self.assign(entity, coord);
        self.metrics.record_request_time(started.elapsed());

        result
    }

    /// Return the entity's location to the pool. No-op if it holds none.
    pub fn release(&mut self, entity: &E) -> bool {
        match self.unassign(entity) {
            Some(assignment) => {
                self.metrics.releases.fetch_add(1, Ordering::Relaxed);
                debug!("Released {} held by {:?}", assignment.location, entity);
                true
            }
            None => false,
        }
    }

    /// Re-sample every zone and rebuild the field, then replay the force of all
    /// active assignments. On error the previous zones and field are kept.
    pub fn calculate_zones(&mut self) -> Result<(), ZoneError> {
        let started = Instant::now();
        let zones = resolve_zones(&self.grid, &self.definitions, &self.markers, &mut self.rng)?;

        self.field.rebuild(zones, &self.config.scales);

        let mut active: Vec<GridCoord> = self.assignments.values().map(|a| a.cell).collect();
        active.sort_unstable();
        for coord in active {
            self.field.propagate_force(
                coord,
                1.0,
                self.config.congestion_force,
                self.config.congestion_ring,
            );
        }

        self.metrics.record_zone_calculation(started.elapsed());
        Ok(())
    }

    /// Change the runtime zone scales and recompute the field
    pub fn set_zone_scales(&mut self, scales: ZoneScales) -> Result<(), SystemError> {
        scales.validate()?;
        if scales == self.config.scales {
            return Ok(());
        }

        let previous = std::mem::replace(&mut self.config.scales, scales);
        if let Err(e) = self.calculate_zones() {
            self.config.scales = previous;
            return Err(e.into());
        }
        info!(
            "Zone scales changed: radius {:.2}, force {:.2}, decay {:.2}",
            scales.radius, scales.force, scales.decay
        );
        Ok(())
    }

    /// Replace the zone definitions and recompute the field
    pub fn set_zone_definitions(&mut self, definitions: MapZones) -> Result<(), SystemError> {
        let previous = std::mem::replace(&mut self.definitions, definitions);
        if let Err(e) = self.calculate_zones() {
            self.definitions = previous;
            return Err(e.into());
        }
        Ok(())
    }

    fn assign(&mut self, entity: E, coord: GridCoord) -> Option<Arc<Location>> {
        let cell = self.grid.cell_mut(coord)?;
        let location = cell.locations().choose(&mut self.rng).cloned()?;

        let old = cell.congestion();
        cell.increment_congestion();
        self.index.update(coord, cell.id(), old, cell.congestion());

        self.field.propagate_force(
            coord,
            1.0,
            self.config.congestion_force,
            self.config.congestion_ring,
        );

        self.assignments.insert(
            entity,
            Assignment {
                cell: coord,
                location: Arc::clone(&location),
            },
        );
        self.metrics
            .active_assignments
            .store(self.assignments.len() as u64, Ordering::Relaxed);

        Some(location)
    }

    fn unassign(&mut self, entity: &E) -> Option<Assignment> {
        let assignment = self.assignments.remove(entity)?;
        let coord = assignment.cell;

        if let Some(cell) = self.grid.cell_mut(coord) {
            let old = cell.congestion();
            if !cell.decrement_congestion() {
                warn!("Returning {} to the pool resulted in negative congestion", assignment.location);
                self.metrics.congestion_clamps.fetch_add(1, Ordering::Relaxed);
            }
            self.index.update(coord, cell.id(), old, cell.congestion());
        }

        self.field.propagate_force(
            coord,
            -1.0,
            self.config.congestion_force,
            self.config.congestion_ring,
        );
        self.metrics
            .active_assignments
            .store(self.assignments.len() as u64, Ordering::Relaxed);

        Some(assignment)
    }

    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    pub fn grid_size(&self) -> GridCoord {
        self.grid.size()
    }

    /// World bounds as (min, max) on the horizontal plane
    pub fn world_bounds(&self) -> (Vec2, Vec2) {
        (self.grid.world_min(), self.grid.world_max())
    }

    pub fn congestion_at(&self, coord: GridCoord) -> Option<u32> {
        self.grid.cell(coord).map(|c| c.congestion())
    }

    pub fn locations_at(&self, coord: GridCoord) -> &[Arc<Location>] {
        self.grid.cell(coord).map_or(&[], |c| c.locations())
    }

    pub fn field(&self) -> &ZoneForceField {
        &self.field
    }

    pub fn zones(&self) -> &[Zone] {
        self.field.zones()
    }

    pub fn assignment(&self, entity: &E) -> Option<&Assignment> {
        self.assignments.get(entity)
    }

    pub fn active_assignments(&self) -> usize {
        self.assignments.len()
    }

    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    pub fn population(&self) -> &PopulationReport {
        &self.population
    }

    pub fn metrics(&self) -> Arc<LocationMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Read-only copy of the grid state for external visualization
    pub fn snapshot(&self) -> GridSnapshot {
        GridSnapshot::capture(&self.grid, &self.field)
    }
}

/// Neighbour with the smallest angle to `preference`; the first one wins ties
fn best_neighbor(request: GridCoord, neighbors: &[GridCoord], preference: Vec2) -> Option<GridCoord> {
    let direction = preference.normalize();
    let mut best: Option<(f32, GridCoord)> = None;

    for &neighbor in neighbors {
        let angle = (neighbor - request).as_vec2().angle_between(direction);
        if best.map_or(true, |(best_angle, _)| angle < best_angle) {
            best = Some((angle, neighbor));
        }
    }

    best.map(|(_, coord)| coord)
}
