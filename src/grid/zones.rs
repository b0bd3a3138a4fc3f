//! Zone advection field
//!
//! Every cell carries a 2D flow vector. Zones contribute a radial pull (positive
//! force) or push (negative force) that falls off with distance; assignments
//! add a reversible repulsion around the assigned cell. Agents pick neighbours
//! that line up with the flow at their current cell.

use rand::Rng;
#[cfg(feature = "parallel_field")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{MapZones, ValueRange, ZoneScales};
use crate::grid::constants::zones::MIN_ZONE_RADIUS;
use crate::grid::spatial::{GridCoord, SpatialGrid};
use crate::util::vec2::Vec2;
use crate::util::vec3::Vec3;

/// Zone calculation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ZoneError {
    #[error("zone '{zone}': radius must be greater than or equal to 1, got {radius}")]
    RadiusTooSmall { zone: String, radius: f32 },
    #[error("zone '{zone}': decay must be finite and non-negative, got {decay}")]
    InvalidDecay { zone: String, decay: f32 },
}

/// Named anchor point in the world that builtin zones attach to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneMarker {
    pub name: String,
    pub position: Vec3,
}

impl ZoneMarker {
    pub fn new(name: impl Into<String>, position: Vec3) -> Self {
        Self {
            name: name.into(),
            position,
        }
    }
}

/// Sampled zone. Radius and force are fixed until the next zone calculation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub coords: GridCoord,
    /// World units, before the radius scale
    pub radius: f32,
    /// Positive attracts, negative repels
    pub force: f32,
    /// Falloff exponent: 1 linear, below 1 sublinear, above 1 steeper
    pub decay: f32,
}

impl Zone {
    /// Contribution of this zone to the flow at `cell`
    pub fn contribution(&self, cell: Vec2, cell_size: f32, scales: &ZoneScales) -> Vec2 {
        let center = self.coords.as_vec2();
        let world_distance = center.distance_to(cell) * cell_size;
        let falloff = (1.0 - world_distance / (self.radius * scales.radius)).clamp(0.0, 1.0);
        let strength = falloff.powf(self.decay * scales.decay) * self.force * scales.force;
        (center - cell).normalize() * strength
    }
}

fn check_definition(zone: &str, radius: &ValueRange, decay: f32) -> Result<(), ZoneError> {
    let min = radius.lower();
    if min < MIN_ZONE_RADIUS || !min.is_finite() {
        return Err(ZoneError::RadiusTooSmall {
            zone: zone.to_string(),
            radius: min,
        });
    }
    // 0^decay must stay finite outside the radius
    if !decay.is_finite() || decay < 0.0 {
        return Err(ZoneError::InvalidDecay {
            zone: zone.to_string(),
            decay,
        });
    }
    Ok(())
}

/// Resolve zone definitions into sampled zones.
///
/// Builtin zones attach to every marker whose name they match, in marker order;
/// custom zones follow in definition order. All radii are validated before any
/// sampling so a bad definition leaves no partial result.
pub fn resolve_zones<R: Rng + ?Sized>(
    grid: &SpatialGrid,
    definitions: &MapZones,
    markers: &[ZoneMarker],
    rng: &mut R,
) -> Result<Vec<Zone>, ZoneError> {
    let builtin: Vec<_> = markers
        .iter()
        .filter_map(|marker| {
            definitions
                .builtin_zones
                .get(&marker.name)
                .map(|zone| (marker, zone))
        })
        .collect();

    for (marker, zone) in &builtin {
        check_definition(&marker.name, &zone.radius, zone.decay)?;
    }
    for (i, zone) in definitions.custom_zones.iter().enumerate() {
        check_definition(&format!("custom #{}", i), &zone.radius, zone.decay)?;
    }

    let mut zones = Vec::with_capacity(builtin.len() + definitions.custom_zones.len());

    for (marker, zone) in builtin {
        zones.push(Zone {
            coords: grid.world_to_cell(marker.position),
            radius: zone.radius.sample_gaussian(rng),
            force: zone.force.sample_gaussian(rng),
            decay: zone.decay,
        });
    }

    for zone in &definitions.custom_zones {
        zones.push(Zone {
            coords: grid.plane_to_cell(zone.position),
            radius: zone.radius.sample_gaussian(rng),
            force: zone.force.sample_gaussian(rng),
            decay: zone.decay,
        });
    }

    Ok(zones)
}

/// Dense per-cell flow field
#[derive(Debug, Clone)]
pub struct ZoneForceField {
    size: GridCoord,
    cell_size: f32,
    /// Row-major, same layout as the grid
    field: Vec<Vec2>,
    zones: Vec<Zone>,
}

impl ZoneForceField {
    /// Zero field sized to the grid
    pub fn new(grid: &SpatialGrid) -> Self {
        Self {
            size: grid.size(),
            cell_size: grid.cell_size(),
            field: vec![Vec2::ZERO; grid.cell_count()],
            zones: Vec::new(),
        }
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    /// Raw field, row-major
    pub fn field(&self) -> &[Vec2] {
        &self.field
    }

    #[inline]
    fn index(&self, coord: GridCoord) -> Option<usize> {
        (coord.x >= 0 && coord.x < self.size.x && coord.y >= 0 && coord.y < self.size.y)
            .then(|| (coord.y * self.size.x + coord.x) as usize)
    }

    /// Flow at a cell; zero outside the grid
    pub fn vector_at(&self, coord: GridCoord) -> Vec2 {
        self.index(coord).map_or(Vec2::ZERO, |i| self.field[i])
    }

    /// Replace the zones and recompute the zone baseline.
    /// Assignment forces are cleared; the caller replays them.
    pub fn rebuild(&mut self, zones: Vec<Zone>, scales: &ZoneScales) {
        self.zones = zones;

        let cols = self.size.x as usize;
        let cell_size = self.cell_size;
        let zones = &self.zones;

        let fill_row = |(y, row): (usize, &mut [Vec2])| {
            for (x, value) in row.iter_mut().enumerate() {
                let cell = Vec2::new(x as f32, y as f32);
                let mut total = Vec2::ZERO;
                for zone in zones {
                    total += zone.contribution(cell, cell_size, scales);
                }
                *value = total;
            }
        };

        #[cfg(feature = "parallel_field")]
        self.field.par_chunks_mut(cols).enumerate().for_each(fill_row);
        #[cfg(not(feature = "parallel_field"))]
        self.field.chunks_mut(cols).enumerate().for_each(fill_row);

        info!("Calculated {} zones over {}x{} cells", self.zones.len(), self.size.x, self.size.y);
        for zone in &self.zones {
            debug!(
                "Zone at {}: radius {:.1}, force {:.2}, decay {:.2}",
                zone.coords, zone.radius, zone.force, zone.decay
            );
        }
    }

    /// Push `sign * base_force / |d|^2` along `d` into every in-bounds cell of the
    /// square ring of Chebyshev radius `ring` around `source`, source excluded.
    /// Applying `+1` then `-1` with the same arguments restores the field.
    pub fn propagate_force(&mut self, source: GridCoord, sign: f32, base_force: f32, ring: i32) {
        for dx in -ring..=ring {
            for dy in -ring..=ring {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let offset = GridCoord::new(dx, dy);
                let Some(index) = self.index(source + offset) else {
                    continue;
                };
                let direction = offset.as_vec2();
                let magnitude = sign * base_force / offset.length_sq() as f32;
                self.field[index] += direction.normalize() * magnitude;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BuiltinZone, CustomZone};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn grid(cells: i32, cell_size: f32) -> SpatialGrid {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let size = cells as f32 * cell_size;
        SpatialGrid::new(Vec2::ZERO, Vec2::new(size, size), cell_size, &mut rng).unwrap()
    }

    fn fixed(v: f32) -> ValueRange {
        ValueRange::new(v, v)
    }

    fn zone(x: i32, y: i32, radius: f32, force: f32) -> Zone {
        Zone {
            coords: GridCoord::new(x, y),
            radius,
            force,
            decay: 1.0,
        }
    }

    #[test]
    fn test_no_zones_is_zero_field() {
        let grid = grid(6, 10.0);
        let mut field = ZoneForceField::new(&grid);
        field.rebuild(Vec::new(), &ZoneScales::default());
        assert!(field.field().iter().all(|v| *v == Vec2::ZERO));
    }

    #[test]
    fn test_attractor_falls_off_with_distance() {
        let grid = grid(9, 10.0);
        let mut field = ZoneForceField::new(&grid);
        field.rebuild(vec![zone(4, 4, 1000.0, 5.0)], &ZoneScales::default());

        let near = field.vector_at(GridCoord::new(4, 3));
        let far = field.vector_at(GridCoord::new(0, 0));
        assert!(near.length() > far.length());
        assert!(far.length() > 0.0);

        // Attraction points toward the zone
        assert!(near.y > 0.0 && near.x.abs() < 1e-5);
        assert!(far.x > 0.0 && far.y > 0.0);

        // The zone cell itself has no direction
        assert_eq!(field.vector_at(GridCoord::new(4, 4)), Vec2::ZERO);
    }

    #[test]
    fn test_contribution_formula() {
        let z = zone(0, 0, 100.0, 2.0);
        // Three cells east at 10 units per cell: 1 - 30 / 100 = 0.7
        let v = z.contribution(Vec2::new(3.0, 0.0), 10.0, &ZoneScales::default());
        assert!(v.approx_eq(Vec2::new(-1.4, 0.0), 1e-5));

        // Radius scale doubles reach, decay 2 squares the falloff
        let scales = ZoneScales { radius: 2.0, force: 1.0, decay: 2.0 };
        let v = z.contribution(Vec2::new(3.0, 0.0), 10.0, &scales);
        assert!(v.approx_eq(Vec2::new(-2.0 * 0.85 * 0.85, 0.0), 1e-5));

        // Outside the radius nothing is felt
        let v = z.contribution(Vec2::new(20.0, 0.0), 10.0, &ZoneScales::default());
        assert_eq!(v, Vec2::ZERO);
    }

    #[test]
    fn test_zone_contributions_add() {
        let grid = grid(8, 10.0);
        let a = zone(1, 1, 60.0, 3.0);
        let b = zone(6, 5, 40.0, -2.0);
        let scales = ZoneScales::default();

        let mut only_a = ZoneForceField::new(&grid);
        only_a.rebuild(vec![a], &scales);
        let mut only_b = ZoneForceField::new(&grid);
        only_b.rebuild(vec![b], &scales);
        let mut both = ZoneForceField::new(&grid);
        both.rebuild(vec![a, b], &scales);

        for i in 0..grid.cell_count() {
            let sum = only_a.field()[i] + only_b.field()[i];
            assert!(both.field()[i].approx_eq(sum, 1e-5));
        }
    }

    #[test]
    fn test_propagate_round_trip() {
        let grid = grid(10, 10.0);
        let mut field = ZoneForceField::new(&grid);
        field.rebuild(vec![zone(2, 7, 80.0, 1.5)], &ZoneScales::default());
        let baseline = field.field().to_vec();

        field.propagate_force(GridCoord::new(5, 5), 1.0, 0.25, 3);
        assert_ne!(field.field(), baseline.as_slice());
        field.propagate_force(GridCoord::new(5, 5), -1.0, 0.25, 3);

        for (after, before) in field.field().iter().zip(&baseline) {
            assert!(after.approx_eq(*before, 1e-5));
        }
    }

    #[test]
    fn test_propagate_pushes_away_and_skips_out_of_bounds() {
        let grid = grid(5, 10.0);
        let mut field = ZoneForceField::new(&grid);
        field.propagate_force(GridCoord::new(0, 0), 1.0, 1.0, 3);

        assert_eq!(field.vector_at(GridCoord::new(0, 0)), Vec2::ZERO);
        assert!(field.vector_at(GridCoord::new(1, 0)).approx_eq(Vec2::new(1.0, 0.0), 1e-6));
        // |d|^2 = 4 two cells away
        assert!(field.vector_at(GridCoord::new(0, 2)).approx_eq(Vec2::new(0.0, 0.25), 1e-6));
        // Beyond the ring
        assert_eq!(field.vector_at(GridCoord::new(4, 0)), Vec2::ZERO);
    }

    #[test]
    fn test_resolve_builtin_and_custom() {
        let grid = grid(10, 10.0);
        let mut definitions = MapZones::default();
        definitions
            .builtin_zones
            .insert("ZoneDormitory".to_string(), BuiltinZone::new(fixed(50.0), fixed(2.0)).with_decay(0.5));
        definitions
            .custom_zones
            .push(CustomZone::new(Vec2::new(85.0, 15.0), fixed(30.0), fixed(-1.0)));

        let markers = vec![
            ZoneMarker::new("ZoneUnknown", Vec3::on_ground(5.0, 5.0)),
            ZoneMarker::new("ZoneDormitory", Vec3::new(42.0, 7.0, 61.0)),
        ];

        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let zones = resolve_zones(&grid, &definitions, &markers, &mut rng).unwrap();
        assert_eq!(zones.len(), 2);
        assert_eq!(zones[0], Zone { coords: GridCoord::new(4, 6), radius: 50.0, force: 2.0, decay: 0.5 });
        assert_eq!(zones[1], Zone { coords: GridCoord::new(8, 1), radius: 30.0, force: -1.0, decay: 1.0 });
    }

    #[test]
    fn test_small_radius_is_rejected() {
        let grid = grid(4, 10.0);
        let mut definitions = MapZones::default();
        definitions
            .custom_zones
            .push(CustomZone::new(Vec2::new(5.0, 5.0), ValueRange::new(20.0, 0.5), fixed(1.0)));

        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let err = resolve_zones(&grid, &definitions, &[], &mut rng).unwrap_err();
        assert!(matches!(err, ZoneError::RadiusTooSmall { radius, .. } if radius == 0.5));
    }

    #[test]
    fn test_negative_decay_is_rejected() {
        let grid = grid(10, 10.0);
        let mut definitions = MapZones::default();
        definitions
            .custom_zones
            .push(CustomZone::new(Vec2::new(15.0, 15.0), fixed(20.0), fixed(1.0)).with_decay(-1.0));

        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let err = resolve_zones(&grid, &definitions, &[], &mut rng).unwrap_err();
        assert_eq!(err, ZoneError::InvalidDecay { zone: "custom #0".to_string(), decay: -1.0 });

        definitions.custom_zones[0].decay = f32::NAN;
        let err = resolve_zones(&grid, &definitions, &[], &mut rng).unwrap_err();
        assert!(matches!(err, ZoneError::InvalidDecay { decay, .. } if decay.is_nan()));

        // Zero decay is a flat plateau inside the radius and stays finite outside it
        definitions.custom_zones[0].decay = 0.0;
        let zones = resolve_zones(&grid, &definitions, &[], &mut rng).unwrap();
        let mut field = ZoneForceField::new(&grid);
        field.rebuild(zones, &ZoneScales::default());
        assert!(field.field().iter().all(|v| v.x.is_finite() && v.y.is_finite()));
    }

    #[test]
    fn test_unmatched_builtin_is_not_validated() {
        let grid = grid(4, 10.0);
        let mut definitions = MapZones::default();
        definitions
            .builtin_zones
            .insert("ZoneNowhere".to_string(), BuiltinZone::new(fixed(0.1), fixed(1.0)));

        let mut rng = ChaCha8Rng::seed_from_u64(9);
        assert!(resolve_zones(&grid, &definitions, &[], &mut rng).unwrap().is_empty());
    }
}
