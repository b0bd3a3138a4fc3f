//! Raw candidate intake and location construction.

use serde::{Deserialize, Serialize};

use crate::grid::constants::population::{
    EXFIL_SNAP_TOLERANCE, LOOT_RADIUS, MIN_LOCATION_RADIUS, SNAP_TOLERANCE,
};
use crate::navigation::location::{Location, LocationCategory, LocationId};
use crate::navigation::mesh::NavMesh;
use crate::util::vec3::Vec3;

/// Unvalidated point of interest produced by a world scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLocation {
    pub category: LocationCategory,
    pub name: String,
    pub position: Vec3,
}

impl RawLocation {
    pub fn new(category: LocationCategory, name: impl Into<String>, position: Vec3) -> Self {
        Self {
            category,
            name: name.into(),
            position,
        }
    }
}

/// Snap tolerance for a candidate category
pub fn snap_tolerance(category: LocationCategory) -> f32 {
    match category {
        LocationCategory::Exfil => EXFIL_SNAP_TOLERANCE,
        _ => SNAP_TOLERANCE,
    }
}

/// Builds locations with session-unique ids and per-category radii
#[derive(Debug, Clone)]
pub struct LocationFactory {
    cell_size: f32,
    next_id: LocationId,
}

impl LocationFactory {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            next_id: 0,
        }
    }

    /// Number of locations created so far
    pub fn created(&self) -> u32 {
        self.next_id
    }

    /// Arrival radius for a category, never below the minimum
    pub fn radius(&self, category: LocationCategory) -> f32 {
        match category {
            LocationCategory::ContainerLoot | LocationCategory::LooseLoot => LOOT_RADIUS,
            LocationCategory::Quest | LocationCategory::Synthetic | LocationCategory::Exfil => {
                MIN_LOCATION_RADIUS.max(self.cell_size / 2.0)
            }
        }
    }

    /// Snap a raw candidate onto walkable ground. `None` means unreachable terrain.
    pub fn validate<N: NavMesh + ?Sized>(&mut self, raw: &RawLocation, nav: &N) -> Option<Location> {
        match nav.sample_position(raw.position, snap_tolerance(raw.category)) {
            Some(snapped) => Some(self.build(raw.category, raw.name.clone(), snapped)),
            None => {
                tracing::debug!(
                    "Skipping Location({:?}, {}, {:?}), too far from walkable ground",
                    raw.category,
                    raw.name,
                    raw.position
                );
                None
            }
        }
    }

    pub fn synthetic(&mut self, position: Vec3) -> Location {
        let name = format!("Synthetic_{}", self.next_id);
        self.build(LocationCategory::Synthetic, name, position)
    }

    fn build(&mut self, category: LocationCategory, name: String, position: Vec3) -> Location {
        let radius = self.radius(category);
        let location = Location::new(self.next_id, category, name, position, radius * radius);
        self.next_id += 1;
        location
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::flat::FlatNavMesh;
    use crate::util::vec2::Vec2;

    #[test]
    fn test_radius_by_category() {
        let factory = LocationFactory::new(50.0);
        assert_eq!(factory.radius(LocationCategory::ContainerLoot), 10.0);
        assert_eq!(factory.radius(LocationCategory::LooseLoot), 10.0);
        assert_eq!(factory.radius(LocationCategory::Quest), 25.0);
        assert_eq!(factory.radius(LocationCategory::Exfil), 25.0);

        // Small cells never shrink the radius below the minimum
        let small = LocationFactory::new(8.0);
        assert_eq!(small.radius(LocationCategory::Synthetic), 10.0);
    }

    #[test]
    fn test_sequential_ids() {
        let mut factory = LocationFactory::new(20.0);
        let a = factory.synthetic(Vec3::ZERO);
        let b = factory.synthetic(Vec3::ZERO);
        assert_eq!(a.id, 0);
        assert_eq!(b.id, 1);
        assert_eq!(b.name, "Synthetic_1");
        assert_eq!(b.radius_sqr, 100.0);
        assert_eq!(factory.created(), 2);
    }

    #[test]
    fn test_validate_snaps_or_drops() {
        let nav = FlatNavMesh::new(Vec2::new(0.0, 0.0), Vec2::new(100.0, 100.0));
        let mut factory = LocationFactory::new(20.0);

        let inside = RawLocation::new(LocationCategory::Quest, "q", Vec3::new(10.0, 3.0, 10.0));
        let snapped = factory.validate(&inside, &nav).unwrap();
        assert_eq!(snapped.position, Vec3::on_ground(10.0, 10.0));

        // 1.5 units outside the walkable area: within the 2.0 tolerance
        let near_edge = RawLocation::new(LocationCategory::Quest, "e", Vec3::on_ground(-1.5, 50.0));
        assert!(factory.validate(&near_edge, &nav).is_some());

        // 4 units outside: only exfils tolerate that
        let loot = RawLocation::new(LocationCategory::ContainerLoot, "l", Vec3::on_ground(-4.0, 50.0));
        let exfil = RawLocation::new(LocationCategory::Exfil, "x", Vec3::on_ground(-4.0, 50.0));
        assert!(factory.validate(&loot, &nav).is_none());
        assert!(factory.validate(&exfil, &nav).is_some());
    }
}
