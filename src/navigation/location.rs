use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::util::vec3::Vec3;

/// Location identifier, unique within a session
pub type LocationId = u32;

/// Kind of point of interest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocationCategory {
    ContainerLoot,
    LooseLoot,
    Quest,
    Synthetic,
    Exfil,
}

/// A navigable point of interest owned by exactly one grid cell.
/// Identity is the id; two locations with the same id are the same location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub category: LocationCategory,
    pub name: String,
    pub position: Vec3,
    pub radius_sqr: f32,
}

impl Location {
    pub fn new(
        id: LocationId,
        category: LocationCategory,
        name: impl Into<String>,
        position: Vec3,
        radius_sqr: f32,
    ) -> Self {
        Self {
            id,
            category,
            name: name.into(),
            position,
            radius_sqr,
        }
    }

    /// Whether a world position is inside the arrival radius
    #[inline]
    pub fn contains(&self, position: Vec3) -> bool {
        self.position.distance_sq_to(position) <= self.radius_sqr
    }
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Location {}

impl Hash for Location {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Location({}, {:?}, {})", self.id, self.category, self.name)
    }
}
