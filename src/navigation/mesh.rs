//! Navigability oracle consumed by location population.

use crate::grid::constants::population::PATH_ARRIVAL_TOLERANCE_SQ;
use crate::util::vec3::Vec3;

/// Result of a path query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NavPath {
    /// Ordered path corners, origin first
    pub corners: Vec<Vec3>,
    /// Whether the pathfinder reached the destination. A partial path may
    /// still carry corners that stop short of it.
    pub complete: bool,
}

impl NavPath {
    pub fn complete(corners: Vec<Vec3>) -> Self {
        Self {
            corners,
            complete: true,
        }
    }

    pub fn partial(corners: Vec<Vec3>) -> Self {
        Self {
            corners,
            complete: false,
        }
    }

    /// Complete and the last corner lies within the arrival tolerance of `target`
    pub fn arrives_at(&self, target: Vec3) -> bool {
        self.complete
            && self
                .corners
                .last()
                .is_some_and(|last| last.distance_sq_to(target) <= PATH_ARRIVAL_TOLERANCE_SQ)
    }
}

/// Walkable-surface queries
pub trait NavMesh {
    /// Nearest walkable point within `max_distance` of `position`
    fn sample_position(&self, position: Vec3, max_distance: f32) -> Option<Vec3>;

    /// Path between two points
    fn calculate_path(&self, origin: Vec3, destination: Vec3) -> NavPath;
}

impl<T: NavMesh + ?Sized> NavMesh for &T {
    fn sample_position(&self, position: Vec3, max_distance: f32) -> Option<Vec3> {
        (**self).sample_position(position, max_distance)
    }

    fn calculate_path(&self, origin: Vec3, destination: Vec3) -> NavPath {
        (**self).calculate_path(origin, destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arrives_at() {
        let target = Vec3::on_ground(10.0, 0.0);
        let path = NavPath::complete(vec![Vec3::ZERO, Vec3::on_ground(9.5, 0.0)]);
        assert!(path.arrives_at(target));
    }

    #[test]
    fn test_short_path_does_not_arrive() {
        let target = Vec3::on_ground(10.0, 0.0);
        // Corners present but the path stops 5 units short
        let path = NavPath::complete(vec![Vec3::ZERO, Vec3::on_ground(5.0, 0.0)]);
        assert!(!path.arrives_at(target));
    }

    #[test]
    fn test_partial_path_does_not_arrive() {
        let target = Vec3::on_ground(10.0, 0.0);
        let path = NavPath::partial(vec![Vec3::ZERO, target]);
        assert!(!path.arrives_at(target));
        assert!(!NavPath::default().arrives_at(target));
    }
}
