//! Flat walkable plane with rectangular obstacles.
//!
//! Paths are straight segments: a segment that crosses an obstacle yields a
//! partial path ending just before it. Used by the simulation binary and by
//! tests that need controllable terrain.

use crate::navigation::mesh::{NavMesh, NavPath};
use crate::util::vec2::Vec2;
use crate::util::vec3::Vec3;

/// Directions tried per ring when searching for the nearest walkable point
const SNAP_DIRECTIONS: usize = 16;

/// Upper bound on rings per snap search
const SNAP_MAX_RINGS: usize = 64;

/// Smallest ring spacing (world units)
const SNAP_MIN_RING_STEP: f32 = 0.25;

/// Partial paths stop this far before the obstacle edge (world units)
const PATH_STOP_MARGIN: f32 = 0.1;

/// Axis-aligned rectangle on the horizontal plane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self {
            min: Vec2::new(min.x.min(max.x), min.y.min(max.y)),
            max: Vec2::new(min.x.max(max.x), min.y.max(max.y)),
        }
    }

    /// Closed containment (edges included)
    #[inline]
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// Open containment (edges excluded)
    #[inline]
    fn contains_interior(&self, p: Vec2) -> bool {
        p.x > self.min.x && p.x < self.max.x && p.y > self.min.y && p.y < self.max.y
    }

    fn clamp(&self, p: Vec2) -> Vec2 {
        Vec2::new(
            p.x.clamp(self.min.x, self.max.x),
            p.y.clamp(self.min.y, self.max.y),
        )
    }

    /// Parametric entry of segment `from + t * (to - from)` into the rectangle
    /// interior, `t` in `[0, 1]`. Liang-Barsky clipping; grazing an edge does not count.
    fn segment_entry(&self, from: Vec2, to: Vec2) -> Option<f32> {
        let delta = to - from;
        let mut t_enter = 0.0f32;
        let mut t_exit = 1.0f32;

        for (p, q) in [
            (-delta.x, from.x - self.min.x),
            (delta.x, self.max.x - from.x),
            (-delta.y, from.y - self.min.y),
            (delta.y, self.max.y - from.y),
        ] {
            if p == 0.0 {
                if q <= 0.0 {
                    return None;
                }
                continue;
            }
            let r = q / p;
            if p < 0.0 {
                t_enter = t_enter.max(r);
            } else {
                t_exit = t_exit.min(r);
            }
            if t_enter >= t_exit {
                return None;
            }
        }

        Some(t_enter)
    }
}

/// Walkable rectangle with unwalkable rectangular holes
#[derive(Debug, Clone)]
pub struct FlatNavMesh {
    bounds: Rect,
    obstacles: Vec<Rect>,
}

impl FlatNavMesh {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self {
            bounds: Rect::new(min, max),
            obstacles: Vec::new(),
        }
    }

    /// Add an unwalkable rectangle
    pub fn with_obstacle(mut self, min: Vec2, max: Vec2) -> Self {
        self.obstacles.push(Rect::new(min, max));
        self
    }

    /// Surround a rectangle with an unwalkable wall of the given thickness
    pub fn with_walled_region(self, min: Vec2, max: Vec2, thickness: f32) -> Self {
        let inner = Rect::new(min, max);
        let (lo, hi) = (inner.min, inner.max);
        let t = thickness;
        self.with_obstacle(Vec2::new(lo.x - t, lo.y - t), Vec2::new(hi.x + t, lo.y))
            .with_obstacle(Vec2::new(lo.x - t, hi.y), Vec2::new(hi.x + t, hi.y + t))
            .with_obstacle(Vec2::new(lo.x - t, lo.y), Vec2::new(lo.x, hi.y))
            .with_obstacle(Vec2::new(hi.x, lo.y), Vec2::new(hi.x + t, hi.y))
    }

    pub fn obstacles(&self) -> &[Rect] {
        &self.obstacles
    }

    pub fn is_walkable(&self, p: Vec2) -> bool {
        self.bounds.contains(p) && !self.obstacles.iter().any(|o| o.contains_interior(p))
    }

    fn first_obstacle_hit(&self, from: Vec2, to: Vec2) -> Option<f32> {
        self.obstacles
            .iter()
            .filter_map(|o| o.segment_entry(from, to))
            .min_by(|a, b| a.total_cmp(b))
    }
}

impl NavMesh for FlatNavMesh {
    fn sample_position(&self, position: Vec3, max_distance: f32) -> Option<Vec3> {
        let origin = position.horizontal();
        if self.is_walkable(origin) {
            return Some(Vec3::on_ground(origin.x, origin.y));
        }

        let mut best: Option<(f32, Vec2)> = None;
        let mut consider = |candidate: Vec2| {
            let distance = origin.distance_to(candidate);
            if distance <= max_distance
                && self.is_walkable(candidate)
                && best.map_or(true, |(d, _)| distance < d)
            {
                best = Some((distance, candidate));
            }
        };

        consider(self.bounds.clamp(origin));

        let ring_step = (max_distance / SNAP_MAX_RINGS as f32).max(SNAP_MIN_RING_STEP);
        let rings = ((max_distance / ring_step).floor() as usize).min(SNAP_MAX_RINGS);
        for ring in 1..=rings {
            let radius = ring as f32 * ring_step;
            for i in 0..SNAP_DIRECTIONS {
                let angle = i as f32 / SNAP_DIRECTIONS as f32 * std::f32::consts::TAU;
                consider(origin + Vec2::from_angle(angle) * radius);
            }
        }

        best.map(|(_, p)| Vec3::on_ground(p.x, p.y))
    }

    fn calculate_path(&self, origin: Vec3, destination: Vec3) -> NavPath {
        let from = origin.horizontal();
        let to = destination.horizontal();
        let start = Vec3::on_ground(from.x, from.y);

        if !self.is_walkable(from) {
            return NavPath::partial(Vec::new());
        }

        match self.first_obstacle_hit(from, to) {
            Some(t) => {
                let length = from.distance_to(to);
                let stop_t = if length > 0.0 {
                    (t - PATH_STOP_MARGIN / length).max(0.0)
                } else {
                    0.0
                };
                let stop = from + (to - from) * stop_t;
                NavPath::partial(vec![start, Vec3::on_ground(stop.x, stop.y)])
            }
            None if self.is_walkable(to) => {
                NavPath::complete(vec![start, Vec3::on_ground(to.x, to.y)])
            }
            None => NavPath::partial(vec![start]),
        }
    }
}
