//! Allocator configuration
//!
//! Runtime tunables come from the environment (see [`AllocatorConfig::load_or_default`]).
//! Per-map geometry and zone definitions are plain serde types with built-in
//! defaults in [`maps`]; hosts that keep them in JSON can parse them with
//! [`MapGeometry::from_json`] / [`MapZones::from_json`].

use hashbrown::HashMap;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::grid::constants::allocation::{
    CONGESTION_FORCE, CONGESTION_RING_RADIUS, JITTER_WEIGHT, MOMENTUM_WEIGHT,
};
use crate::util::vec2::Vec2;

/// Configuration errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be a positive finite number, got {value}")]
    InvalidScale { name: &'static str, value: f32 },
    #[error("{name} must be a non-negative finite number, got {value}")]
    InvalidWeight { name: &'static str, value: f32 },
    #[error("congestion ring radius must be at least 1")]
    InvalidRing,
    #[error("invalid map geometry: {0}")]
    InvalidGeometry(String),
    #[error("failed to parse config: {0}")]
    Parse(String),
}

/// Externally tunable multipliers applied when the zone field is evaluated.
/// Changing any of them requires a zone recalculation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneScales {
    pub radius: f32,
    pub force: f32,
    pub decay: f32,
}

impl Default for ZoneScales {
    fn default() -> Self {
        Self {
            radius: 1.0,
            force: 1.0,
            decay: 1.0,
        }
    }
}

impl ZoneScales {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("radius scale", self.radius),
            ("force scale", self.force),
            ("decay scale", self.decay),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidScale { name, value });
            }
        }
        Ok(())
    }
}

/// Allocator configuration
#[derive(Debug, Clone)]
pub struct AllocatorConfig {
    /// RNG seed; `None` seeds from OS entropy
    pub seed: Option<u64>,
    /// Zone evaluation multipliers
    pub scales: ZoneScales,
    /// Weight of the travel-direction term in the preference vector
    pub momentum_weight: f32,
    /// Weight of the random term in the preference vector
    pub jitter_weight: f32,
    /// Base force pushed into the field around an assigned cell
    pub congestion_force: f32,
    /// Chebyshev radius of the congestion push, in cells
    pub congestion_ring: i32,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            seed: None,
            scales: ZoneScales::default(),
            momentum_weight: MOMENTUM_WEIGHT,
            jitter_weight: JITTER_WEIGHT,
            congestion_force: CONGESTION_FORCE,
            congestion_ring: CONGESTION_RING_RADIUS,
        }
    }
}

impl AllocatorConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Ok(seed) = std::env::var("LOCATION_SEED") {
            if let Ok(parsed) = seed.parse::<u64>() {
                config.seed = Some(parsed);
            } else {
                tracing::warn!("Invalid LOCATION_SEED '{}', using entropy", seed);
            }
        }

        config.scales.radius = env_scale("ZONE_RADIUS_SCALE", config.scales.radius);
        config.scales.force = env_scale("ZONE_FORCE_SCALE", config.scales.force);
        config.scales.decay = env_scale("ZONE_DECAY_SCALE", config.scales.decay);

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scales.validate()?;
        for (name, value) in [
            ("momentum weight", self.momentum_weight),
            ("jitter weight", self.jitter_weight),
            ("congestion force", self.congestion_force),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidWeight { name, value });
            }
        }
        if self.congestion_ring < 1 {
            return Err(ConfigError::InvalidRing);
        }
        Ok(())
    }
}

fn env_scale(key: &str, default: f32) -> f32 {
    match std::env::var(key) {
        Ok(raw) => match raw.parse::<f32>() {
            Ok(parsed) if parsed.is_finite() && parsed > 0.0 => parsed,
            Ok(_) => {
                tracing::warn!("{} must be > 0, using default", key);
                default
            }
            Err(_) => {
                tracing::warn!("Invalid {} '{}', using default", key, raw);
                default
            }
        },
        Err(_) => default,
    }
}

/// Inclusive value range that zone parameters are sampled from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f32,
    pub max: f32,
}

impl ValueRange {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Smaller of the two bounds (ranges may be written in either order)
    #[inline]
    pub fn lower(&self) -> f32 {
        self.min.min(self.max)
    }

    #[inline]
    pub fn upper(&self) -> f32 {
        self.min.max(self.max)
    }

    /// Sample a normal distribution centred on the range midpoint with
    /// sigma = width / 6, clamped into the range.
    pub fn sample_gaussian<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        let (lower, upper) = (self.lower(), self.upper());
        let std_dev = (upper - lower) / 6.0;
        if std_dev <= 0.0 {
            return lower;
        }
        let mean = (lower + upper) * 0.5;
        match Normal::new(mean, std_dev) {
            Ok(normal) => normal.sample(rng).clamp(lower, upper),
            Err(_) => mean,
        }
    }
}

/// World bounds and grid resolution for a map
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapGeometry {
    /// Minimum corner on the horizontal plane (world x, world z)
    pub min: Vec2,
    /// Maximum corner on the horizontal plane (world x, world z)
    pub max: Vec2,
    pub cell_size: f32,
}

impl MapGeometry {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let geometry: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        geometry.validate()?;
        Ok(geometry)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.cell_size.is_finite() || self.cell_size <= 0.0 {
            return Err(ConfigError::InvalidGeometry(format!(
                "cell size must be positive, got {}",
                self.cell_size
            )));
        }
        if self.max.x <= self.min.x || self.max.y <= self.min.y {
            return Err(ConfigError::InvalidGeometry(format!(
                "bounds [{:?}] -> [{:?}] are empty",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

/// Zone anchored to a named world marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuiltinZone {
    pub radius: ValueRange,
    #[serde(default = "unit_force")]
    pub force: ValueRange,
    #[serde(default = "unit_decay")]
    pub decay: f32,
}

/// Zone anchored to an explicit world position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomZone {
    /// Horizontal world position (world x, world z)
    pub position: Vec2,
    pub radius: ValueRange,
    #[serde(default = "unit_force")]
    pub force: ValueRange,
    #[serde(default = "unit_decay")]
    pub decay: f32,
}

fn unit_force() -> ValueRange {
    ValueRange::new(1.0, 1.0)
}

fn unit_decay() -> f32 {
    1.0
}

impl BuiltinZone {
    pub fn new(radius: ValueRange, force: ValueRange) -> Self {
        Self {
            radius,
            force,
            decay: 1.0,
        }
    }

    pub fn with_decay(mut self, decay: f32) -> Self {
        self.decay = decay;
        self
    }
}

impl CustomZone {
    pub fn new(position: Vec2, radius: ValueRange, force: ValueRange) -> Self {
        Self {
            position,
            radius,
            force,
            decay: 1.0,
        }
    }

    pub fn with_decay(mut self, decay: f32) -> Self {
        self.decay = decay;
        self
    }
}

/// Zone definitions for a map
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapZones {
    pub builtin_zones: HashMap<String, BuiltinZone>,
    pub custom_zones: Vec<CustomZone>,
}

impl MapZones {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.builtin_zones.is_empty() && self.custom_zones.is_empty()
    }
}

/// Built-in per-map defaults
pub mod maps {
    use super::*;

    /// Map ids with a built-in geometry
    pub const MAP_IDS: &[&str] = &[
        "bigmap",
        "factory4_day",
        "factory4_night",
        "Sandbox",
        "Sandbox_high",
        "Interchange",
        "laboratory",
        "Labyrinth",
        "Lighthouse",
        "RezervBase",
        "Shoreline",
        "TarkovStreets",
        "Woods",
    ];

    fn geo(min: (f32, f32), max: (f32, f32), cell_size: f32) -> MapGeometry {
        MapGeometry {
            min: Vec2::new(min.0, min.1),
            max: Vec2::new(max.0, max.1),
            cell_size,
        }
    }

    /// Default geometry for a map id
    pub fn geometry(map_id: &str) -> Option<MapGeometry> {
        let geometry = match map_id {
            "bigmap" => geo((-372.0, -306.0), (698.0, 235.0), 50.0),
            "factory4_day" | "factory4_night" => geo((-65.0, -65.0), (78.0, 68.0), 25.0),
            "Sandbox" | "Sandbox_high" => geo((-99.0, -124.0), (249.0, 364.0), 35.0),
            "Interchange" => geo((-364.0, -443.0), (534.0, 452.0), 50.0),
            "laboratory" => geo((-292.0, -441.0), (96.0, 223.0), 25.0),
            "Labyrinth" => geo((-53.0, -37.0), (51.0, 76.0), 25.0),
            "Lighthouse" => geo((-545.0, -998.0), (512.0, 721.0), 75.0),
            "RezervBase" => geo((-304.0, -275.0), (292.0, 272.0), 35.0),
            "Shoreline" => geo((-1060.0, -415.0), (508.0, 622.0), 75.0),
            "TarkovStreets" => geo((-279.0, -299.0), (324.0, 533.0), 50.0),
            "Woods" => geo((-756.0, -915.0), (647.0, 443.0), 75.0),
            _ => return None,
        };
        Some(geometry)
    }

    fn builtin(entries: &[(&str, BuiltinZone)]) -> HashMap<String, BuiltinZone> {
        entries
            .iter()
            .map(|(name, zone)| (name.to_string(), zone.clone()))
            .collect()
    }

    fn custom(x: f32, z: f32, radius: (f32, f32), force: (f32, f32)) -> CustomZone {
        CustomZone::new(
            Vec2::new(x, z),
            ValueRange::new(radius.0, radius.1),
            ValueRange::new(force.0, force.1),
        )
    }

    fn named(radius: (f32, f32), force: (f32, f32)) -> BuiltinZone {
        BuiltinZone::new(
            ValueRange::new(radius.0, radius.1),
            ValueRange::new(force.0, force.1),
        )
    }

    /// Default zones for a map id. Unknown maps have no zones.
    pub fn zones(map_id: &str) -> MapZones {
        match map_id {
            "bigmap" => MapZones {
                builtin_zones: builtin(&[
                    ("ZoneDormitory", named((250.0, 300.0), (-0.75, 1.5))),
                    ("ZoneScavBase", named((350.0, 400.0), (-0.75, 1.5))),
                    ("ZoneOldAZS", named((100.0, 150.0), (-0.25, 0.25))),
                    ("ZoneGasStation", named((200.0, 250.0), (-0.25, 0.75))),
                ]),
                custom_zones: vec![
                    custom(-200.0, -100.0, (350.0, 400.0), (-0.25, 0.5)),
                    custom(550.0, 125.0, (150.0, 200.0), (-0.25, 0.5)),
                ],
            },
            "Interchange" => MapZones {
                builtin_zones: builtin(&[(
                    "ZoneCenter",
                    named((500.0, 650.0), (-0.25, 1.0)).with_decay(0.75),
                )]),
                custom_zones: Vec::new(),
            },
            "Lighthouse" => MapZones {
                builtin_zones: builtin(&[
                    ("Zone_Chalet", named((300.0, 350.0), (-0.5, 1.25))),
                    ("Zone_Village", named((400.0, 450.0), (-0.5, 1.25))),
                ]),
                custom_zones: vec![
                    custom(0.0, 475.0, (500.0, 600.0), (-0.25, 0.75)),
                    custom(-55.0, -775.0, (400.0, 450.0), (-0.25, 0.75)),
                ],
            },
            "RezervBase" => MapZones {
                builtin_zones: builtin(&[
                    ("ZoneSubStorage", named((300.0, 350.0), (-0.25, 0.5))),
                    ("ZoneBarrack", named((300.0, 350.0), (-0.25, 0.5))),
                ]),
                custom_zones: Vec::new(),
            },
            "Shoreline" => MapZones {
                builtin_zones: HashMap::new(),
                custom_zones: vec![
                    custom(-250.0, -100.0, (500.0, 600.0), (-0.25, 0.75)),
                    custom(160.0, -270.0, (500.0, 600.0), (0.0, 0.25)),
                    custom(-345.0, 455.0, (500.0, 600.0), (-0.25, 0.75)),
                    custom(-925.0, 275.0, (500.0, 600.0), (-0.25, 0.75)),
                ],
            },
            "Woods" => MapZones {
                builtin_zones: HashMap::new(),
                custom_zones: vec![
                    // Old sawmill
                    custom(-550.0, -200.0, (500.0, 600.0), (-0.25, 0.25)),
                    // New sawmill
                    custom(0.0, 0.0, (700.0, 800.0), (-0.35, 1.25)),
                    // Outskirts
                    custom(400.0, 250.0, (600.0, 700.0), (-0.25, 0.5)),
                    // Bridge
                    custom(135.0, -750.0, (800.0, 1000.0), (-0.35, 1.0)),
                ],
            },
            _ => MapZones::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_default_config() {
        let config = AllocatorConfig::default();
        assert_eq!(config.seed, None);
        assert_eq!(config.scales, ZoneScales::default());
        assert_eq!(config.congestion_ring, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_or_default() {
        let config = AllocatorConfig::load_or_default();
        assert!(config.scales.radius > 0.0);
    }

    #[test]
    fn test_validate_rejects_zero_scale() {
        let mut config = AllocatorConfig::default();
        config.scales.force = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidScale { name: "force scale", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_negative_jitter() {
        let config = AllocatorConfig {
            jitter_weight: -1.0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidWeight { .. })));
    }

    #[test]
    fn test_sample_gaussian_stays_in_range() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let range = ValueRange::new(250.0, 300.0);
        for _ in 0..1000 {
            let value = range.sample_gaussian(&mut rng);
            assert!((250.0..=300.0).contains(&value));
        }
    }

    #[test]
    fn test_sample_gaussian_reversed_and_degenerate() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let reversed = ValueRange::new(1.5, -0.75);
        for _ in 0..100 {
            let value = reversed.sample_gaussian(&mut rng);
            assert!((-0.75..=1.5).contains(&value));
        }
        assert_eq!(ValueRange::new(4.0, 4.0).sample_gaussian(&mut rng), 4.0);
    }

    #[test]
    fn test_default_tables() {
        for map_id in maps::MAP_IDS {
            let geometry = maps::geometry(map_id).expect("every listed map has geometry");
            assert!(geometry.validate().is_ok(), "{map_id} geometry invalid");
        }
        assert!(maps::geometry("unknown").is_none());
        assert_eq!(maps::zones("bigmap").builtin_zones.len(), 4);
        assert_eq!(maps::zones("Woods").custom_zones.len(), 4);
        assert!(maps::zones("factory4_day").is_empty());
    }

    #[test]
    fn test_zones_from_json_defaults() {
        let json = r#"{
            "builtin_zones": { "ZoneCenter": { "radius": { "min": 10.0, "max": 20.0 } } },
            "custom_zones": [
                { "position": { "x": 1.0, "y": 2.0 }, "radius": { "min": 5.0, "max": 5.0 }, "decay": 2.0 }
            ]
        }"#;
        let zones = MapZones::from_json(json).unwrap();
        let center = &zones.builtin_zones["ZoneCenter"];
        assert_eq!(center.force, ValueRange::new(1.0, 1.0));
        assert_eq!(center.decay, 1.0);
        assert_eq!(zones.custom_zones[0].decay, 2.0);
    }

    #[test]
    fn test_geometry_from_json_validates() {
        let bad = r#"{ "min": { "x": 0.0, "y": 0.0 }, "max": { "x": 10.0, "y": 10.0 }, "cell_size": 0.0 }"#;
        assert!(matches!(
            MapGeometry::from_json(bad),
            Err(ConfigError::InvalidGeometry(_))
        ));
        assert!(matches!(MapGeometry::from_json("{"), Err(ConfigError::Parse(_))));
    }
}
