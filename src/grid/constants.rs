/// Grid limits
pub mod grid {
    /// Largest permitted cell count
    pub const MAX_CELLS: u64 = 1 << 24;
}

/// Request/release tuning
pub mod allocation {
    /// Weight of the normalized travel direction in the preference vector
    pub const MOMENTUM_WEIGHT: f32 = 0.5;
    /// Weight of the unit-disc jitter in the preference vector
    pub const JITTER_WEIGHT: f32 = 0.5;
    /// Base force pushed into the field around an assigned cell.
    /// Falls off with the squared cell offset.
    pub const CONGESTION_FORCE: f32 = 0.25;
    /// Chebyshev radius of the congestion push, in cells
    pub const CONGESTION_RING_RADIUS: i32 = 3;
}

/// Location population constants
pub mod population {
    /// Snap tolerance for designer-placed candidates (world units)
    pub const SNAP_TOLERANCE: f32 = 2.0;
    /// Exfil markers sit further from walkable ground
    pub const EXFIL_SNAP_TOLERANCE: f32 = 5.0;
    /// Radius for loot locations (world units)
    pub const LOOT_RADIUS: f32 = 10.0;
    /// Lower bound for every location radius (world units)
    pub const MIN_LOCATION_RADIUS: f32 = 10.0;
    /// Synthetic candidates per axis inside a cell
    pub const SYNTHETIC_RESOLUTION: usize = 3;
    /// Squared distance within which a path counts as arriving (world units²)
    pub const PATH_ARRIVAL_TOLERANCE_SQ: f32 = 1.0;
}

/// Zone field constants
pub mod zones {
    /// Smallest permitted configured zone radius (world units)
    pub const MIN_ZONE_RADIUS: f32 = 1.0;
}
