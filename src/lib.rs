//! Location Allocator Library
//!
//! Congestion-aware assignment of points of interest to autonomous agents
//! moving through a large open world. The world is partitioned into a grid;
//! agents are steered between neighbouring cells by their travel momentum and a
//! designer-tuned zone flow field, while each assignment pushes later agents away.
//!
//! # Features
//!
//! - `parallel_field` - Evaluate the zone field across grid rows with rayon (enabled by default)
//! - `metrics_extended` - Per-decision pick counters (enabled by default)

pub mod config;
pub mod grid;
pub mod metrics;
pub mod navigation;
pub mod shared;
pub mod snapshot;
pub mod util;

pub use config::AllocatorConfig;
pub use grid::allocator::{LocationSystem, SystemError};
pub use navigation::location::{Location, LocationCategory};
pub use navigation::mesh::{NavMesh, NavPath};
pub use shared::SharedLocationSystem;
