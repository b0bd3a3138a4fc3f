//! Thread-shared handle to a location system
//!
//! One mutex guards the whole system; every call holds it for the duration of
//! a single operation.

use parking_lot::Mutex;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use crate::config::ZoneScales;
use crate::grid::allocator::{LocationSystem, SystemError};
use crate::grid::zones::ZoneError;
use crate::metrics::LocationMetrics;
use crate::navigation::location::Location;
use crate::util::vec3::Vec3;

pub struct SharedLocationSystem<E> {
    inner: Arc<Mutex<LocationSystem<E>>>,
    metrics: Arc<LocationMetrics>,
}

impl<E> Clone for SharedLocationSystem<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl<E> SharedLocationSystem<E>
where
    E: Eq + Hash + Clone + Debug,
{
    pub fn new(system: LocationSystem<E>) -> Self {
        let metrics = system.metrics();
        Self {
            inner: Arc::new(Mutex::new(system)),
            metrics,
        }
    }

    pub fn request_near(&self, entity: E, world_pos: Vec3, previous: Option<&Location>) -> Option<Arc<Location>> {
        self.inner.lock().request_near(entity, world_pos, previous)
    }

    pub fn release(&self, entity: &E) -> bool {
        self.inner.lock().release(entity)
    }

    pub fn calculate_zones(&self) -> Result<(), ZoneError> {
        self.inner.lock().calculate_zones()
    }

    pub fn set_zone_scales(&self, scales: ZoneScales) -> Result<(), SystemError> {
        self.inner.lock().set_zone_scales(scales)
    }

    /// Run a read-only closure against the system under the lock
    pub fn with<R>(&self, f: impl FnOnce(&LocationSystem<E>) -> R) -> R {
        f(&self.inner.lock())
    }

    /// Metrics are atomics and readable without the lock
    pub fn metrics(&self) -> &Arc<LocationMetrics> {
        &self.metrics
    }
}
