//! Prometheus-compatible allocator metrics
//!
//! Counters and gauges for request/release traffic, rendered as Prometheus
//! text or JSON. Hosts decide how to expose them.

use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Samples kept for request latency percentiles
const LATENCY_HISTORY: usize = 1000;

/// How a request was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickKind {
    /// Neighbour best aligned with the preference vector
    Neighbor,
    /// Zero preference, request cell kept
    CurrentCell,
    /// Global least-congested fallback
    Far,
}

/// Metrics registry for one location system
#[derive(Debug)]
pub struct LocationMetrics {
    // Traffic
    pub requests: AtomicU64,
    pub releases: AtomicU64,
    pub empty_results: AtomicU64,
    pub congestion_clamps: AtomicU64,
    pub zone_recalculations: AtomicU64,

    // Per-decision counters (metrics_extended)
    pub neighbor_picks: AtomicU64,
    pub current_cell_picks: AtomicU64,
    pub far_picks: AtomicU64,

    // Gauges
    pub active_assignments: AtomicU64,
    pub valid_cells: AtomicU64,
    pub locations: AtomicU64,

    // Request timing (microseconds)
    pub request_time_us: AtomicU64,
    pub request_time_p95_us: AtomicU64,
    pub request_time_max_us: AtomicU64,
    pub zone_calculation_us: AtomicU64,

    start_time: Instant,
    request_history: RwLock<VecDeque<u64>>,
}

impl LocationMetrics {
    pub fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            releases: AtomicU64::new(0),
            empty_results: AtomicU64::new(0),
            congestion_clamps: AtomicU64::new(0),
            zone_recalculations: AtomicU64::new(0),
            neighbor_picks: AtomicU64::new(0),
            current_cell_picks: AtomicU64::new(0),
            far_picks: AtomicU64::new(0),
            active_assignments: AtomicU64::new(0),
            valid_cells: AtomicU64::new(0),
            locations: AtomicU64::new(0),
            request_time_us: AtomicU64::new(0),
            request_time_p95_us: AtomicU64::new(0),
            request_time_max_us: AtomicU64::new(0),
            zone_calculation_us: AtomicU64::new(0),
            start_time: Instant::now(),
            request_history: RwLock::new(VecDeque::with_capacity(LATENCY_HISTORY)),
        }
    }

    #[inline]
    pub fn record_pick(&self, kind: PickKind) {
        #[cfg(feature = "metrics_extended")]
        {
            let counter = match kind {
                PickKind::Neighbor => &self.neighbor_picks,
                PickKind::CurrentCell => &self.current_cell_picks,
                PickKind::Far => &self.far_picks,
            };
            counter.fetch_add(1, Ordering::Relaxed);
        }
        #[cfg(not(feature = "metrics_extended"))]
        let _ = kind;
    }

    /// Record a request duration and update percentiles
    pub fn record_request_time(&self, duration: Duration) {
        let us = duration.as_micros() as u64;
        self.request_time_us.store(us, Ordering::Relaxed);

        let mut history = self.request_history.write();
        history.push_back(us);
        while history.len() > LATENCY_HISTORY {
            history.pop_front();
        }

        if history.len() >= 10 {
            let mut sorted: Vec<u64> = history.iter().copied().collect();
            sorted.sort_unstable();

            let p95_idx = (sorted.len() as f32 * 0.95) as usize;
            self.request_time_p95_us
                .store(sorted[p95_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.request_time_max_us
                .store(sorted.last().copied().unwrap_or(0), Ordering::Relaxed);
        }
    }

    pub fn record_zone_calculation(&self, duration: Duration) {
        self.zone_recalculations.fetch_add(1, Ordering::Relaxed);
        self.zone_calculation_us
            .store(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Generate Prometheus-format metrics output
    pub fn to_prometheus(&self) -> String {
        let mut output = String::with_capacity(2048);

        macro_rules! metric {
            ($name:expr, $help:expr, $type:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $name, $help, $name, $type, $name, $value
                ));
            };
        }

        metric!("location_allocator_requests_total", "Location requests", "counter",
            self.requests.load(Ordering::Relaxed));
        metric!("location_allocator_releases_total", "Location releases", "counter",
            self.releases.load(Ordering::Relaxed));
        metric!("location_allocator_empty_results_total", "Requests with no valid cell", "counter",
            self.empty_results.load(Ordering::Relaxed));
        metric!("location_allocator_congestion_clamps_total", "Releases that hit zero congestion", "counter",
            self.congestion_clamps.load(Ordering::Relaxed));
        metric!("location_allocator_zone_recalculations_total", "Zone field recalculations", "counter",
            self.zone_recalculations.load(Ordering::Relaxed));

        metric!("location_allocator_neighbor_picks_total", "Requests resolved to a neighbour cell", "counter",
            self.neighbor_picks.load(Ordering::Relaxed));
        metric!("location_allocator_current_cell_picks_total", "Requests resolved to the request cell", "counter",
            self.current_cell_picks.load(Ordering::Relaxed));
        metric!("location_allocator_far_picks_total", "Requests resolved by the global fallback", "counter",
            self.far_picks.load(Ordering::Relaxed));

        metric!("location_allocator_active_assignments", "Entities holding a location", "gauge",
            self.active_assignments.load(Ordering::Relaxed));
        metric!("location_allocator_valid_cells", "Cells with at least one location", "gauge",
            self.valid_cells.load(Ordering::Relaxed));
        metric!("location_allocator_locations", "Locations in the grid", "gauge",
            self.locations.load(Ordering::Relaxed));

        metric!("location_allocator_request_time_microseconds", "Last request time", "gauge",
            self.request_time_us.load(Ordering::Relaxed));
        metric!("location_allocator_request_time_p95_microseconds", "95th percentile request time", "gauge",
            self.request_time_p95_us.load(Ordering::Relaxed));
        metric!("location_allocator_request_time_max_microseconds", "Maximum request time", "gauge",
            self.request_time_max_us.load(Ordering::Relaxed));
        metric!("location_allocator_zone_calculation_microseconds", "Last zone calculation time", "gauge",
            self.zone_calculation_us.load(Ordering::Relaxed));
        metric!("location_allocator_uptime_seconds", "Seconds since the system was built", "counter",
            self.uptime_seconds());

        output
    }

    /// Generate JSON format metrics
    pub fn to_json(&self) -> String {
        format!(r#"{{
  "traffic": {{
    "requests": {},
    "releases": {},
    "empty_results": {},
    "congestion_clamps": {},
    "zone_recalculations": {}
  }},
  "picks": {{
    "neighbor": {},
    "current_cell": {},
    "far": {}
  }},
  "grid": {{
    "active_assignments": {},
    "valid_cells": {},
    "locations": {}
  }},
  "timing": {{
    "request_time_us": {},
    "request_time_p95_us": {},
    "request_time_max_us": {},
    "zone_calculation_us": {},
    "uptime_seconds": {}
  }}
}}"#,
            self.requests.load(Ordering::Relaxed),
            self.releases.load(Ordering::Relaxed),
            self.empty_results.load(Ordering::Relaxed),
            self.congestion_clamps.load(Ordering::Relaxed),
            self.zone_recalculations.load(Ordering::Relaxed),
            self.neighbor_picks.load(Ordering::Relaxed),
            self.current_cell_picks.load(Ordering::Relaxed),
            self.far_picks.load(Ordering::Relaxed),
            self.active_assignments.load(Ordering::Relaxed),
            self.valid_cells.load(Ordering::Relaxed),
            self.locations.load(Ordering::Relaxed),
            self.request_time_us.load(Ordering::Relaxed),
            self.request_time_p95_us.load(Ordering::Relaxed),
            self.request_time_max_us.load(Ordering::Relaxed),
            self.zone_calculation_us.load(Ordering::Relaxed),
            self.uptime_seconds(),
        )
    }
}

impl Default for LocationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = LocationMetrics::new();
        assert_eq!(metrics.requests.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.active_assignments.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_record_request_time() {
        let metrics = LocationMetrics::new();
        for i in 0..100 {
            metrics.record_request_time(Duration::from_micros(10 + i));
        }
        assert_eq!(metrics.request_time_max_us.load(Ordering::Relaxed), 109);
        let p95 = metrics.request_time_p95_us.load(Ordering::Relaxed);
        assert!((100..=109).contains(&p95));
    }

    #[cfg(feature = "metrics_extended")]
    #[test]
    fn test_record_pick() {
        let metrics = LocationMetrics::new();
        metrics.record_pick(PickKind::Neighbor);
        metrics.record_pick(PickKind::Neighbor);
        metrics.record_pick(PickKind::Far);
        assert_eq!(metrics.neighbor_picks.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.current_cell_picks.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.far_picks.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = LocationMetrics::new();
        metrics.requests.store(50, Ordering::Relaxed);
        metrics.valid_cells.store(12, Ordering::Relaxed);

        let output = metrics.to_prometheus();
        assert!(output.contains("location_allocator_requests_total 50"));
        assert!(output.contains("location_allocator_valid_cells 12"));
        assert!(output.contains("# TYPE location_allocator_releases_total counter"));
    }

    #[test]
    fn test_json_format() {
        let metrics = LocationMetrics::new();
        metrics.releases.store(7, Ordering::Relaxed);

        let output = metrics.to_json();
        assert!(output.contains("\"releases\": 7"));
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["traffic"]["releases"], 7);
    }
}
