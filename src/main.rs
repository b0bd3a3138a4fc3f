use anyhow::Context;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use location_allocator::config::{maps, AllocatorConfig, MapGeometry};
use location_allocator::grid::zones::ZoneMarker;
use location_allocator::navigation::flat::FlatNavMesh;
use location_allocator::navigation::gatherer::RawLocation;
use location_allocator::util::vec2::Vec2;
use location_allocator::util::vec3::Vec3;
use location_allocator::{Location, LocationCategory, LocationSystem, SharedLocationSystem};

/// Raw candidates scattered per cell of the map grid
const CANDIDATES_PER_CELL: f32 = 0.6;

/// Obstacles dropped onto the demo terrain
const OBSTACLE_COUNT: usize = 12;

struct Agent {
    id: Uuid,
    position: Vec3,
    target: Option<Arc<Location>>,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn random_point<R: Rng>(rng: &mut R, geometry: &MapGeometry) -> Vec3 {
    Vec3::on_ground(
        rng.gen_range(geometry.min.x..geometry.max.x),
        rng.gen_range(geometry.min.y..geometry.max.y),
    )
}

/// Flat terrain with a handful of rectangular buildings
fn build_terrain<R: Rng>(rng: &mut R, geometry: &MapGeometry) -> FlatNavMesh {
    let mut nav = FlatNavMesh::new(geometry.min, geometry.max);
    for _ in 0..OBSTACLE_COUNT {
        let corner = random_point(rng, geometry).horizontal();
        let size = Vec2::new(
            rng.gen_range(0.5..1.5) * geometry.cell_size,
            rng.gen_range(0.5..1.5) * geometry.cell_size,
        );
        nav = nav.with_obstacle(corner, corner + size);
    }
    nav
}

fn scatter_candidates<R: Rng>(rng: &mut R, geometry: &MapGeometry) -> Vec<RawLocation> {
    let cells = ((geometry.max.x - geometry.min.x) / geometry.cell_size).ceil()
        * ((geometry.max.y - geometry.min.y) / geometry.cell_size).ceil();
    let count = (cells * CANDIDATES_PER_CELL) as usize;

    (0..count)
        .map(|i| {
            let category = match i % 10 {
                0..=3 => LocationCategory::ContainerLoot,
                4..=6 => LocationCategory::LooseLoot,
                7..=8 => LocationCategory::Quest,
                _ => LocationCategory::Exfil,
            };
            RawLocation::new(category, format!("{:?}_{}", category, i), random_point(rng, geometry))
        })
        .collect()
}

fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("Location Simulator v{}", env!("CARGO_PKG_VERSION"));

    let map_id = std::env::var("MAP_ID").unwrap_or_else(|_| "bigmap".to_string());
    let agent_count: usize = env_or("SIM_AGENTS", 200);
    let steps: usize = env_or("SIM_STEPS", 20);
    let tick = Duration::from_millis(env_or("SIM_TICK_MS", 50));

    let config = AllocatorConfig::load_or_default();
    config.validate().context("invalid allocator configuration")?;
    info!(
        "Configuration loaded: map={}, agents={}, steps={}, seed={:?}",
        map_id, agent_count, steps, config.seed
    );

    let geometry = maps::geometry(&map_id).with_context(|| format!("unknown map id '{}'", map_id))?;

    // World generation uses its own stream so the allocator seed stays independent
    let mut world_rng = match config.seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed.wrapping_add(1)),
        None => ChaCha8Rng::from_entropy(),
    };
    let nav = build_terrain(&mut world_rng, &geometry);
    let candidates = scatter_candidates(&mut world_rng, &geometry);
    let mut marker_names: Vec<String> = maps::zones(&map_id).builtin_zones.into_keys().collect();
    marker_names.sort();
    let markers: Vec<ZoneMarker> = marker_names
        .into_iter()
        .map(|name| ZoneMarker::new(name, random_point(&mut world_rng, &geometry)))
        .collect();

    info!(
        "Generated terrain with {} obstacles, {} raw candidates, {} zone markers",
        nav.obstacles().len(),
        candidates.len(),
        markers.len()
    );

    let system: LocationSystem<Uuid> =
        LocationSystem::for_map(&map_id, markers, config, candidates, &nav)
            .context("failed to build location system")?;

    let report = system.population().clone();
    info!(
        "Population: {} placed, {} synthetic, {} dropped, {} cells abandoned",
        report.placed,
        report.synthetic,
        report.unreachable + report.out_of_bounds,
        report.abandoned_cells.len()
    );

    let shared = SharedLocationSystem::new(system);
    let mut agents: Vec<Agent> = (0..agent_count)
        .map(|_| Agent {
            id: Uuid::new_v4(),
            position: random_point(&mut world_rng, &geometry),
            target: None,
        })
        .collect();

    for step in 0..steps {
        agents.par_iter_mut().enumerate().for_each(|(i, agent)| {
            // Some agents give up their objective and idle for a tick
            if (i + step) % 7 == 0 {
                shared.release(&agent.id);
                agent.target = None;
                return;
            }

            let previous = agent.target.take();
            match shared.request_near(agent.id, agent.position, previous.as_deref()) {
                Some(location) => {
                    agent.position = location.position;
                    agent.target = Some(location);
                }
                None => warn!("Agent {} got no location", agent.id),
            }
        });

        let (held, max_congestion) = shared.with(|s| (s.active_assignments(), s.grid().stats().max_congestion));
        info!("Step {}: {} assignments, max congestion {}", step, held, max_congestion);

        std::thread::sleep(tick);
    }

    info!("Releasing all agents");
    for agent in &agents {
        shared.release(&agent.id);
    }

    let snapshot = shared.with(|s| s.snapshot());
    info!(
        "Final grid {}x{}: {} zones, total congestion {}",
        snapshot.size.x,
        snapshot.size.y,
        snapshot.zones.len(),
        snapshot.cells.iter().map(|c| c.congestion as u64).sum::<u64>()
    );
    info!("Metrics:\n{}", shared.metrics().to_json());

    Ok(())
}
