//! Stealth simulation runner
//!
//! Runs pursuit-evasion episodes between patrolling guards and an intruder
//! and logs the intruder's metrics per planner strategy.

mod entities;
mod navigation;
mod planner;
mod world;

use std::time::{Duration, Instant};

use clap::Parser;
use log::{error, info, warn};
use stealth_shared::{IntruderPlanner, NavMesh};

use crate::entities::IntruderMetrics;
use crate::world::{default_map, EpisodeWorld, MapDefinition, WorldEvent};

/// Pursuit-evasion episodes between patrolling guards and an intruder
#[derive(Parser, Debug, Default, PartialEq)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Map file (JSON); the built-in map is used when omitted
    map: Option<String>,

    /// Episodes per planner
    #[arg(short, long)]
    episodes: Option<u32>,

    /// Episode length in seconds
    #[arg(short, long, value_parser = parse_length)]
    length: Option<f32>,

    /// Intruder planner: random, heuristic or lookahead-N (repeatable)
    #[arg(short, long = "planner", value_parser = parse_planner)]
    planners: Vec<IntruderPlanner>,

    /// Load a prebuilt navmesh snapshot instead of linking the map's rings
    #[arg(long)]
    navmesh: Option<String>,

    /// Write the navmesh snapshot to this path
    #[arg(long)]
    dump_navmesh: Option<String>,

    /// Pace ticks to wall-clock time
    #[arg(long)]
    realtime: bool,
}

fn parse_planner(name: &str) -> Result<IntruderPlanner, String> {
    IntruderPlanner::from_name(name).ok_or_else(|| format!("unknown planner: {}", name))
}

fn parse_length(value: &str) -> Result<f32, String> {
    let length: f32 = value
        .parse()
        .map_err(|_| format!("invalid episode length: {}", value))?;
    if length.is_nan() || length <= 0.0 {
        return Err(format!("episode length must be positive: {}", value));
    }
    Ok(length)
}

/// Prefer a prebuilt snapshot; otherwise link the map's rings
fn load_navmesh(map: &MapDefinition, snapshot: Option<&str>) -> Option<NavMesh> {
    if let Some(path) = snapshot {
        match std::fs::read(path) {
            Ok(bytes) => match NavMesh::from_bytes(&bytes) {
                Ok(navmesh) => {
                    info!("Loaded navmesh snapshot {} ({} polygons)", path, navmesh.len());
                    return Some(navmesh);
                }
                Err(e) => warn!("Failed to decode navmesh snapshot {}: {}", path, e),
            },
            Err(e) => warn!("Failed to read navmesh snapshot {}: {}", path, e),
        }
    }

    match map.build_navmesh() {
        Ok(navmesh) => Some(navmesh),
        Err(e) => {
            error!("Failed to build navmesh for map '{}': {}", map.name, e);
            None
        }
    }
}

fn dump_navmesh(navmesh: &NavMesh, path: &str) {
    match navmesh.to_bytes().map(|bytes| std::fs::write(path, bytes)) {
        Ok(Ok(())) => info!("Wrote navmesh snapshot to {}", path),
        Ok(Err(e)) => error!("Failed to write navmesh snapshot {}: {}", path, e),
        Err(e) => error!("Failed to encode navmesh: {}", e),
    }
}

/// Run one episode to its full length and return the intruder's metrics
async fn run_episode(
    map: &MapDefinition,
    navmesh: NavMesh,
    planner: IntruderPlanner,
    seed: u64,
    realtime: bool,
) -> IntruderMetrics {
    let mut world = EpisodeWorld::new(map, navmesh, planner, seed);
    let delta = map.simulation.tick_delta();
    let tick_duration = Duration::from_secs_f32(delta);
    let mut tick_count: u64 = 0;

    while !world.is_over() {
        let tick_start = Instant::now();

        for event in world.update(delta) {
            match event {
                WorldEvent::IntruderSpotted { guard_id, position } => info!(
                    "[{:6.2}s] intruder spotted by guard {} at ({:.1}, {:.1})",
                    world.elapsed(),
                    guard_id,
                    position.x,
                    position.y
                ),
                WorldEvent::IntruderLost => info!("[{:6.2}s] guards lost the intruder", world.elapsed()),
                WorldEvent::SearchEnded => info!("[{:6.2}s] search ended", world.elapsed()),
                WorldEvent::EpisodeStalled => warn!("[{:6.2}s] lead guard stalled", world.elapsed()),
            }
        }
        tick_count += 1;

        // Sleep until next tick
        if realtime {
            let elapsed = tick_start.elapsed();
            if elapsed < tick_duration {
                tokio::time::sleep(tick_duration - elapsed).await;
            }
        }
    }

    info!("Episode finished after {} ticks", tick_count);
    world.intruder().metrics.clone()
}

/// Mean of each metric over the given episodes
fn average(runs: &[IntruderMetrics]) -> IntruderMetrics {
    let mut total = IntruderMetrics::default();
    if runs.is_empty() {
        return total;
    }
    for run in runs {
        total.alert_time += run.alert_time;
        total.searched_time += run.searched_time;
        total.times_spotted += run.times_spotted;
        total.rescue_calls += run.rescue_calls;
        total.rescued_time += run.rescued_time;
        total.travelled_distance += run.travelled_distance;
    }
    let n = runs.len() as f32;
    total.alert_time /= n;
    total.searched_time /= n;
    total.times_spotted = (total.times_spotted as f32 / n).round() as u32;
    total.rescue_calls = (total.rescue_calls as f32 / n).round() as u32;
    total.rescued_time /= n;
    total.travelled_distance /= n;
    total
}

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut map = MapDefinition::load_or_default(args.map.as_deref());
    let navmesh = match load_navmesh(&map, args.navmesh.as_deref()) {
        Some(navmesh) => navmesh,
        None => {
            error!("Falling back to built-in map");
            map = default_map();
            match load_navmesh(&map, None) {
                Some(navmesh) => navmesh,
                None => return,
            }
        }
    };

    if let Some(length) = args.length {
        map.simulation.episode_length = length;
    }

    if let Some(path) = &args.dump_navmesh {
        dump_navmesh(&navmesh, path);
    }

    let episodes = args.episodes.unwrap_or(map.simulation.episodes);
    let planners = if args.planners.is_empty() {
        vec![IntruderPlanner::default()]
    } else {
        args.planners.clone()
    };
    let base_seed = map.simulation.seed.unwrap_or_else(rand::random);

    info!("Starting stealth simulation on '{}'", map.name);
    info!(
        "Tick rate: {} Hz, episode length: {:.0}s, {} episodes per planner",
        map.simulation.tick_rate, map.simulation.episode_length, episodes
    );

    for planner in planners {
        let mut valid = Vec::new();

        for episode in 0..episodes {
            let seed = base_seed.wrapping_add(episode as u64);
            let metrics = run_episode(&map, navmesh.clone(), planner, seed, args.realtime).await;

            let summary = serde_json::to_string(&metrics).unwrap_or_else(|e| e.to_string());
            if metrics.stalled {
                warn!("{} episode {} discarded (stalled): {}", planner.name(), episode + 1, summary);
            } else {
                info!("{} episode {}: {}", planner.name(), episode + 1, summary);
                valid.push(metrics);
            }
        }

        let mean = average(&valid);
        info!(
            "{}: {} valid episodes, alert {:.1}s, searched {:.1}s, spotted {}, rescues {} ({:.1}s), travelled {:.1}",
            planner.name(),
            valid.len(),
            mean.alert_time,
            mean.searched_time,
            mean.times_spotted,
            mean.rescue_calls,
            mean.rescued_time,
            mean.travelled_distance
        );
    }
}
