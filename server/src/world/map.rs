//! Map definitions: navmesh rings, walls, agent spawns and tunables.
//!
//! Maps are loaded from JSON. Every section is optional; missing sections
//! fall back to the built-in two-room map and default tunables.

use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use stealth_shared::{ConfigError, MeshError, NavMesh, PlannerConfig, Vec2};
use thiserror::Error;

use crate::navigation::{BoxObstacle, Obstacle};

/// Errors raised while loading a map file
#[derive(Debug, Error)]
pub enum MapError {
    #[error("failed to read map file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse map file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid navmesh: {0}")]
    Mesh(#[from] MeshError),
    #[error("invalid planner section: {0}")]
    Planner(#[from] ConfigError),
    #[error("invalid map: {0}")]
    Invalid(String),
}

/// Episode-level tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Simulation steps per second
    pub tick_rate: u32,
    /// Episode length in simulated seconds
    pub episode_length: f32,
    pub episodes: u32,
    /// Walking speed of guards, units per second
    pub npc_speed: f32,
    pub intruder_speed_multiplier: f32,
    pub view_radius: f32,
    /// Full guard view cone, in degrees
    pub view_angle: f32,
    /// Spots sampled when the map lists none
    pub hiding_spot_count: usize,
    /// Unseen seconds before a chase turns into a search
    pub lose_sight_timeout: f32,
    /// Seconds guards keep searching before returning to patrol
    pub search_duration: f32,
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_rate: 20,
            episode_length: 250.0,
            episodes: 10,
            npc_speed: 4.0,
            intruder_speed_multiplier: 1.5,
            view_radius: 15.0,
            view_angle: 90.0,
            hiding_spot_count: 50,
            lose_sight_timeout: 2.0,
            search_duration: 20.0,
            seed: None,
        }
    }
}

impl SimulationConfig {
    pub fn tick_delta(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }

    pub fn intruder_speed(&self) -> f32 {
        self.npc_speed * self.intruder_speed_multiplier
    }
}

/// A guard and the loop it patrols; the first waypoint is its spawn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardSpawn {
    pub patrol: Vec<Vec2>,
}

/// Everything needed to run episodes on one map
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MapDefinition {
    pub name: String,
    /// Convex walkable polygons; shared edges become navmesh adjacency
    pub navmesh: Vec<Vec<Vec2>>,
    pub walls: Vec<Obstacle>,
    pub guards: Vec<GuardSpawn>,
    pub intruder_start: Vec2,
    /// Static hiding spots; sampled from the navmesh when empty
    pub hiding_spots: Vec<Vec2>,
    pub planner: PlannerConfig,
    pub simulation: SimulationConfig,
}

impl Default for MapDefinition {
    fn default() -> Self {
        default_map()
    }
}

impl MapDefinition {
    /// Load a map from a JSON file
    pub fn load_from_json<P: AsRef<Path>>(path: P) -> Result<Self, MapError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let map: MapDefinition = serde_json::from_str(&content)?;
        map.validate()?;

        info!(
            "Loaded map '{}' from {:?}: {} polygons, {} walls, {} guards",
            map.name,
            path,
            map.navmesh.len(),
            map.walls.len(),
            map.guards.len()
        );
        Ok(map)
    }

    /// Load a map, falling back to the built-in one on any error
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Self {
        let Some(path) = path else {
            info!("No map file given, using built-in map");
            return default_map();
        };

        match Self::load_from_json(path.as_ref()) {
            Ok(map) => map,
            Err(e) => {
                warn!("Failed to load map {:?}: {}", path.as_ref(), e);
                warn!("Using built-in map");
                default_map()
            }
        }
    }

    fn validate(&self) -> Result<(), MapError> {
        if self.guards.is_empty() {
            return Err(MapError::Invalid("map has no guards".to_string()));
        }
        if let Some(index) = self.guards.iter().position(|g| g.patrol.is_empty()) {
            return Err(MapError::Invalid(format!("guard {} has an empty patrol", index)));
        }
        if self.simulation.tick_rate == 0 {
            return Err(MapError::Invalid("tick_rate must be positive".to_string()));
        }
        self.planner.validate()?;
        Ok(())
    }

    /// Link the navmesh rings into a mesh and check the intruder starts on it
    pub fn build_navmesh(&self) -> Result<NavMesh, MapError> {
        let navmesh = NavMesh::from_rings(self.navmesh.clone())?;
        if navmesh.locate_polygon(self.intruder_start).is_none() {
            return Err(MapError::Invalid(format!(
                "intruder start ({}, {}) is off the navmesh",
                self.intruder_start.x, self.intruder_start.y
            )));
        }
        Ok(navmesh)
    }
}

/// Rectangular cells over a grid of column and row boundaries, minus holes
fn grid_rings(xs: &[f32], ys: &[f32], holes: &[(f32, f32)]) -> Vec<Vec<Vec2>> {
    let mut rings = Vec::new();
    for col in xs.windows(2) {
        for row in ys.windows(2) {
            let (x0, x1, y0, y1) = (col[0], col[1], row[0], row[1]);
            if holes.iter().any(|&(hx, hy)| hx == x0 && hy == y0) {
                continue;
            }
            rings.push(vec![
                Vec2::new(x0, y0),
                Vec2::new(x1, y0),
                Vec2::new(x1, y1),
                Vec2::new(x0, y1),
            ]);
        }
    }
    rings
}

/// Two rooms joined by a corridor, each with a pillar for cover
pub fn default_map() -> MapDefinition {
    let rows = [0.0, 2.0, 4.0, 6.0, 8.0, 10.0];
    let mut navmesh = grid_rings(&[0.0, 4.0, 6.0, 10.0], &rows, &[(4.0, 6.0)]);
    navmesh.push(vec![
        Vec2::new(10.0, 4.0),
        Vec2::new(14.0, 4.0),
        Vec2::new(14.0, 6.0),
        Vec2::new(10.0, 6.0),
    ]);
    navmesh.extend(grid_rings(&[14.0, 18.0, 20.0, 24.0], &rows, &[(18.0, 2.0)]));

    let walls = vec![
        Obstacle::Box(BoxObstacle::from_corners(-1.0, -1.0, 25.0, 0.0)),
        Obstacle::Box(BoxObstacle::from_corners(-1.0, 10.0, 25.0, 11.0)),
        Obstacle::Box(BoxObstacle::from_corners(-1.0, 0.0, 0.0, 10.0)),
        Obstacle::Box(BoxObstacle::from_corners(24.0, 0.0, 25.0, 10.0)),
        Obstacle::Box(BoxObstacle::from_corners(10.0, 0.0, 14.0, 4.0)),
        Obstacle::Box(BoxObstacle::from_corners(10.0, 6.0, 14.0, 10.0)),
        // Pillars
        Obstacle::Box(BoxObstacle::from_corners(4.0, 6.0, 6.0, 8.0)),
        Obstacle::Box(BoxObstacle::from_corners(18.0, 2.0, 20.0, 4.0)),
    ];

    let guards = vec![
        GuardSpawn {
            patrol: vec![
                Vec2::new(22.0, 8.5),
                Vec2::new(16.0, 8.5),
                Vec2::new(16.0, 1.0),
                Vec2::new(22.0, 1.0),
            ],
        },
        GuardSpawn {
            patrol: vec![
                Vec2::new(12.0, 5.0),
                Vec2::new(8.0, 1.0),
                Vec2::new(2.0, 1.0),
                Vec2::new(2.0, 5.0),
                Vec2::new(8.0, 9.0),
                Vec2::new(12.0, 5.0),
                Vec2::new(22.0, 5.0),
            ],
        },
    ];

    MapDefinition {
        name: "two-rooms".to_string(),
        navmesh,
        walls,
        guards,
        intruder_start: Vec2::new(2.0, 8.0),
        hiding_spots: Vec::new(),
        planner: PlannerConfig::default(),
        simulation: SimulationConfig::default(),
    }
}
