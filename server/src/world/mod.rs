//! Simulation world: map, guards, intruder and one episode's clock.

mod hiding_spots;
mod map;
mod vision;

pub use hiding_spots::{HidingSpots, SpotRanking};
pub use map::{default_map, GuardSpawn, MapDefinition, MapError, SimulationConfig};
pub use vision::WorldVision;

use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use stealth_shared::{IntruderPlanner, NavMesh, Observer, Vec2};

use crate::entities::{Guard, Intruder, IntruderContext, IntruderState};
use crate::planner::{PlannerEnv, VisibilityOracle};

/// Notable things that happened during a world update
#[derive(Debug, Clone, PartialEq)]
pub enum WorldEvent {
    IntruderSpotted { guard_id: u64, position: Vec2 },
    IntruderLost,
    SearchEnded,
    /// The lead guard stopped moving; the episode should be discarded
    EpisodeStalled,
}

/// One episode of guards searching for the intruder
pub struct EpisodeWorld {
    navmesh: NavMesh,
    vision: WorldVision,
    spots: HidingSpots,
    guards: Vec<Guard>,
    intruder: Intruder,
    sim: SimulationConfig,
    rng: StdRng,
    elapsed: f32,
}

impl EpisodeWorld {
    pub fn new(map: &MapDefinition, navmesh: NavMesh, strategy: IntruderPlanner, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let sim = map.simulation.clone();
        let vision = WorldVision::new(map.walls.clone(), sim.view_radius, sim.view_angle);

        let spots = if map.hiding_spots.is_empty() {
            HidingSpots::sample(&navmesh, &vision, map.planner.probe_radius, sim.hiding_spot_count, &mut rng)
        } else {
            HidingSpots::new(map.hiding_spots.clone())
        };

        let guards: Vec<Guard> = map
            .guards
            .iter()
            .enumerate()
            .map(|(i, spawn)| Guard::new(i as u64 + 1, spawn.patrol.clone()))
            .collect();

        let intruder = Intruder::new(map.intruder_start, strategy, &map.planner);

        info!(
            "Episode on '{}': {} guards, {} hiding spots, intruder planner {}",
            map.name,
            guards.len(),
            spots.spots().len(),
            strategy.name()
        );

        Self {
            navmesh,
            vision,
            spots,
            guards,
            intruder,
            sim,
            rng,
            elapsed: 0.0,
        }
    }

    pub fn intruder(&self) -> &Intruder {
        &self.intruder
    }

    pub fn guards(&self) -> &[Guard] {
        &self.guards
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn is_over(&self) -> bool {
        self.elapsed >= self.sim.episode_length
    }

    fn observers(&self) -> Vec<Observer> {
        self.guards.iter().map(Guard::observer).collect()
    }

    /// Step every agent by `delta` seconds
    pub fn update(&mut self, delta: f32) -> Vec<WorldEvent> {
        let mut events = Vec::new();

        // Perception first, so guards and intruder react to the same snapshot
        let observers = self.observers();
        let spotter = observers
            .iter()
            .find(|o| self.vision.is_inside_fov(o, self.intruder.position))
            .map(|o| o.id);

        let transition = self.intruder.observe(
            spotter.is_some(),
            self.sim.lose_sight_timeout,
            self.sim.search_duration,
            delta,
        );
        match (transition, spotter) {
            (Some(IntruderState::Chased), Some(guard_id)) => {
                debug!("Intruder spotted by guard {} at {:.1}s", guard_id, self.elapsed);
                events.push(WorldEvent::IntruderSpotted {
                    guard_id,
                    position: self.intruder.position,
                });
            }
            (Some(IntruderState::Hide), _) => events.push(WorldEvent::IntruderLost),
            (Some(IntruderState::Incognito), _) => events.push(WorldEvent::SearchEnded),
            _ => {}
        }

        let sighting = spotter.map(|_| self.intruder.position);
        for guard in &mut self.guards {
            guard.update(
                &self.navmesh,
                self.vision.walls(),
                sighting,
                self.sim.npc_speed,
                self.sim.search_duration,
                delta,
            );
        }

        let observers = self.observers();
        let was_stalled = self.intruder.metrics.stalled;
        let ranking = SpotRanking {
            spots: &self.spots,
            vision: &self.vision,
            from: self.intruder.position,
        };
        let ctx = IntruderContext {
            env: PlannerEnv {
                navmesh: &self.navmesh,
                oracle: &self.vision,
                probe: &self.vision,
                hiding: &ranking,
            },
            spots: &self.spots,
            walls: self.vision.walls(),
        };
        self.intruder
            .update(&ctx, &observers, self.sim.intruder_speed(), &mut self.rng, delta);

        if !was_stalled && self.intruder.metrics.stalled {
            events.push(WorldEvent::EpisodeStalled);
        }

        self.elapsed += delta;
        events
    }
}
