//! The evading agent: state machine, strategy dispatch and episode metrics.

use log::{debug, info};
use rand::Rng;
use serde::Serialize;
use stealth_shared::{IntruderPlanner, Observer, PlannerConfig, Vec2};

use crate::navigation::{follow_path, NavigationState, Obstacle, PathPlanner};
use crate::planner::{LookaheadPlanner, PlannerEnv, StallGuard};
use crate::world::HidingSpots;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IntruderState {
    /// Unnoticed
    Incognito,
    /// Currently in sight of a guard
    Chased,
    /// Out of sight while the guards search
    Hide,
}

/// Per-episode measurements
#[derive(Debug, Clone, Default, Serialize)]
pub struct IntruderMetrics {
    /// Seconds spent in the chased state
    pub alert_time: f32,
    /// Seconds spent hiding from a search
    pub searched_time: f32,
    pub times_spotted: u32,
    pub rescue_calls: u32,
    pub rescued_time: f32,
    pub travelled_distance: f32,
    pub stalled: bool,
}

/// What the intruder can consult while choosing where to go
pub struct IntruderContext<'a> {
    pub env: PlannerEnv<'a>,
    pub spots: &'a HidingSpots,
    pub walls: &'a [Obstacle],
}

/// Server-side intruder state
#[derive(Debug)]
pub struct Intruder {
    pub position: Vec2,
    pub rotation: f32,
    pub state: IntruderState,
    pub metrics: IntruderMetrics,
    strategy: IntruderPlanner,
    lookahead: Option<LookaheadPlanner>,
    stall: StallGuard,
    nav: NavigationState,
    paths: PathPlanner,
    unseen_for: f32,
    /// Strategy must pick a new goal on the next update
    needs_goal: bool,
}

impl Intruder {
    pub fn new(position: Vec2, strategy: IntruderPlanner, config: &PlannerConfig) -> Self {
        let lookahead = match strategy {
            IntruderPlanner::Lookahead { depth } => {
                Some(LookaheadPlanner::new(config.clone().with_depth(depth)))
            }
            IntruderPlanner::Random | IntruderPlanner::Heuristic => None,
        };
        Self {
            position,
            rotation: 0.0,
            state: IntruderState::Incognito,
            metrics: IntruderMetrics::default(),
            strategy,
            lookahead,
            stall: StallGuard::new(config.stall_window),
            nav: NavigationState::new(),
            paths: PathPlanner::new(config.wall_clearance),
            unseen_for: 0.0,
            needs_goal: true,
        }
    }

    pub fn is_chased(&self) -> bool {
        self.state == IntruderState::Chased
    }

    /// Advance the state machine; returns the new state on a transition.
    ///
    /// Incognito or Hide become Chased as soon as a guard sees the intruder.
    /// Chased becomes Hide after `lose_sight_timeout` unseen seconds, and Hide
    /// returns to Incognito once the guards' search is over.
    pub fn observe(&mut self, seen: bool, lose_sight_timeout: f32, search_duration: f32, dt: f32) -> Option<IntruderState> {
        let next = if seen {
            self.unseen_for = 0.0;
            match self.state {
                IntruderState::Chased => None,
                _ => {
                    self.metrics.times_spotted += 1;
                    Some(IntruderState::Chased)
                }
            }
        } else {
            self.unseen_for += dt;
            match self.state {
                IntruderState::Chased if self.unseen_for >= lose_sight_timeout => Some(IntruderState::Hide),
                IntruderState::Hide if self.unseen_for >= lose_sight_timeout + search_duration => {
                    Some(IntruderState::Incognito)
                }
                _ => None,
            }
        };

        if let Some(state) = next {
            debug!("Intruder {:?} -> {:?}", self.state, state);
            self.state = state;
            self.needs_goal = true;
        }
        next
    }

    /// Choose a goal with the configured strategy and walk toward it
    pub fn update<R: Rng>(&mut self, ctx: &IntruderContext<'_>, observers: &[Observer], speed: f32, rng: &mut R, dt: f32) {
        self.update_metrics(dt);

        let chased = self.is_chased();
        match self.lookahead.as_mut() {
            Some(planner) => {
                let outcome = planner.advance(&ctx.env, self.position, observers, chased, dt);
                let changed = self
                    .nav
                    .destination()
                    .map_or(true, |d| !d.approx_eq(outcome.goal));
                if changed {
                    if outcome.is_routed_hide() {
                        debug!(
                            "Intruder heading for hiding spot ({:.1}, {:.1})",
                            outcome.goal.x, outcome.goal.y
                        );
                    }
                    self.nav.set_path(outcome.route.clone(), self.position);
                }
                self.metrics.rescue_calls = outcome.telemetry.fallback_count;
                self.metrics.rescued_time = outcome.telemetry.fallback_duration;
                self.metrics.stalled = outcome.telemetry.stalled;
            }
            None => {
                self.stall.update(observers.first().map(|o| o.position), dt);
                self.metrics.stalled = self.stall.is_stalled();

                if self.needs_goal || self.nav.is_finished() {
                    let goal = match self.strategy {
                        IntruderPlanner::Heuristic => ctx.env.hiding.best_hiding_spot(observers, ctx.env.navmesh),
                        _ => ctx.spots.random_spot(rng),
                    };
                    if let Some(goal) = goal {
                        self.route_to(&ctx.env, goal);
                    }
                }
            }
        }
        self.needs_goal = false;

        let result = follow_path(self.position, self.rotation, &mut self.nav, ctx.walls, speed, dt);
        self.position = result.new_position;
        self.rotation = result.rotation;
        self.metrics.travelled_distance += result.travelled;
    }

    fn update_metrics(&mut self, dt: f32) {
        match self.state {
            IntruderState::Chased => self.metrics.alert_time += dt,
            IntruderState::Hide => self.metrics.searched_time += dt,
            IntruderState::Incognito => {}
        }
    }

    fn route_to(&mut self, env: &PlannerEnv<'_>, goal: Vec2) {
        match self.paths.shortest_path(env.navmesh, self.position, goal) {
            Ok(path) => self.nav.set_path(path, self.position),
            Err(e) => {
                info!("Intruder cannot reach ({:.1}, {:.1}): {}", goal.x, goal.y, e);
                self.nav.clear_path();
            }
        }
    }
}
