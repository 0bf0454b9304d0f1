//! Evasion planner configuration and outcome types.

use std::f32::consts::FRAC_1_SQRT_2;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::Vec2;

/// Seconds between planner recomputations
pub const DEFAULT_REPLAN_INTERVAL: f32 = 0.25;

/// Distance the lookahead moves a candidate per expansion round
pub const DEFAULT_STEP_SIZE: f32 = 0.5;

/// Offset applied to funnel pivots so paths do not graze walls
pub const DEFAULT_WALL_CLEARANCE: f32 = 0.3;

/// The 8 compass and diagonal unit directions
pub const COMPASS_DIRECTIONS: [Vec2; 8] = [
    Vec2::new(0.0, 1.0),
    Vec2::new(0.0, -1.0),
    Vec2::new(-1.0, 0.0),
    Vec2::new(1.0, 0.0),
    Vec2::new(FRAC_1_SQRT_2, FRAC_1_SQRT_2),
    Vec2::new(FRAC_1_SQRT_2, -FRAC_1_SQRT_2),
    Vec2::new(-FRAC_1_SQRT_2, FRAC_1_SQRT_2),
    Vec2::new(-FRAC_1_SQRT_2, -FRAC_1_SQRT_2),
];

/// A tracked observer (guard) as seen by the planner
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observer {
    pub id: u64,
    pub position: Vec2,
    /// Facing direction in radians
    pub facing: f32,
}

impl Observer {
    pub fn new(id: u64, position: Vec2, facing: f32) -> Self {
        Self { id, position, facing }
    }
}

/// How projected observer positions are generated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObserverProjection {
    /// Any unobstructed position within the lookahead depth
    #[default]
    Unconstrained,
    /// Only positions already inside some observer's field of view
    DeadReckoning,
}

/// When the planner gives up on local moves and routes to a hiding spot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationPolicy {
    /// Only when seen and no local candidate improves on staying put
    #[default]
    WhenCornered,
    /// Also whenever the agent is being chased
    WhenChased,
}

/// How a candidate's path exposure is aggregated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExposurePolicy {
    /// Worst sample along the path
    #[default]
    WorstCase,
    /// Worst sample, and leaving cover into line of sight counts as being seen
    PunishBreakingCover,
}

/// Planner behavior, chosen once per agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerMode {
    pub projection: ObserverProjection,
    pub escalation: EscalationPolicy,
    pub exposure: ExposurePolicy,
}

impl PlannerMode {
    pub fn dead_reckoning(&self) -> bool {
        self.projection == ObserverProjection::DeadReckoning
    }

    pub fn rescue_when_seen(&self) -> bool {
        self.escalation == EscalationPolicy::WhenChased
    }

    pub fn punish_unseen_to_seen(&self) -> bool {
        self.exposure == ExposurePolicy::PunishBreakingCover
    }
}

/// A planner tunable outside its usable range
#[derive(Debug, Clone, PartialEq, Error)]
#[error("planner {field} {requirement}, got {value}")]
pub struct ConfigError {
    pub field: &'static str,
    pub requirement: &'static str,
    pub value: String,
}

impl ConfigError {
    fn new(field: &'static str, requirement: &'static str, value: impl ToString) -> Self {
        Self {
            field,
            requirement,
            value: value.to_string(),
        }
    }
}

/// Tunables of the lookahead planner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Expansion rounds
    pub depth: usize,
    pub step_size: f32,
    pub directions: Vec<Vec2>,
    /// Seconds between recomputations
    pub replan_interval: f32,
    /// How many of the best-scored candidates get a full path check
    pub refine_count: usize,
    pub mode: PlannerMode,
    pub wall_clearance: f32,
    /// Radius of the wall overlap probe for candidate positions
    pub probe_radius: f32,
    /// Candidates must be closer than this along the navmesh
    pub reach_cap: f32,
    /// Seconds the lead observer may stand still before the episode is flagged
    pub stall_window: f32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            depth: 5,
            step_size: DEFAULT_STEP_SIZE,
            directions: COMPASS_DIRECTIONS.to_vec(),
            replan_interval: DEFAULT_REPLAN_INTERVAL,
            refine_count: 10,
            mode: PlannerMode::default(),
            wall_clearance: DEFAULT_WALL_CLEARANCE,
            probe_radius: 0.5,
            reach_cap: 10.0,
            stall_window: 5.0,
        }
    }
}

impl PlannerConfig {
    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_mode(mut self, mode: PlannerMode) -> Self {
        self.mode = mode;
        self
    }

    /// Reject values that would make planning loop forever or never move
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = |v: f32| v.is_finite() && v > 0.0;

        if !positive(self.step_size) {
            return Err(ConfigError::new("step_size", "must be positive", self.step_size));
        }
        if !(self.replan_interval.is_finite() && self.replan_interval >= 0.0) {
            return Err(ConfigError::new("replan_interval", "must not be negative", self.replan_interval));
        }
        if self.refine_count == 0 {
            return Err(ConfigError::new("refine_count", "must be at least 1", self.refine_count));
        }
        if self.directions.is_empty() {
            return Err(ConfigError::new("directions", "must not be empty", "[]"));
        }
        if let Some(d) = self.directions.iter().find(|d| !positive(d.length())) {
            return Err(ConfigError::new("directions", "must be non-zero", format!("({}, {})", d.x, d.y)));
        }
        if !(self.wall_clearance.is_finite() && self.wall_clearance >= 0.0) {
            return Err(ConfigError::new("wall_clearance", "must not be negative", self.wall_clearance));
        }
        if !positive(self.probe_radius) {
            return Err(ConfigError::new("probe_radius", "must be positive", self.probe_radius));
        }
        if !positive(self.reach_cap) {
            return Err(ConfigError::new("reach_cap", "must be positive", self.reach_cap));
        }
        if !positive(self.stall_window) {
            return Err(ConfigError::new("stall_window", "must be positive", self.stall_window));
        }
        Ok(())
    }
}

/// Strategy an intruder uses to pick where to go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntruderPlanner {
    /// Random static hiding spot
    Random,
    /// Best static hiding spot by fitness against all guards
    Heuristic,
    /// Visibility-aware lookahead with hiding-spot fallback
    Lookahead { depth: usize },
}

impl Default for IntruderPlanner {
    fn default() -> Self {
        Self::Lookahead { depth: 5 }
    }
}

impl IntruderPlanner {
    pub fn name(&self) -> String {
        match self {
            Self::Random => "random".to_string(),
            Self::Heuristic => "heuristic".to_string(),
            Self::Lookahead { depth } => format!("lookahead-{}", depth),
        }
    }

    /// Parse a name produced by [`IntruderPlanner::name`]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "random" => Some(Self::Random),
            "heuristic" => Some(Self::Heuristic),
            _ => {
                let depth = name.strip_prefix("lookahead-")?.parse().ok()?;
                Some(Self::Lookahead { depth })
            }
        }
    }
}

/// How locomotion should reach the planner's goal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoutingMode {
    /// Walk straight to the goal; it is one bounded step away
    DirectHop,
    /// Follow the navmesh route to a long-horizon hiding spot
    RoutedHide,
}

/// Counters the metrics layer reads from the planner
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PlannerTelemetry {
    /// Times the hiding-spot fallback was invoked
    pub fallback_count: u32,
    /// Seconds spent following a fallback route
    pub fallback_duration: f32,
    /// The lead observer stood still for a whole stall window
    pub stalled: bool,
}

/// Result of one planner tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerOutcome {
    pub goal: Vec2,
    pub routing: RoutingMode,
    /// Waypoints to follow; ends at `goal`
    pub route: Vec<Vec2>,
    /// Exposure score of the chosen goal
    pub score: f32,
    pub telemetry: PlannerTelemetry,
}

impl PlannerOutcome {
    pub fn stay(position: Vec2, score: f32, telemetry: PlannerTelemetry) -> Self {
        Self {
            goal: position,
            routing: RoutingMode::DirectHop,
            route: vec![position],
            score,
            telemetry,
        }
    }

    pub fn is_direct_hop(&self) -> bool {
        self.routing == RoutingMode::DirectHop
    }

    pub fn is_routed_hide(&self) -> bool {
        self.routing == RoutingMode::RoutedHide
    }
}
