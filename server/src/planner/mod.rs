//! Visibility-aware evasion planning.
//!
//! The planner talks to the world only through the traits below, so tests
//! can drive it with stub geometry.

pub mod frame;
pub mod lookahead;
pub mod stall;

pub use frame::PlanningFrame;
pub use lookahead::LookaheadPlanner;
pub use stall::StallGuard;

use stealth_shared::{NavMesh, Observer, Vec2};

/// Line-of-sight and field-of-view queries
pub trait VisibilityOracle {
    /// Whether wall geometry blocks the line between two points
    fn is_occluded(&self, from: Vec2, to: Vec2) -> bool;

    /// Whether `point` lies inside the observer's current field of view
    fn is_inside_fov(&self, observer: &Observer, point: Vec2) -> bool;
}

/// Overlap test of a probe circle against wall geometry
pub trait ObstructionProbe {
    fn is_blocked(&self, point: Vec2, radius: f32) -> bool;
}

/// Long-horizon choice of a static place to hide
pub trait HidingSpotSelector {
    fn best_hiding_spot(&self, observers: &[Observer], navmesh: &NavMesh) -> Option<Vec2>;
}

/// Collaborators the planner consults during one tick
#[derive(Clone, Copy)]
pub struct PlannerEnv<'a> {
    pub navmesh: &'a NavMesh,
    pub oracle: &'a dyn VisibilityOracle,
    pub probe: &'a dyn ObstructionProbe,
    pub hiding: &'a dyn HidingSpotSelector,
}
