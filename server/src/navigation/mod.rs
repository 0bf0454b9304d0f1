//! Navigation for simulated agents.
//!
//! This module provides:
//! - Corridor search over the navmesh and funnel smoothing into waypoints
//! - Wall obstacles, overlap probes and line-of-sight tests
//! - Waypoint following with collision resolution

pub mod funnel;
pub mod obstacles;
pub mod pathfinding;

pub use obstacles::{check_collision, line_blocked, resolve_collision, BoxObstacle, CircleObstacle, Obstacle};
pub use pathfinding::{path_length, shortest_path, PathError, PathPlanner};

use log::{debug, trace};
use stealth_shared::Vec2;

/// Radius used for agent collision against walls
pub const AGENT_RADIUS: f32 = 0.3;

/// Distance at which a waypoint counts as reached
const WAYPOINT_TOLERANCE: f32 = 0.05;

/// Result of one locomotion step
#[derive(Debug, Clone, Copy)]
pub struct NavigationResult {
    /// The new position to move to
    pub new_position: Vec2,
    /// The direction to face (in radians)
    pub rotation: f32,
    /// Distance actually covered this step
    pub travelled: f32,
    /// Whether the last waypoint has been reached
    pub arrived: bool,
}

/// Waypoint list an agent is currently walking
#[derive(Debug, Clone, Default)]
pub struct NavigationState {
    /// Current waypoint path
    pub path: Vec<Vec2>,
    /// Current waypoint index
    pub path_index: usize,
}

impl NavigationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the route; a leading waypoint equal to `from` is skipped
    pub fn set_path(&mut self, path: Vec<Vec2>, from: Vec2) {
        self.path = path;
        self.path_index = 0;
        if self.path.len() > 1 && self.path[0].distance_to(from) < WAYPOINT_TOLERANCE {
            self.path_index = 1;
        }
    }

    /// Clear the current path
    pub fn clear_path(&mut self) {
        self.path.clear();
        self.path_index = 0;
    }

    /// Get the current waypoint target, if any
    pub fn current_waypoint(&self) -> Option<Vec2> {
        self.path.get(self.path_index).copied()
    }

    /// Final waypoint of the route
    pub fn destination(&self) -> Option<Vec2> {
        self.path.last().copied()
    }

    /// Advance to the next waypoint
    pub fn advance_waypoint(&mut self) {
        if self.path_index < self.path.len() {
            self.path_index += 1;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.path_index >= self.path.len()
    }
}

/// Walk along the current route for one step of `speed * delta`.
///
/// Several waypoints can be passed in a single step when they are close
/// together. The final position is pushed out of any wall it overlaps.
pub fn follow_path(
    current_pos: Vec2,
    rotation: f32,
    nav_state: &mut NavigationState,
    obstacles: &[Obstacle],
    speed: f32,
    delta: f32,
) -> NavigationResult {
    let mut position = current_pos;
    let mut heading = rotation;
    let mut budget = speed * delta;

    while budget > 0.0 {
        let Some(waypoint) = nav_state.current_waypoint() else {
            break;
        };
        let to_waypoint = waypoint - position;
        let dist = to_waypoint.length();

        if dist <= WAYPOINT_TOLERANCE {
            nav_state.advance_waypoint();
            continue;
        }

        heading = to_waypoint.angle();
        if dist <= budget {
            position = waypoint;
            budget -= dist;
            nav_state.advance_waypoint();
            trace!("[NAV] reached waypoint ({:.2}, {:.2})", waypoint.x, waypoint.y);
        } else {
            position += to_waypoint.normalized() * budget;
            budget = 0.0;
        }
    }

    let resolved = resolve_collision(position, AGENT_RADIUS, obstacles);
    if !resolved.approx_eq(position) {
        debug!(
            "[NAV] collision resolved: ({:.2}, {:.2}) -> ({:.2}, {:.2})",
            position.x, position.y, resolved.x, resolved.y
        );
    }

    NavigationResult {
        new_position: resolved,
        rotation: heading,
        travelled: current_pos.distance_to(resolved),
        arrived: nav_state.is_finished(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_follow_path_moves_at_speed() {
        let mut state = NavigationState::new();
        let start = Vec2::new(0.0, 0.0);
        state.set_path(vec![start, Vec2::new(10.0, 0.0)], start);

        let result = follow_path(start, 0.0, &mut state, &[], 4.0, 0.5);

        assert!(result.new_position.approx_eq(Vec2::new(2.0, 0.0)));
        assert!((result.travelled - 2.0).abs() < 1e-5);
        assert!(!result.arrived);
    }

    #[test]
    fn test_follow_path_turns_corners_within_one_step() {
        let mut state = NavigationState::new();
        let start = Vec2::new(0.0, 0.0);
        state.set_path(vec![Vec2::new(1.0, 0.0), Vec2::new(1.0, 1.0), Vec2::new(1.0, 5.0)], start);

        let result = follow_path(start, 0.0, &mut state, &[], 3.0, 1.0);

        assert!(result.new_position.approx_eq(Vec2::new(1.0, 2.0)));
        assert!((result.rotation - std::f32::consts::FRAC_PI_2).abs() < 1e-5);
        assert_eq!(state.current_waypoint(), Some(Vec2::new(1.0, 5.0)));
    }

    #[test]
    fn test_follow_path_arrives() {
        let mut state = NavigationState::new();
        let start = Vec2::new(0.0, 0.0);
        state.set_path(vec![Vec2::new(0.5, 0.0)], start);

        let result = follow_path(start, 0.0, &mut state, &[], 4.0, 1.0);

        assert!(result.arrived);
        assert!(result.new_position.approx_eq(Vec2::new(0.5, 0.0)));
        assert_eq!(state.current_waypoint(), None);
    }

    #[test]
    fn test_follow_path_respects_walls() {
        let wall = Obstacle::Box(BoxObstacle::from_corners(2.0, -1.0, 3.0, 1.0));
        let mut state = NavigationState::new();
        let start = Vec2::new(0.0, 0.0);
        state.set_path(vec![Vec2::new(2.1, 0.0)], start);

        let result = follow_path(start, 0.0, &mut state, &[wall], 4.0, 1.0);
        assert!(result.new_position.x < 2.0 - AGENT_RADIUS + 1e-4);
    }
}
