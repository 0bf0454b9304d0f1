//! Patrolling guard with a simple chase and search routine.

use log::{debug, trace};
use stealth_shared::{NavMesh, Observer, Vec2, COMPASS_DIRECTIONS};

use crate::navigation::{check_collision, follow_path, NavigationState, Obstacle, PathPlanner, AGENT_RADIUS};

/// Re-route a chase once the target has drifted this far
const CHASE_REPATH_DISTANCE: f32 = 0.5;

/// Distance of search points from the last known intruder location
const SEARCH_RADIUS: f32 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Patrol,
    /// Following the intruder while it is in view
    Chase,
    /// Checking the last known location after losing sight
    Search,
}

/// Server-side guard state
#[derive(Debug, Clone)]
pub struct Guard {
    pub id: u64,
    pub position: Vec2,
    /// Facing direction in radians
    pub rotation: f32,
    pub state: GuardState,
    patrol: Vec<Vec2>,
    patrol_index: usize,
    nav: NavigationState,
    paths: PathPlanner,
    chase_target: Option<Vec2>,
    search_time_left: f32,
    /// Next compass direction to sweep around the last known location
    search_step: usize,
}

impl Guard {
    /// Spawn at the first patrol waypoint
    pub fn new(id: u64, patrol: Vec<Vec2>) -> Self {
        let position = patrol.first().copied().unwrap_or_default();
        let rotation = patrol
            .get(1)
            .map(|next| (*next - position).angle())
            .unwrap_or(0.0);
        Self {
            id,
            position,
            rotation,
            state: GuardState::Patrol,
            patrol,
            patrol_index: 0,
            nav: NavigationState::new(),
            paths: PathPlanner::default(),
            chase_target: None,
            search_time_left: 0.0,
            search_step: 0,
        }
    }

    /// How the planner sees this guard
    pub fn observer(&self) -> Observer {
        Observer::new(self.id, self.position, self.rotation)
    }

    /// Update guard AI for one tick.
    ///
    /// `sighting` is the intruder's position when any guard currently sees
    /// it; guards share what they see.
    pub fn update(
        &mut self,
        navmesh: &NavMesh,
        walls: &[Obstacle],
        sighting: Option<Vec2>,
        speed: f32,
        search_duration: f32,
        delta: f32,
    ) {
        match (self.state, sighting) {
            (_, Some(target)) => {
                if self.state != GuardState::Chase {
                    debug!("Guard {} starts chasing", self.id);
                    self.state = GuardState::Chase;
                }
                let stale = self
                    .chase_target
                    .map_or(true, |t| t.distance_to(target) > CHASE_REPATH_DISTANCE);
                if stale {
                    self.route_to(navmesh, target);
                    self.chase_target = Some(target);
                }
            }
            (GuardState::Chase, None) => {
                debug!("Guard {} lost sight, searching", self.id);
                self.state = GuardState::Search;
                self.search_time_left = search_duration;
                self.search_step = 0;
                // Keep walking to the last place the intruder was seen
            }
            (GuardState::Search, None) => {
                self.search_time_left -= delta;
                if self.nav.is_finished() && !self.sweep_next(navmesh, walls) {
                    // Nowhere to walk, look around instead
                    self.rotation += std::f32::consts::FRAC_PI_2 * delta;
                }
                if self.search_time_left <= 0.0 {
                    debug!("Guard {} gives up the search", self.id);
                    self.state = GuardState::Patrol;
                    self.chase_target = None;
                    self.nav.clear_path();
                }
            }
            (GuardState::Patrol, None) => {
                if self.nav.is_finished() && !self.patrol.is_empty() {
                    self.patrol_index = (self.patrol_index + 1) % self.patrol.len();
                    let next = self.patrol[self.patrol_index];
                    self.route_to(navmesh, next);
                }
            }
        }

        if !self.nav.is_finished() {
            let result = follow_path(self.position, self.rotation, &mut self.nav, walls, speed, delta);
            self.position = result.new_position;
            self.rotation = result.rotation;
        }
    }

    /// Head for the next walkable point on a ring around the last known
    /// location; returns false when no such point can be routed to
    fn sweep_next(&mut self, navmesh: &NavMesh, walls: &[Obstacle]) -> bool {
        let center = self.chase_target.unwrap_or(self.position);

        for _ in 0..COMPASS_DIRECTIONS.len() {
            let direction = COMPASS_DIRECTIONS[self.search_step % COMPASS_DIRECTIONS.len()];
            self.search_step += 1;

            let point = center + direction * SEARCH_RADIUS;
            if navmesh.locate_polygon(point).is_none() || check_collision(point, AGENT_RADIUS, walls) {
                continue;
            }
            if point.distance_to(self.position) <= AGENT_RADIUS {
                continue;
            }
            self.route_to(navmesh, point);
            if !self.nav.is_finished() {
                trace!("Guard {} searching toward ({:.1}, {:.1})", self.id, point.x, point.y);
                return true;
            }
        }
        false
    }

    fn route_to(&mut self, navmesh: &NavMesh, target: Vec2) {
        match self.paths.shortest_path(navmesh, self.position, target) {
            Ok(path) => {
                trace!("Guard {} routed to ({:.1}, {:.1}) via {} waypoints", self.id, target.x, target.y, path.len());
                self.nav.set_path(path, self.position);
            }
            Err(e) => {
                debug!("Guard {} cannot reach ({:.1}, {:.1}): {}", self.id, target.x, target.y, e);
                self.nav.clear_path();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> NavMesh {
        NavMesh::from_rings(vec![vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(10.0, 10.0),
            Vec2::new(0.0, 10.0),
        ]])
        .unwrap()
    }

    #[test]
    fn test_patrol_walks_the_loop() {
        let mesh = room();
        let mut guard = Guard::new(1, vec![Vec2::new(1.0, 1.0), Vec2::new(5.0, 1.0)]);

        for _ in 0..20 {
            guard.update(&mesh, &[], None, 4.0, 10.0, 0.05);
        }
        // 4 units in 1 second reaches the second waypoint
        assert!(guard.position.distance_to(Vec2::new(5.0, 1.0)) < 0.05);
        assert_eq!(guard.state, GuardState::Patrol);

        // And turns back to the spawn point
        let mut closest = f32::MAX;
        for _ in 0..30 {
            guard.update(&mesh, &[], None, 4.0, 10.0, 0.05);
            closest = closest.min(guard.position.distance_to(Vec2::new(1.0, 1.0)));
        }
        assert!(closest < 0.05);
    }

    #[test]
    fn test_chase_then_search_then_patrol() {
        let mesh = room();
        let mut guard = Guard::new(1, vec![Vec2::new(1.0, 1.0), Vec2::new(1.0, 9.0)]);

        guard.update(&mesh, &[], Some(Vec2::new(8.0, 1.0)), 4.0, 1.0, 0.1);
        assert_eq!(guard.state, GuardState::Chase);
        assert!(guard.position.x > 1.0);

        guard.update(&mesh, &[], None, 4.0, 1.0, 0.1);
        assert_eq!(guard.state, GuardState::Search);

        for _ in 0..15 {
            guard.update(&mesh, &[], None, 4.0, 1.0, 0.1);
        }
        assert_eq!(guard.state, GuardState::Patrol);
    }

    #[test]
    fn test_search_keeps_the_guard_moving() {
        let mesh = room();
        let mut guard = Guard::new(1, vec![Vec2::new(1.0, 1.0), Vec2::new(1.0, 9.0)]);

        guard.update(&mesh, &[], Some(Vec2::new(3.0, 3.0)), 4.0, 20.0, 0.05);
        guard.update(&mesh, &[], None, 4.0, 20.0, 0.05);
        assert_eq!(guard.state, GuardState::Search);

        // Never idle for a whole second while the search lasts
        let mut last = guard.position;
        let mut idle = 0.0;
        for _ in 0..300 {
            guard.update(&mesh, &[], None, 4.0, 20.0, 0.05);
            assert_eq!(guard.state, GuardState::Search);
            if guard.position == last {
                idle += 0.05;
                assert!(idle < 1.0, "guard idle at {:?}", guard.position);
            } else {
                idle = 0.0;
            }
            last = guard.position;
            // Sweeps stay close to the last known location
            assert!(guard.position.distance_to(Vec2::new(3.0, 3.0)) <= SEARCH_RADIUS + 0.1);
        }
    }

    #[test]
    fn test_observer_reflects_pose() {
        let guard = Guard::new(3, vec![Vec2::new(2.0, 2.0), Vec2::new(2.0, 6.0)]);
        let observer = guard.observer();

        assert_eq!(observer.id, 3);
        assert_eq!(observer.position, Vec2::new(2.0, 2.0));
        assert!((observer.facing - std::f32::consts::FRAC_PI_2).abs() < 1e-5);
    }
}
