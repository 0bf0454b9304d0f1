//! One planning cycle's working set: candidate positions, projected observers and scores.

use std::collections::HashSet;

use log::trace;
use stealth_shared::{Observer, PlannerConfig, Vec2};

use super::PlannerEnv;
use crate::navigation::PathPlanner;

/// Quantized grid cell used to deduplicate float positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellKey {
    pub x: i64,
    pub y: i64,
}

impl CellKey {
    pub fn quantize(position: Vec2, resolution: f32) -> Self {
        Self {
            x: (position.x / resolution).round() as i64,
            y: (position.y / resolution).round() as i64,
        }
    }
}

/// A position a tracked observer could reach, `hops` steps from where it was seen
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedObserver {
    pub observer_id: u64,
    pub position: Vec2,
    pub hops: u32,
}

impl ProjectedObserver {
    pub fn weight(&self) -> f32 {
        1.0 / self.hops as f32
    }
}

/// Candidate agent positions and projected observer positions for one cycle
#[derive(Debug, Clone)]
pub struct PlanningFrame {
    candidates: Vec<Vec2>,
    projections: Vec<ProjectedObserver>,
    sentinel: f32,
}

impl PlanningFrame {
    /// Build the frame directly from already expanded sets
    pub fn from_parts(candidates: Vec<Vec2>, projections: Vec<ProjectedObserver>) -> Self {
        // Any unoccluded sum is at most the total weight
        let sentinel = projections.iter().map(|p| p.weight()).sum::<f32>() + 1.0;
        Self {
            candidates,
            projections,
            sentinel,
        }
    }

    /// Expand candidates around `current` and project every observer forward
    pub fn expand(
        config: &PlannerConfig,
        env: &PlannerEnv<'_>,
        paths: &mut PathPlanner,
        current: Vec2,
        observers: &[Observer],
    ) -> Self {
        let candidates = expand_candidates(config, env, paths, current);
        let projections = project_observers(config, env, observers);
        trace!(
            "[PLAN] frame: {} candidates, {} projected observers",
            candidates.len(),
            projections.len()
        );
        Self::from_parts(candidates, projections)
    }

    pub fn candidates(&self) -> &[Vec2] {
        &self.candidates
    }

    pub fn projections(&self) -> &[ProjectedObserver] {
        &self.projections
    }

    /// Score that dominates any weighted exposure sum
    pub fn sentinel(&self) -> f32 {
        self.sentinel
    }

    /// Exposure of `point`: the sentinel when a current observer sees it,
    /// otherwise the summed weight of projected observers with line of sight
    pub fn score(&self, env: &PlannerEnv<'_>, observers: &[Observer], point: Vec2) -> f32 {
        if is_seen(env, observers, point) {
            return self.sentinel;
        }
        self.projections
            .iter()
            .filter(|p| !env.oracle.is_occluded(p.position, point))
            .map(|p| p.weight())
            .sum()
    }

    /// Worst exposure along `path`, sampled every `step` units after `origin`.
    ///
    /// With `punish_breaking_cover`, a sample that gains line of sight to a
    /// current observer right after one that had none costs the sentinel.
    pub fn path_cost(
        &self,
        env: &PlannerEnv<'_>,
        observers: &[Observer],
        origin: Vec2,
        path: &[Vec2],
        step: f32,
        punish_breaking_cover: bool,
    ) -> f32 {
        let mut worst = 0.0f32;
        let mut was_exposed = is_exposed(env, observers, origin);

        for sample in sample_path(path, step) {
            if punish_breaking_cover {
                let exposed = is_exposed(env, observers, sample);
                if exposed && !was_exposed {
                    return self.sentinel;
                }
                was_exposed = exposed;
            }
            worst = worst.max(self.score(env, observers, sample));
        }

        worst
    }
}

/// Inside some current observer's field of view
pub fn is_seen(env: &PlannerEnv<'_>, observers: &[Observer], point: Vec2) -> bool {
    observers.iter().any(|o| env.oracle.is_inside_fov(o, point))
}

/// In line of sight of some current observer, regardless of facing
fn is_exposed(env: &PlannerEnv<'_>, observers: &[Observer], point: Vec2) -> bool {
    observers
        .iter()
        .any(|o| !env.oracle.is_occluded(o.position, point))
}

/// Points every `step` along each segment, excluding the path's first point
fn sample_path(path: &[Vec2], step: f32) -> Vec<Vec2> {
    let mut samples = Vec::new();
    for segment in path.windows(2) {
        let (a, b) = (segment[0], segment[1]);
        let count = ((a.distance_to(b) / step).ceil() as usize).max(1);
        for k in 1..=count {
            samples.push(a.lerp(b, k as f32 / count as f32));
        }
    }
    if samples.is_empty() {
        if let Some(&only) = path.first() {
            samples.push(only);
        }
    }
    samples
}

fn expand_candidates(
    config: &PlannerConfig,
    env: &PlannerEnv<'_>,
    paths: &mut PathPlanner,
    current: Vec2,
) -> Vec<Vec2> {
    let resolution = config.step_size * 0.25;
    let mut visited = HashSet::new();
    visited.insert(CellKey::quantize(current, resolution));

    let mut candidates = vec![current];
    let mut frontier = vec![current];

    for _ in 0..config.depth {
        let mut next = Vec::new();
        for &position in &frontier {
            for &direction in &config.directions {
                let proposed = position + direction * config.step_size;
                // Rejected cells stay visited so they are not probed twice
                if !visited.insert(CellKey::quantize(proposed, resolution)) {
                    continue;
                }
                if env.probe.is_blocked(proposed, config.probe_radius) {
                    continue;
                }
                if current.distance_to(proposed) >= config.reach_cap {
                    continue;
                }
                match paths.shortest_path_distance(env.navmesh, current, proposed) {
                    Some(distance) if distance < config.reach_cap => next.push(proposed),
                    _ => continue,
                }
            }
        }
        candidates.extend_from_slice(&next);
        frontier = next;
    }

    candidates
}

fn project_observers(
    config: &PlannerConfig,
    env: &PlannerEnv<'_>,
    observers: &[Observer],
) -> Vec<ProjectedObserver> {
    let resolution = config.step_size * 0.25;
    let mut visited = HashSet::new();
    let mut projections = Vec::new();

    for observer in observers {
        let seed = ProjectedObserver {
            observer_id: observer.id,
            position: observer.position,
            hops: 1,
        };
        visited.insert((observer.id, CellKey::quantize(observer.position, resolution)));
        projections.push(seed);

        let mut frontier = vec![seed];
        for _ in 0..config.depth {
            let mut next = Vec::new();
            for projection in &frontier {
                for &direction in &config.directions {
                    let proposed = projection.position + direction * config.step_size;
                    if !visited.insert((observer.id, CellKey::quantize(proposed, resolution))) {
                        continue;
                    }
                    if env.probe.is_blocked(proposed, config.probe_radius) {
                        continue;
                    }
                    if config.mode.dead_reckoning() && !is_seen(env, observers, proposed) {
                        continue;
                    }
                    next.push(ProjectedObserver {
                        observer_id: observer.id,
                        position: proposed,
                        hops: projection.hops + 1,
                    });
                }
            }
            projections.extend_from_slice(&next);
            frontier = next;
        }
    }

    projections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{HidingSpotSelector, ObstructionProbe, VisibilityOracle};
    use stealth_shared::NavMesh;

    struct OpenField;

    impl VisibilityOracle for OpenField {
        fn is_occluded(&self, _from: Vec2, _to: Vec2) -> bool {
            false
        }

        fn is_inside_fov(&self, observer: &Observer, point: Vec2) -> bool {
            observer.position.distance_to(point) < 1.0
        }
    }

    /// Everything left of x = 5 is hidden behind a wall
    struct HalfWall;

    impl VisibilityOracle for HalfWall {
        fn is_occluded(&self, _from: Vec2, to: Vec2) -> bool {
            to.x < 5.0
        }

        fn is_inside_fov(&self, _observer: &Observer, _point: Vec2) -> bool {
            false
        }
    }

    impl ObstructionProbe for OpenField {
        fn is_blocked(&self, _point: Vec2, _radius: f32) -> bool {
            false
        }
    }

    impl HidingSpotSelector for OpenField {
        fn best_hiding_spot(&self, _observers: &[Observer], _navmesh: &NavMesh) -> Option<Vec2> {
            None
        }
    }

    fn field() -> NavMesh {
        NavMesh::from_rings(vec![vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(20.0, 0.0),
            Vec2::new(20.0, 20.0),
            Vec2::new(0.0, 20.0),
        ]])
        .unwrap()
    }

    fn projections() -> Vec<ProjectedObserver> {
        vec![
            ProjectedObserver { observer_id: 1, position: Vec2::new(10.0, 10.0), hops: 1 },
            ProjectedObserver { observer_id: 1, position: Vec2::new(10.5, 10.0), hops: 2 },
            ProjectedObserver { observer_id: 1, position: Vec2::new(11.0, 10.0), hops: 4 },
        ]
    }

    #[test]
    fn test_cell_key_quantization() {
        let resolution = 0.125;
        assert_eq!(
            CellKey::quantize(Vec2::new(1.0, 2.0), resolution),
            CellKey::quantize(Vec2::new(1.0 + 1e-4, 2.0 - 1e-4), resolution)
        );
        assert_ne!(
            CellKey::quantize(Vec2::new(1.0, 2.0), resolution),
            CellKey::quantize(Vec2::new(1.5, 2.0), resolution)
        );
    }

    #[test]
    fn test_sentinel_dominates_exposure() {
        let mesh = field();
        let env = PlannerEnv { navmesh: &mesh, oracle: &OpenField, probe: &OpenField, hiding: &OpenField };
        let observers = [Observer::new(1, Vec2::new(10.0, 10.0), 0.0)];
        let frame = PlanningFrame::from_parts(vec![], projections());

        assert!((frame.sentinel() - 2.75).abs() < 1e-5);

        let seen = frame.score(&env, &observers, Vec2::new(10.2, 10.0));
        assert_eq!(seen, frame.sentinel());

        // Visible to every projection but outside the field of view
        let exposed = frame.score(&env, &observers, Vec2::new(15.0, 15.0));
        assert!((exposed - 1.75).abs() < 1e-5);
        assert!(exposed < frame.sentinel());
    }

    #[test]
    fn test_path_cost_takes_worst_sample() {
        let mesh = field();
        let env = PlannerEnv { navmesh: &mesh, oracle: &HalfWall, probe: &OpenField, hiding: &OpenField };
        let observers = [Observer::new(1, Vec2::new(10.0, 10.0), 0.0)];
        let frame = PlanningFrame::from_parts(vec![], projections());

        // Ends hidden but crosses open ground on the way
        let path = [Vec2::new(2.0, 1.0), Vec2::new(6.0, 1.0), Vec2::new(3.0, 1.0)];
        let cost = frame.path_cost(&env, &observers, path[0], &path, 0.5, false);
        assert!((cost - 1.75).abs() < 1e-5);

        let hidden = [Vec2::new(1.0, 1.0), Vec2::new(4.0, 1.0)];
        assert_eq!(frame.path_cost(&env, &observers, hidden[0], &hidden, 0.5, false), 0.0);
    }

    #[test]
    fn test_breaking_cover_is_punished() {
        let mesh = field();
        let env = PlannerEnv { navmesh: &mesh, oracle: &HalfWall, probe: &OpenField, hiding: &OpenField };
        let observers = [Observer::new(1, Vec2::new(10.0, 10.0), 0.0)];
        let frame = PlanningFrame::from_parts(vec![], projections());

        let path = [Vec2::new(4.0, 1.0), Vec2::new(6.0, 1.0)];
        let relaxed = frame.path_cost(&env, &observers, path[0], &path, 0.5, false);
        let punished = frame.path_cost(&env, &observers, path[0], &path, 0.5, true);

        assert!(relaxed < frame.sentinel());
        assert_eq!(punished, frame.sentinel());

        // Already in the open: no transition to punish
        let open = [Vec2::new(6.0, 1.0), Vec2::new(7.0, 1.0)];
        let cost = frame.path_cost(&env, &observers, open[0], &open, 0.5, true);
        assert!(cost < frame.sentinel());
    }

    #[test]
    fn test_sample_path_excludes_origin() {
        let samples = sample_path(&[Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0)], 0.5);
        assert_eq!(samples, vec![Vec2::new(0.5, 0.0), Vec2::new(1.0, 0.0)]);

        let stay = sample_path(&[Vec2::new(2.0, 2.0), Vec2::new(2.0, 2.0)], 0.5);
        assert_eq!(stay, vec![Vec2::new(2.0, 2.0)]);
    }

    #[test]
    fn test_expand_respects_depth_and_dedup() {
        let mesh = field();
        let env = PlannerEnv { navmesh: &mesh, oracle: &OpenField, probe: &OpenField, hiding: &OpenField };
        let mut paths = PathPlanner::default();
        let config = PlannerConfig::default().with_depth(1);

        let frame = PlanningFrame::expand(&config, &env, &mut paths, Vec2::new(10.0, 10.0), &[]);
        assert_eq!(frame.candidates().len(), 9);

        let config = PlannerConfig::default().with_depth(2);
        let frame = PlanningFrame::expand(&config, &env, &mut paths, Vec2::new(10.0, 10.0), &[]);
        let unique: HashSet<CellKey> = frame
            .candidates()
            .iter()
            .map(|c| CellKey::quantize(*c, 0.125))
            .collect();
        assert_eq!(unique.len(), frame.candidates().len());
        assert!(frame.candidates().len() > 9);
    }

    #[test]
    fn test_dead_reckoning_keeps_projections_in_view() {
        let mesh = field();
        let env = PlannerEnv { navmesh: &mesh, oracle: &OpenField, probe: &OpenField, hiding: &OpenField };
        let observers = [Observer::new(7, Vec2::new(10.0, 10.0), 0.0)];
        let mut config = PlannerConfig::default().with_depth(4);

        let free = project_observers(&config, &env, &observers);
        config.mode.projection = stealth_shared::ObserverProjection::DeadReckoning;
        let reckoned = project_observers(&config, &env, &observers);

        assert!(reckoned.len() < free.len());
        for projection in &reckoned {
            assert_eq!(projection.observer_id, 7);
            assert!(projection.position.distance_to(observers[0].position) < 1.0);
        }
        assert!(free.iter().any(|p| p.hops == 5));
    }
}
