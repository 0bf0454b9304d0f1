//! Static hiding spots and their ranking against the guards.

use log::{debug, info};
use rand::Rng;
use stealth_shared::{NavMesh, Observer, Vec2};

use super::vision::WorldVision;
use crate::navigation::PathPlanner;
use crate::planner::{HidingSpotSelector, ObstructionProbe, VisibilityOracle};

/// Candidate places for the intruder to hide
#[derive(Debug, Clone, Default)]
pub struct HidingSpots {
    spots: Vec<Vec2>,
}

impl HidingSpots {
    pub fn new(spots: Vec<Vec2>) -> Self {
        Self { spots }
    }

    /// Sample `count` points inside the navmesh, away from walls.
    ///
    /// Polygons are picked proportionally to their area, then a point is
    /// drawn inside by rejection sampling over the bounding box.
    pub fn sample<R: Rng>(navmesh: &NavMesh, probe: &dyn ObstructionProbe, clearance: f32, count: usize, rng: &mut R) -> Self {
        let total_area = navmesh.walkable_area();
        let mut spots = Vec::with_capacity(count);
        if navmesh.is_empty() || total_area <= 0.0 {
            return Self { spots };
        }

        let mut attempts = 0;
        while spots.len() < count && attempts < count * 100 {
            attempts += 1;

            let mut roll = rng.gen_range(0.0..total_area);
            let polygon = navmesh
                .polygons()
                .iter()
                .find(|p| {
                    let area = stealth_shared::signed_area_doubled(p.vertices()).abs() * 0.5;
                    roll -= area;
                    roll <= 0.0
                })
                .unwrap_or(&navmesh.polygons()[navmesh.len() - 1]);

            let (min, max) = bounds(polygon.vertices());
            if min.x >= max.x || min.y >= max.y {
                continue;
            }
            let point = Vec2::new(rng.gen_range(min.x..max.x), rng.gen_range(min.y..max.y));
            if polygon.contains(point) && !probe.is_blocked(point, clearance) {
                spots.push(point);
            }
        }

        info!("Sampled {} hiding spots in {} attempts", spots.len(), attempts);
        Self { spots }
    }

    pub fn spots(&self) -> &[Vec2] {
        &self.spots
    }

    pub fn random_spot<R: Rng>(&self, rng: &mut R) -> Option<Vec2> {
        if self.spots.is_empty() {
            return None;
        }
        Some(self.spots[rng.gen_range(0..self.spots.len())])
    }

    /// Fitness of every spot: navmesh distance to the nearest guard, or
    /// `None` when some guard can currently see it or the agent at `from`
    /// has no route there
    pub fn fitness(&self, observers: &[Observer], navmesh: &NavMesh, vision: &WorldVision, from: Vec2) -> Vec<Option<f32>> {
        let mut paths = PathPlanner::new(0.0);
        self.spots
            .iter()
            .map(|&spot| {
                if observers.iter().any(|o| vision.is_inside_fov(o, spot)) {
                    return None;
                }
                paths.shortest_path_distance(navmesh, from, spot)?;
                let nearest = observers
                    .iter()
                    .map(|o| {
                        paths
                            .shortest_path_distance(navmesh, o.position, spot)
                            .unwrap_or(f32::INFINITY)
                    })
                    .fold(f32::INFINITY, f32::min);
                Some(nearest)
            })
            .collect()
    }

    /// Spot farthest from the nearest guard; visible and unreachable spots
    /// rank last
    pub fn best_spot(&self, observers: &[Observer], navmesh: &NavMesh, vision: &WorldVision, from: Vec2) -> Option<Vec2> {
        let fitness = self.fitness(observers, navmesh, vision, from);
        let best = self
            .spots
            .iter()
            .zip(fitness)
            .max_by(|(_, a), (_, b)| match (a, b) {
                (Some(a), Some(b)) => a.total_cmp(b),
                (Some(_), None) => std::cmp::Ordering::Greater,
                (None, Some(_)) => std::cmp::Ordering::Less,
                (None, None) => std::cmp::Ordering::Equal,
            })
            .map(|(spot, fitness)| (*spot, fitness));

        if let Some((spot, fitness)) = best {
            debug!("Best hiding spot ({:.2}, {:.2}) fitness {:?}", spot.x, spot.y, fitness);
        }
        best.map(|(spot, _)| spot)
    }
}

/// Ranks a spot list against the live wall geometry for an agent at `from`
pub struct SpotRanking<'a> {
    pub spots: &'a HidingSpots,
    pub vision: &'a WorldVision,
    pub from: Vec2,
}

impl HidingSpotSelector for SpotRanking<'_> {
    fn best_hiding_spot(&self, observers: &[Observer], navmesh: &NavMesh) -> Option<Vec2> {
        self.spots.best_spot(observers, navmesh, self.vision, self.from)
    }
}

fn bounds(ring: &[Vec2]) -> (Vec2, Vec2) {
    let mut min = Vec2::new(f32::MAX, f32::MAX);
    let mut max = Vec2::new(f32::MIN, f32::MIN);
    for v in ring {
        min.x = min.x.min(v.x);
        min.y = min.y.min(v.y);
        max.x = max.x.max(v.x);
        max.y = max.y.max(v.y);
    }
    (min, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::{BoxObstacle, Obstacle};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn corridor_mesh() -> NavMesh {
        NavMesh::from_rings(vec![
            vec![Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0), Vec2::new(10.0, 2.0), Vec2::new(0.0, 2.0)],
            vec![Vec2::new(10.0, 0.0), Vec2::new(20.0, 0.0), Vec2::new(20.0, 2.0), Vec2::new(10.0, 2.0)],
        ])
        .unwrap()
    }

    #[test]
    fn test_sampled_spots_are_on_mesh_and_clear() {
        let mesh = corridor_mesh();
        let pillar = Obstacle::Box(BoxObstacle::from_corners(4.0, 0.0, 6.0, 2.0));
        let vision = WorldVision::new(vec![pillar], 15.0, 90.0);
        let mut rng = StdRng::seed_from_u64(7);

        let spots = HidingSpots::sample(&mesh, &vision, 0.3, 50, &mut rng);

        assert_eq!(spots.spots().len(), 50);
        for spot in spots.spots() {
            assert!(mesh.locate_polygon(*spot).is_some());
            assert!(!vision.is_blocked(*spot, 0.3));
        }
    }

    #[test]
    fn test_best_spot_is_farthest_from_guards() {
        let mesh = corridor_mesh();
        let vision = WorldVision::new(Vec::new(), 15.0, 90.0);
        let spots = HidingSpots::new(vec![Vec2::new(2.0, 1.0), Vec2::new(12.0, 1.0), Vec2::new(19.0, 1.0)]);
        // Guard at the west end looking west
        let guards = [Observer::new(1, Vec2::new(1.0, 1.0), std::f32::consts::PI)];

        assert_eq!(spots.best_spot(&guards, &mesh, &vision, Vec2::new(5.0, 1.0)), Some(Vec2::new(19.0, 1.0)));
    }

    #[test]
    fn test_visible_spots_rank_last() {
        let mesh = corridor_mesh();
        let vision = WorldVision::new(Vec::new(), 30.0, 90.0);
        let spots = HidingSpots::new(vec![Vec2::new(3.0, 1.0), Vec2::new(19.0, 1.0)]);
        // Looking east down the corridor: the far spot is in plain view
        let guards = [Observer::new(1, Vec2::new(1.0, 1.0), 0.0)];

        let fitness = spots.fitness(&guards, &mesh, &vision, Vec2::new(5.0, 1.0));
        assert_eq!(fitness[1], None);
        // Behind the guard's view is still unseen
        let behind = HidingSpots::new(vec![Vec2::new(0.5, 1.9), Vec2::new(19.0, 1.0)]);
        assert_eq!(behind.best_spot(&guards, &mesh, &vision, Vec2::new(5.0, 1.0)), Some(Vec2::new(0.5, 1.9)));
    }

    #[test]
    fn test_spots_off_the_agents_island_rank_last() {
        // Corridor plus a detached room no one can walk to
        let mesh = NavMesh::from_rings(vec![
            vec![Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0), Vec2::new(10.0, 2.0), Vec2::new(0.0, 2.0)],
            vec![Vec2::new(30.0, 0.0), Vec2::new(32.0, 0.0), Vec2::new(32.0, 2.0), Vec2::new(30.0, 2.0)],
        ])
        .unwrap();
        let vision = WorldVision::new(Vec::new(), 15.0, 90.0);
        let spots = HidingSpots::new(vec![Vec2::new(31.0, 1.0), Vec2::new(8.0, 1.0)]);
        let guards = [Observer::new(1, Vec2::new(1.0, 1.0), std::f32::consts::PI)];
        let from = Vec2::new(5.0, 1.0);

        let fitness = spots.fitness(&guards, &mesh, &vision, from);
        assert_eq!(fitness[0], None);
        assert!(fitness[1].is_some());

        let ranking = SpotRanking { spots: &spots, vision: &vision, from };
        assert_eq!(ranking.best_hiding_spot(&guards, &mesh), Some(Vec2::new(8.0, 1.0)));
    }

    #[test]
    fn test_random_spot() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(HidingSpots::default().random_spot(&mut rng), None);

        let spots = HidingSpots::new(vec![Vec2::new(1.0, 1.0), Vec2::new(2.0, 2.0)]);
        let spot = spots.random_spot(&mut rng).unwrap();
        assert!(spots.spots().contains(&spot));
    }
}
