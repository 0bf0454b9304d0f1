//! Corridor search over the navmesh adjacency graph.
//!
//! The search is A*-shaped but its cost is corridor-aware: a path enters each
//! polygon at the midpoint of the diagonal it crossed (or at the destination
//! itself for the last polygon), and `g` accumulates the distances between
//! consecutive entry points. The heuristic is the straight-line distance from
//! the entry point to the destination. Midpoint distances are a proxy for the
//! taut path, so near concave corridors this is not guaranteed to return the
//! geometrically shortest route.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use log::{debug, trace};
use stealth_shared::{NavMesh, PolygonId, Vec2, DEFAULT_WALL_CLEARANCE};
use thiserror::Error;

use super::funnel::smooth_path;

/// Why a path query found no route
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PathError {
    #[error("start point ({}, {}) is outside the navmesh", .0.x, .0.y)]
    StartOutsideMesh(Vec2),
    #[error("destination point ({}, {}) is outside the navmesh", .0.x, .0.y)]
    DestinationOutsideMesh(Vec2),
    #[error("no corridor connects polygon {from} to polygon {to}")]
    NoCorridor { from: PolygonId, to: PolygonId },
}

/// Per-query search state, indexed by polygon id
#[derive(Debug, Clone, Default)]
pub struct SearchContext {
    g: Vec<f32>,
    h: Vec<f32>,
    previous: Vec<Option<PolygonId>>,
    entry: Vec<Vec2>,
    closed: Vec<bool>,
}

impl SearchContext {
    /// Clear all state, resizing for a mesh of `polygon_count` polygons
    pub fn reset(&mut self, polygon_count: usize) {
        self.g.clear();
        self.g.resize(polygon_count, f32::INFINITY);
        self.h.clear();
        self.h.resize(polygon_count, f32::INFINITY);
        self.previous.clear();
        self.previous.resize(polygon_count, None);
        self.entry.clear();
        self.entry.resize(polygon_count, Vec2::ZERO);
        self.closed.clear();
        self.closed.resize(polygon_count, false);
    }

    /// Best known cost from the start to `polygon`'s entry point
    pub fn cost(&self, polygon: PolygonId) -> f32 {
        self.g[polygon.index()]
    }

    fn relax(&mut self, polygon: PolygonId, g: f32, h: f32, previous: Option<PolygonId>, entry: Vec2) {
        let i = polygon.index();
        self.g[i] = g;
        self.h[i] = h;
        self.previous[i] = previous;
        self.entry[i] = entry;
    }

    fn priority(&self, polygon: PolygonId) -> f32 {
        self.g[polygon.index()] + self.h[polygon.index()]
    }

    /// Walk back-pointers from `goal`, returning the corridor in travel order
    fn corridor_to(&self, goal: PolygonId) -> Vec<PolygonId> {
        let mut corridor = vec![goal];
        let mut current = goal;
        while let Some(previous) = self.previous[current.index()] {
            corridor.push(previous);
            current = previous;
        }
        corridor.reverse();
        corridor
    }
}

/// Frontier entry; ordered so the heap pops the lowest `g + h` first
#[derive(Debug, Clone, Copy)]
struct FrontierNode {
    polygon: PolygonId,
    priority: f32,
}

impl PartialEq for FrontierNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FrontierNode {}

impl PartialOrd for FrontierNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FrontierNode {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .total_cmp(&self.priority)
            .then_with(|| other.polygon.cmp(&self.polygon))
    }
}

/// Path solver that reuses one search context across queries
#[derive(Debug, Clone)]
pub struct PathPlanner {
    context: SearchContext,
    clearance: f32,
}

impl Default for PathPlanner {
    fn default() -> Self {
        Self::new(DEFAULT_WALL_CLEARANCE)
    }
}

impl PathPlanner {
    /// `clearance` is how far funnel pivots are pushed away from corners
    pub fn new(clearance: f32) -> Self {
        Self {
            context: SearchContext::default(),
            clearance,
        }
    }

    /// Ordered polygons from the one containing `start` to the one containing `destination`
    pub fn find_corridor(
        &mut self,
        navmesh: &NavMesh,
        start: Vec2,
        destination: Vec2,
    ) -> Result<Vec<PolygonId>, PathError> {
        let start_polygon = navmesh
            .locate_polygon(start)
            .ok_or(PathError::StartOutsideMesh(start))?;
        let goal_polygon = navmesh
            .locate_polygon(destination)
            .ok_or(PathError::DestinationOutsideMesh(destination))?;

        let context = &mut self.context;
        context.reset(navmesh.len());
        context.relax(start_polygon, 0.0, start.distance_to(destination), None, start);

        let mut frontier = BinaryHeap::new();
        frontier.push(FrontierNode {
            polygon: start_polygon,
            priority: context.priority(start_polygon),
        });

        while let Some(FrontierNode { polygon: current, .. }) = frontier.pop() {
            // Stale duplicates of an already finalized polygon
            if context.closed[current.index()] {
                continue;
            }
            context.closed[current.index()] = true;

            if current == goal_polygon {
                let corridor = context.corridor_to(goal_polygon);
                trace!(
                    "[PATH] corridor {} -> {}: {} polygons, cost {:.2}",
                    start_polygon,
                    goal_polygon,
                    corridor.len(),
                    context.cost(goal_polygon)
                );
                return Ok(corridor);
            }

            let current_g = context.g[current.index()];
            let current_entry = context.entry[current.index()];

            for (neighbor, diagonal) in navmesh.polygon(current).neighbors() {
                if context.closed[neighbor.index()] {
                    continue;
                }

                let entry = if neighbor == goal_polygon {
                    destination
                } else {
                    diagonal.midpoint()
                };
                let g = current_g + current_entry.distance_to(entry);
                let h = entry.distance_to(destination);

                if context.priority(neighbor) > g + h {
                    trace!(
                        "[PATH] relax {} via {}: g={:.2} h={:.2}",
                        neighbor,
                        current,
                        g,
                        h
                    );
                    context.relax(neighbor, g, h, Some(current), entry);
                    frontier.push(FrontierNode {
                        polygon: neighbor,
                        priority: g + h,
                    });
                }
            }
        }

        debug!(
            "[PATH] no corridor from {} to {}",
            start_polygon, goal_polygon
        );
        Err(PathError::NoCorridor {
            from: start_polygon,
            to: goal_polygon,
        })
    }

    /// Smoothed waypoints from `start` to `destination`, both included
    pub fn shortest_path(
        &mut self,
        navmesh: &NavMesh,
        start: Vec2,
        destination: Vec2,
    ) -> Result<Vec<Vec2>, PathError> {
        let corridor = self.find_corridor(navmesh, start, destination)?;
        Ok(smooth_path(navmesh, start, destination, &corridor, self.clearance))
    }

    /// Length of the smoothed path, or `None` when unreachable
    pub fn shortest_path_distance(&mut self, navmesh: &NavMesh, start: Vec2, destination: Vec2) -> Option<f32> {
        self.shortest_path(navmesh, start, destination)
            .ok()
            .map(|path| path_length(&path))
    }
}

/// One-shot path query with default wall clearance
pub fn shortest_path(navmesh: &NavMesh, start: Vec2, destination: Vec2) -> Result<Vec<Vec2>, PathError> {
    PathPlanner::default().shortest_path(navmesh, start, destination)
}

/// Total length of a polyline
pub fn path_length(path: &[Vec2]) -> f32 {
    path.windows(2).map(|pair| pair[0].distance_to(pair[1])).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x0: f32, y0: f32, x1: f32, y1: f32) -> Vec<Vec2> {
        vec![
            Vec2::new(x0, y0),
            Vec2::new(x1, y0),
            Vec2::new(x1, y1),
            Vec2::new(x0, y1),
        ]
    }

    fn two_squares() -> NavMesh {
        NavMesh::from_rings(vec![rect(0.0, 0.0, 1.0, 1.0), rect(1.0, 0.0, 2.0, 1.0)]).unwrap()
    }

    #[test]
    fn test_two_squares_straight_line() {
        let mesh = two_squares();
        let mut planner = PathPlanner::default();
        let start = Vec2::new(0.0, 0.5);
        let destination = Vec2::new(2.0, 0.5);

        let corridor = planner.find_corridor(&mesh, start, destination).unwrap();
        assert_eq!(corridor, vec![PolygonId(0), PolygonId(1)]);

        let path = planner.shortest_path(&mesh, start, destination).unwrap();
        assert_eq!(path.len(), 2);
        assert!(path[0].approx_eq(start));
        assert!(path[1].approx_eq(destination));
    }

    #[test]
    fn test_same_polygon() {
        let mesh = two_squares();
        let start = Vec2::new(0.2, 0.2);
        let destination = Vec2::new(0.8, 0.7);

        let path = shortest_path(&mesh, start, destination).unwrap();
        assert_eq!(path, vec![start, destination]);
    }

    #[test]
    fn test_disconnected_regions_unreachable() {
        let mesh = NavMesh::from_rings(vec![rect(0.0, 0.0, 1.0, 1.0), rect(3.0, 0.0, 4.0, 1.0)]).unwrap();

        let result = shortest_path(&mesh, Vec2::new(0.5, 0.5), Vec2::new(3.5, 0.5));
        assert_eq!(
            result,
            Err(PathError::NoCorridor {
                from: PolygonId(0),
                to: PolygonId(1)
            })
        );
    }

    #[test]
    fn test_endpoints_outside_mesh() {
        let mesh = two_squares();

        assert!(matches!(
            shortest_path(&mesh, Vec2::new(-1.0, 0.5), Vec2::new(1.5, 0.5)),
            Err(PathError::StartOutsideMesh(_))
        ));
        assert!(matches!(
            shortest_path(&mesh, Vec2::new(0.5, 0.5), Vec2::new(1.5, 5.0)),
            Err(PathError::DestinationOutsideMesh(_))
        ));
    }

    #[test]
    fn test_corridor_prefers_short_branch() {
        // A hub with a short route east and a long detour north then east
        let mesh = NavMesh::from_rings(vec![
            rect(0.0, 0.0, 2.0, 2.0),
            rect(2.0, 0.0, 4.0, 2.0),
            rect(0.0, 2.0, 2.0, 8.0),
            rect(2.0, 6.0, 6.0, 8.0),
            rect(4.0, 0.0, 6.0, 6.0),
        ])
        .unwrap();
        let mut planner = PathPlanner::default();

        let corridor = planner
            .find_corridor(&mesh, Vec2::new(1.0, 1.0), Vec2::new(5.0, 1.0))
            .unwrap();
        assert_eq!(corridor, vec![PolygonId(0), PolygonId(1), PolygonId(4)]);

        let distance = planner
            .shortest_path_distance(&mesh, Vec2::new(1.0, 1.0), Vec2::new(5.0, 1.0))
            .unwrap();
        assert!((distance - 4.0).abs() < 1e-4);
    }

    #[test]
    fn test_context_reused_across_queries() {
        let mesh = two_squares();
        let mut planner = PathPlanner::default();

        for _ in 0..3 {
            let path = planner
                .shortest_path(&mesh, Vec2::new(1.8, 0.5), Vec2::new(0.1, 0.9))
                .unwrap();
            assert!(path.first().unwrap().approx_eq(Vec2::new(1.8, 0.5)));
            assert!(path.last().unwrap().approx_eq(Vec2::new(0.1, 0.9)));
        }
    }

    #[test]
    fn test_path_length() {
        let path = [Vec2::new(0.0, 0.0), Vec2::new(3.0, 0.0), Vec2::new(3.0, 4.0)];
        assert!((path_length(&path) - 7.0).abs() < 1e-5);
        assert_eq!(path_length(&[]), 0.0);
    }
}
