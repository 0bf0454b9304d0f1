//! Wall geometry: obstacle shapes, overlap probes, push-out and line-of-sight tests.

use log::trace;
use serde::{Deserialize, Serialize};
use stealth_shared::Vec2;

/// Minimum distance kept from obstacles when pushing an agent out
const OBSTACLE_MARGIN: f32 = 0.05;

// ============================================================================
// Obstacle Types
// ============================================================================

/// Circular obstacle (pillars, crates)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircleObstacle {
    pub center: Vec2,
    pub radius: f32,
}

impl CircleObstacle {
    pub fn new(x: f32, y: f32, radius: f32) -> Self {
        Self {
            center: Vec2::new(x, y),
            radius,
        }
    }
}

/// Axis-aligned wall segment or block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoxObstacle {
    /// Minimum corner (smallest x, y)
    pub min: Vec2,
    /// Maximum corner (largest x, y)
    pub max: Vec2,
}

impl BoxObstacle {
    /// Create a box from min/max corners in any order
    pub fn from_corners(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            min: Vec2::new(x0.min(x1), y0.min(y1)),
            max: Vec2::new(x0.max(x1), y0.max(y1)),
        }
    }
}

/// A single piece of wall geometry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Obstacle {
    Circle(CircleObstacle),
    Box(BoxObstacle),
}

impl Obstacle {
    /// Whether the open segment `from`-`to` passes through this obstacle
    pub fn blocks_segment(&self, from: Vec2, to: Vec2) -> bool {
        match self {
            Obstacle::Circle(c) => segment_hits_circle(from, to, c),
            Obstacle::Box(b) => segment_hits_box(from, to, b),
        }
    }
}

// ============================================================================
// Collision Detection
// ============================================================================

/// Check if a circle (at `pos` with `radius`) overlaps a circular obstacle
pub fn circle_circle_collision(pos: Vec2, radius: f32, obstacle: &CircleObstacle) -> bool {
    pos.distance_to(obstacle.center) < radius + obstacle.radius
}

/// Check if a circle (at `pos` with `radius`) overlaps a box obstacle
pub fn circle_aabb_collision(pos: Vec2, radius: f32, obstacle: &BoxObstacle) -> bool {
    let closest = Vec2::new(
        pos.x.clamp(obstacle.min.x, obstacle.max.x),
        pos.y.clamp(obstacle.min.y, obstacle.max.y),
    );
    (pos - closest).length_squared() < radius * radius
}

/// Check if a circle overlaps any obstacle in the list
pub fn check_collision(pos: Vec2, radius: f32, obstacles: &[Obstacle]) -> bool {
    for obstacle in obstacles {
        match obstacle {
            Obstacle::Circle(c) => {
                if circle_circle_collision(pos, radius, c) {
                    trace!(
                        "[COLLISION] pos=({:.2}, {:.2}) r={:.2} overlaps circle at ({:.2}, {:.2}) r={:.2}",
                        pos.x, pos.y, radius, c.center.x, c.center.y, c.radius
                    );
                    return true;
                }
            }
            Obstacle::Box(b) => {
                if circle_aabb_collision(pos, radius, b) {
                    trace!(
                        "[COLLISION] pos=({:.2}, {:.2}) r={:.2} overlaps box ({:.2},{:.2})->({:.2},{:.2})",
                        pos.x, pos.y, radius, b.min.x, b.min.y, b.max.x, b.max.y
                    );
                    return true;
                }
            }
        }
    }
    false
}

fn circle_pushout(pos: Vec2, radius: f32, obstacle: &CircleObstacle) -> Option<Vec2> {
    let to_pos = pos - obstacle.center;
    let dist = to_pos.length();
    let min_dist = radius + obstacle.radius + OBSTACLE_MARGIN;

    if dist < min_dist && dist > 0.001 {
        Some(to_pos.normalized() * (min_dist - dist))
    } else {
        None
    }
}

fn aabb_pushout(pos: Vec2, radius: f32, obstacle: &BoxObstacle) -> Option<Vec2> {
    let closest = Vec2::new(
        pos.x.clamp(obstacle.min.x, obstacle.max.x),
        pos.y.clamp(obstacle.min.y, obstacle.max.y),
    );
    let offset = pos - closest;
    let dist_sq = offset.length_squared();
    let min_dist = radius + OBSTACLE_MARGIN;

    if dist_sq >= min_dist * min_dist {
        return None;
    }

    let dist = dist_sq.sqrt();
    if dist > 0.001 {
        return Some(offset * ((min_dist - dist) / dist));
    }

    // Center is inside the box: leave through the nearest side
    let left = pos.x - obstacle.min.x;
    let right = obstacle.max.x - pos.x;
    let bottom = pos.y - obstacle.min.y;
    let top = obstacle.max.y - pos.y;

    let min_side = left.min(right).min(bottom).min(top);
    let pushout = min_dist + min_side;

    if min_side == left {
        Some(Vec2::new(-pushout, 0.0))
    } else if min_side == right {
        Some(Vec2::new(pushout, 0.0))
    } else if min_side == bottom {
        Some(Vec2::new(0.0, -pushout))
    } else {
        Some(Vec2::new(0.0, pushout))
    }
}

/// Push a circle out of every obstacle it overlaps
pub fn resolve_collision(pos: Vec2, radius: f32, obstacles: &[Obstacle]) -> Vec2 {
    let mut result = pos;

    // A push out of one obstacle can land in another; a few passes settle it
    for _ in 0..3 {
        let mut total = Vec2::ZERO;
        let mut hits = 0;

        for obstacle in obstacles {
            let pushout = match obstacle {
                Obstacle::Circle(c) => circle_pushout(result, radius, c),
                Obstacle::Box(b) => aabb_pushout(result, radius, b),
            };
            if let Some(p) = pushout {
                total += p;
                hits += 1;
            }
        }

        if hits == 0 {
            break;
        }
        result += total;
    }

    result
}

// ============================================================================
// Line of Sight
// ============================================================================

/// Slab test of the segment against the box interior
pub fn segment_hits_box(from: Vec2, to: Vec2, obstacle: &BoxObstacle) -> bool {
    let dir = to - from;
    let mut t_min = 0.0f32;
    let mut t_max = 1.0f32;

    for (origin, delta, lo, hi) in [
        (from.x, dir.x, obstacle.min.x, obstacle.max.x),
        (from.y, dir.y, obstacle.min.y, obstacle.max.y),
    ] {
        if delta.abs() < 1e-9 {
            if origin < lo || origin > hi {
                return false;
            }
            continue;
        }
        let mut t0 = (lo - origin) / delta;
        let mut t1 = (hi - origin) / delta;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        t_min = t_min.max(t0);
        t_max = t_max.min(t1);
        if t_min > t_max {
            return false;
        }
    }

    true
}

/// Whether the segment passes within the circle's radius
pub fn segment_hits_circle(from: Vec2, to: Vec2, obstacle: &CircleObstacle) -> bool {
    let seg = to - from;
    let len_sq = seg.length_squared();
    let t = if len_sq > 1e-9 {
        ((obstacle.center - from).dot(seg) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let closest = from.lerp(to, t);
    closest.distance_to(obstacle.center) < obstacle.radius
}

/// Whether any obstacle blocks the straight line between two points
pub fn line_blocked(from: Vec2, to: Vec2, obstacles: &[Obstacle]) -> bool {
    obstacles.iter().any(|o| o.blocks_segment(from, to))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circle_circle_collision() {
        let obstacle = CircleObstacle::new(0.0, 0.0, 1.0);

        assert!(circle_circle_collision(Vec2::new(0.5, 0.0), 0.5, &obstacle));
        assert!(!circle_circle_collision(Vec2::new(3.0, 0.0), 0.5, &obstacle));
        // Exactly touching is not a collision
        assert!(!circle_circle_collision(Vec2::new(1.5, 0.0), 0.5, &obstacle));
    }

    #[test]
    fn test_circle_aabb_collision() {
        let obstacle = BoxObstacle::from_corners(0.0, 0.0, 2.0, 2.0);

        assert!(circle_aabb_collision(Vec2::new(1.0, 1.0), 0.5, &obstacle));
        assert!(circle_aabb_collision(Vec2::new(2.3, 1.0), 0.5, &obstacle));
        assert!(!circle_aabb_collision(Vec2::new(3.0, 1.0), 0.5, &obstacle));
    }

    #[test]
    fn test_resolve_collision_pushes_out_of_box() {
        let obstacles = vec![Obstacle::Box(BoxObstacle::from_corners(0.0, 0.0, 2.0, 2.0))];

        let resolved = resolve_collision(Vec2::new(2.2, 1.0), 0.5, &obstacles);
        assert!(resolved.x >= 2.5);
        assert!((resolved.y - 1.0).abs() < 1e-4);
        assert!(!check_collision(resolved, 0.5, &obstacles));
    }

    #[test]
    fn test_line_of_sight() {
        let wall = Obstacle::Box(BoxObstacle::from_corners(4.0, -1.0, 5.0, 1.0));
        let pillar = Obstacle::Circle(CircleObstacle::new(0.0, 5.0, 1.0));
        let obstacles = vec![wall, pillar];

        assert!(line_blocked(Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0), &obstacles));
        assert!(!line_blocked(Vec2::new(0.0, 2.0), Vec2::new(10.0, 2.0), &obstacles));
        assert!(line_blocked(Vec2::new(-3.0, 5.0), Vec2::new(3.0, 5.0), &obstacles));
        // Ends short of the wall
        assert!(!line_blocked(Vec2::new(0.0, 0.0), Vec2::new(3.9, 0.0), &obstacles));
    }
}
