//! 2D geometry primitives shared by the path planner and the evasion planner.

use serde::{Deserialize, Serialize};

/// Tolerance used when comparing coordinates that come out of arithmetic
pub const EPSILON: f32 = 1e-5;

/// A 2D position or direction on the map plane
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn length_squared(&self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    pub fn normalized(&self) -> Self {
        let len = self.length();
        if len > 0.0001 {
            Self { x: self.x / len, y: self.y / len }
        } else {
            Self { x: 0.0, y: 0.0 }
        }
    }

    pub fn dot(&self, other: Vec2) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// Z component of the 3D cross product; positive when `other` is counter-clockwise of `self`
    pub fn cross(&self, other: Vec2) -> f32 {
        self.x * other.y - self.y * other.x
    }

    pub fn distance_to(&self, other: Vec2) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Linear interpolation towards `other`, `t` in [0, 1]
    pub fn lerp(&self, other: Vec2, t: f32) -> Self {
        Self {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }

    pub fn midpoint(&self, other: Vec2) -> Self {
        self.lerp(other, 0.5)
    }

    /// Heading in radians, measured counter-clockwise from +x
    pub fn angle(&self) -> f32 {
        self.y.atan2(self.x)
    }

    pub fn from_angle(radians: f32) -> Self {
        Self { x: radians.cos(), y: radians.sin() }
    }

    pub fn approx_eq(&self, other: Vec2) -> bool {
        (self.x - other.x).abs() <= EPSILON && (self.y - other.y).abs() <= EPSILON
    }
}

impl std::ops::Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2 { x: self.x + rhs.x, y: self.y + rhs.y }
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2 { x: self.x - rhs.x, y: self.y - rhs.y }
    }
}

impl std::ops::Mul<f32> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f32) -> Vec2 {
        Vec2 { x: self.x * rhs, y: self.y * rhs }
    }
}

impl std::ops::Neg for Vec2 {
    type Output = Vec2;
    fn neg(self) -> Vec2 {
        Vec2 { x: -self.x, y: -self.y }
    }
}

impl std::ops::AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

/// Signed angle (radians) swept from `a` to `b` as seen from `origin`.
///
/// Positive when `b` lies counter-clockwise of `a`. Returns 0 when either
/// point coincides with the origin, which lets callers treat degenerate
/// funnel edges as "not widening".
pub fn signed_angle(origin: Vec2, a: Vec2, b: Vec2) -> f32 {
    let from = a - origin;
    let to = b - origin;
    if from.length_squared() <= EPSILON * EPSILON || to.length_squared() <= EPSILON * EPSILON {
        return 0.0;
    }
    from.cross(to).atan2(from.dot(to))
}

/// Whether `point` lies on the segment `a`-`b` (within [`EPSILON`])
pub fn point_on_segment(point: Vec2, a: Vec2, b: Vec2) -> bool {
    let ab = b - a;
    let ap = point - a;
    let len_sq = ab.length_squared();
    if len_sq <= EPSILON * EPSILON {
        return point.distance_to(a) <= EPSILON;
    }
    if (ab.cross(ap)).abs() / len_sq.sqrt() > EPSILON {
        return false;
    }
    let t = ap.dot(ab) / len_sq;
    (-EPSILON..=1.0 + EPSILON).contains(&t)
}

/// Point-in-polygon test that counts points on the boundary as inside
pub fn point_in_polygon(point: Vec2, ring: &[Vec2]) -> bool {
    if ring.len() < 3 {
        return false;
    }

    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        if point_on_segment(point, ring[j], ring[i]) {
            return true;
        }
        j = i;
    }

    // Ray casting for the interior
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (pi, pj) = (ring[i], ring[j]);
        if ((pi.y > point.y) != (pj.y > point.y))
            && (point.x < (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x)
        {
            inside = !inside;
        }
        j = i;
    }

    inside
}

/// Vertex average of a ring; good enough for convex navmesh polygons
pub fn centroid(ring: &[Vec2]) -> Vec2 {
    if ring.is_empty() {
        return Vec2::ZERO;
    }
    let mut sum = Vec2::ZERO;
    for vertex in ring {
        sum += *vertex;
    }
    sum * (1.0 / ring.len() as f32)
}

/// Twice the signed area of a ring; positive for counter-clockwise winding
pub fn signed_area_doubled(ring: &[Vec2]) -> f32 {
    if ring.len() < 3 {
        return 0.0;
    }
    let mut area = 0.0;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        area += ring[j].cross(ring[i]);
        j = i;
    }
    area
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> Vec<Vec2> {
        vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ]
    }

    #[test]
    fn test_point_in_polygon_boundary_inclusive() {
        let square = unit_square();

        assert!(point_in_polygon(Vec2::new(0.5, 0.5), &square));
        // Edges and corners count as inside
        assert!(point_in_polygon(Vec2::new(1.0, 0.5), &square));
        assert!(point_in_polygon(Vec2::new(0.0, 0.0), &square));
        assert!(!point_in_polygon(Vec2::new(1.01, 0.5), &square));
        assert!(!point_in_polygon(Vec2::new(-0.5, 2.0), &square));
    }

    #[test]
    fn test_signed_angle_orientation() {
        let origin = Vec2::new(0.0, 0.0);
        let east = Vec2::new(1.0, 0.0);
        let north = Vec2::new(0.0, 1.0);

        assert!(signed_angle(origin, east, north) > 0.0);
        assert!(signed_angle(origin, north, east) < 0.0);
        assert!((signed_angle(origin, east, north) - std::f32::consts::FRAC_PI_2).abs() < 1e-5);
        // Degenerate edge from the origin itself
        assert_eq!(signed_angle(origin, origin, north), 0.0);
    }

    #[test]
    fn test_winding_and_centroid() {
        let square = unit_square();
        assert!(signed_area_doubled(&square) > 0.0);

        let mut clockwise = square.clone();
        clockwise.reverse();
        assert!(signed_area_doubled(&clockwise) < 0.0);

        let c = centroid(&square);
        assert!(c.approx_eq(Vec2::new(0.5, 0.5)));
    }
}
