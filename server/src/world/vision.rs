//! Wall-based line of sight and view cones.

use stealth_shared::{Observer, Vec2};

use crate::navigation::{check_collision, line_blocked, Obstacle};
use crate::planner::{ObstructionProbe, VisibilityOracle};

/// Visibility against a map's wall geometry
#[derive(Debug, Clone)]
pub struct WorldVision {
    walls: Vec<Obstacle>,
    view_radius: f32,
    /// Half of the view cone, in radians
    half_angle: f32,
}

impl WorldVision {
    /// `view_angle` is the full cone width in degrees
    pub fn new(walls: Vec<Obstacle>, view_radius: f32, view_angle: f32) -> Self {
        Self {
            walls,
            view_radius,
            half_angle: view_angle.to_radians() * 0.5,
        }
    }

    pub fn walls(&self) -> &[Obstacle] {
        &self.walls
    }

    fn within_cone(&self, observer: &Observer, point: Vec2) -> bool {
        let offset = point - observer.position;
        let dist = offset.length();
        if dist > self.view_radius {
            return false;
        }
        if dist < 1e-4 {
            return true;
        }
        let facing = Vec2::from_angle(observer.facing);
        let angle = facing.cross(offset).atan2(facing.dot(offset)).abs();
        angle <= self.half_angle
    }
}

impl VisibilityOracle for WorldVision {
    fn is_occluded(&self, from: Vec2, to: Vec2) -> bool {
        line_blocked(from, to, &self.walls)
    }

    /// Inside the view cone and not hidden behind a wall
    fn is_inside_fov(&self, observer: &Observer, point: Vec2) -> bool {
        self.within_cone(observer, point) && !self.is_occluded(observer.position, point)
    }
}

impl ObstructionProbe for WorldVision {
    fn is_blocked(&self, point: Vec2, radius: f32) -> bool {
        check_collision(point, radius, &self.walls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::BoxObstacle;

    fn vision() -> WorldVision {
        let wall = Obstacle::Box(BoxObstacle::from_corners(5.0, -1.0, 6.0, 1.0));
        WorldVision::new(vec![wall], 15.0, 90.0)
    }

    #[test]
    fn test_view_cone() {
        let vision = vision();
        // Facing north
        let guard = Observer::new(1, Vec2::new(0.0, 0.0), std::f32::consts::FRAC_PI_2);

        assert!(vision.is_inside_fov(&guard, Vec2::new(0.0, 10.0)));
        assert!(vision.is_inside_fov(&guard, Vec2::new(3.0, 4.0)));
        // Outside the 45 degree half-cone
        assert!(!vision.is_inside_fov(&guard, Vec2::new(4.0, 1.0)));
        // Behind
        assert!(!vision.is_inside_fov(&guard, Vec2::new(0.0, -3.0)));
        // Too far
        assert!(!vision.is_inside_fov(&guard, Vec2::new(0.0, 16.0)));
    }

    #[test]
    fn test_walls_hide_points_in_cone() {
        let vision = vision();
        // Facing east, straight at the wall
        let guard = Observer::new(1, Vec2::new(0.0, 0.0), 0.0);

        assert!(vision.is_inside_fov(&guard, Vec2::new(4.0, 0.0)));
        assert!(!vision.is_inside_fov(&guard, Vec2::new(8.0, 0.0)));
        assert!(vision.is_occluded(Vec2::new(0.0, 0.0), Vec2::new(8.0, 0.0)));
    }

    #[test]
    fn test_probe_radius() {
        let vision = vision();
        assert!(vision.is_blocked(Vec2::new(4.7, 0.0), 0.5));
        assert!(!vision.is_blocked(Vec2::new(4.0, 0.0), 0.5));
    }
}
