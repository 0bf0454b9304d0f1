//! Funnel (string pulling) smoothing of a polygon corridor into waypoints.

use log::{trace, warn};
use stealth_shared::{signed_angle, NavMesh, PolygonId, Vec2};

/// Left and right bounds of the channel at each step of the corridor
struct Portals {
    left: Vec<Vec2>,
    right: Vec<Vec2>,
}

impl Portals {
    /// Portal 0 is the start, the last one the destination, and the rest are
    /// the diagonals between consecutive corridor polygons. Sides are judged
    /// against the direction of travel out of the previous polygon so they
    /// stay consistent along the whole corridor.
    fn build(navmesh: &NavMesh, start: Vec2, destination: Vec2, corridor: &[PolygonId]) -> Self {
        let mut left = Vec::with_capacity(corridor.len() + 1);
        let mut right = Vec::with_capacity(corridor.len() + 1);
        left.push(start);
        right.push(start);

        for pair in corridor.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            match navmesh.shared_diagonal(from, to) {
                Some(diagonal) => {
                    let mid = diagonal.midpoint();
                    let outward = mid - navmesh.polygon(from).centroid();
                    if outward.cross(diagonal.a - mid) > 0.0 {
                        left.push(diagonal.a);
                        right.push(diagonal.b);
                    } else {
                        left.push(diagonal.b);
                        right.push(diagonal.a);
                    }
                }
                None => {
                    warn!("[FUNNEL] corridor step {} -> {} is not an adjacency", from, to);
                    let centroid = navmesh.polygon(to).centroid();
                    left.push(centroid);
                    right.push(centroid);
                }
            }
        }

        left.push(destination);
        right.push(destination);
        Self { left, right }
    }

    fn len(&self) -> usize {
        self.left.len()
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Side {
    Left,
    Right,
}

/// Pull a taut polyline through the corridor's portals.
///
/// Every emitted corner is pushed `clearance` units off the wall along the
/// bisector normal of the two chain edges meeting at it, and the funnel
/// restarts from that offset point. The result starts at `start` and always
/// ends with `destination`.
pub fn smooth_path(
    navmesh: &NavMesh,
    start: Vec2,
    destination: Vec2,
    corridor: &[PolygonId],
    clearance: f32,
) -> Vec<Vec2> {
    let portals = Portals::build(navmesh, start, destination, corridor);
    let last = portals.len() - 1;

    let mut path = vec![start];
    let mut apex = start;
    let (mut left_index, mut right_index) = (0, 0);
    let (mut left, mut right) = (start, start);

    let mut i = 1;
    while i < portals.len() {
        let next_left = portals.left[i];
        let next_right = portals.right[i];
        let mut pivot: Option<(Side, usize)> = None;

        // Right side narrows when the new vertex swings counter-clockwise
        if signed_angle(apex, right, next_right) >= 0.0 {
            if apex == right || signed_angle(apex, left, next_right) < 0.0 {
                right = next_right;
                right_index = i;
            } else {
                pivot = Some((Side::Left, left_index));
            }
        }

        // Left side narrows when the new vertex swings clockwise
        if pivot.is_none() && signed_angle(apex, left, next_left) <= 0.0 {
            if apex == left || signed_angle(apex, right, next_left) > 0.0 {
                left = next_left;
                left_index = i;
            } else {
                pivot = Some((Side::Right, right_index));
            }
        }

        let Some((side, index)) = pivot else {
            i += 1;
            continue;
        };

        if index == last {
            break;
        }

        let corner = match side {
            Side::Left => portals.left[index],
            Side::Right => portals.right[index],
        };
        let waypoint = offset_corner(&portals, side, index, clearance);
        if !waypoint.approx_eq(apex) {
            trace!(
                "[FUNNEL] corner ({:.2}, {:.2}) -> waypoint ({:.2}, {:.2})",
                corner.x,
                corner.y,
                waypoint.x,
                waypoint.y
            );
            path.push(waypoint);
        }

        // Restart from the offset point, not the raw corner
        apex = waypoint;
        left = apex;
        right = apex;
        left_index = index;
        right_index = index;
        i = index + 1;
    }

    path.push(destination);
    path
}

/// Push the corner at `index` of one portal chain away from the wall
fn offset_corner(portals: &Portals, side: Side, index: usize, clearance: f32) -> Vec2 {
    let chain = match side {
        Side::Left => &portals.left,
        Side::Right => &portals.right,
    };
    let corner = chain[index];

    let before = chain[..index].iter().rev().find(|v| !v.approx_eq(corner));
    let after = chain[index + 1..].iter().find(|v| !v.approx_eq(corner));
    let (Some(&before), Some(&after)) = (before, after) else {
        return corner;
    };

    let heading = (corner - before).normalized() + (after - corner).normalized();
    if heading.length_squared() < 1e-8 {
        return corner;
    }
    let normal = Vec2::from_angle(heading.angle() + std::f32::consts::FRAC_PI_2);

    match side {
        Side::Right => corner + normal * clearance,
        Side::Left => corner - normal * clearance,
    }
}
