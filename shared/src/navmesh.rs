//! Navigation mesh data model.
//!
//! The mesh is produced upstream by the map pipeline (decomposition into
//! convex polygons, winding normalization) and consumed here as a ready
//! adjacency graph. It is immutable once built; path queries keep their own
//! search state, so a mesh can be shared freely between planners.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{self, Vec2};

/// Errors raised while building or decoding a navmesh
#[derive(Debug, Error)]
pub enum MeshError {
    #[error("polygon {0} has fewer than 3 vertices")]
    DegeneratePolygon(usize),
    #[error("polygon {polygon} lists neighbor {neighbor} which does not exist")]
    UnknownNeighbor { polygon: usize, neighbor: usize },
    #[error("adjacency between polygons {a} and {b} is not symmetric")]
    AsymmetricAdjacency { a: usize, b: usize },
    #[error("navmesh snapshot could not be decoded: {0}")]
    Snapshot(#[from] bincode::Error),
}

/// Index of a polygon inside its [`NavMesh`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PolygonId(pub usize);

impl PolygonId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for PolygonId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The edge two neighboring polygons share
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Diagonal {
    pub a: Vec2,
    pub b: Vec2,
}

impl Diagonal {
    pub fn new(a: Vec2, b: Vec2) -> Self {
        Self { a, b }
    }

    pub fn midpoint(&self) -> Vec2 {
        self.a.midpoint(self.b)
    }

    /// Same edge regardless of endpoint order
    pub fn same_edge(&self, other: &Diagonal) -> bool {
        (self.a.approx_eq(other.a) && self.b.approx_eq(other.b))
            || (self.a.approx_eq(other.b) && self.b.approx_eq(other.a))
    }
}

/// A convex walkable region of the mesh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Polygon {
    id: PolygonId,
    /// Vertex ring, counter-clockwise for outer boundaries
    vertices: Vec<Vec2>,
    centroid: Vec2,
    /// Neighbor polygons keyed by id, with the diagonal shared with each
    neighbors: BTreeMap<PolygonId, Diagonal>,
}

impl Polygon {
    pub fn new(id: PolygonId, vertices: Vec<Vec2>) -> Self {
        let centroid = geometry::centroid(&vertices);
        Self {
            id,
            vertices,
            centroid,
            neighbors: BTreeMap::new(),
        }
    }

    /// Register `neighbor` as adjacent across `diagonal`
    pub fn link(&mut self, neighbor: PolygonId, diagonal: Diagonal) {
        self.neighbors.insert(neighbor, diagonal);
    }

    pub fn id(&self) -> PolygonId {
        self.id
    }

    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices
    }

    pub fn centroid(&self) -> Vec2 {
        self.centroid
    }

    pub fn neighbors(&self) -> impl Iterator<Item = (PolygonId, &Diagonal)> {
        self.neighbors.iter().map(|(id, diagonal)| (*id, diagonal))
    }

    pub fn diagonal_to(&self, neighbor: PolygonId) -> Option<&Diagonal> {
        self.neighbors.get(&neighbor)
    }

    pub fn contains(&self, point: Vec2) -> bool {
        geometry::point_in_polygon(point, &self.vertices)
    }

    /// Iterate over the ring's edges as (start, end) pairs
    pub fn edges(&self) -> impl Iterator<Item = (Vec2, Vec2)> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (self.vertices[i], self.vertices[(i + 1) % n]))
    }
}

/// Navigation mesh: a set of convex polygons with symmetric adjacency
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NavMesh {
    polygons: Vec<Polygon>,
}

impl NavMesh {
    /// Build a mesh from polygons whose adjacency was already linked upstream.
    ///
    /// Polygon ids are reassigned to their position in `polygons`; links must
    /// refer to those positions.
    pub fn from_polygons(mut polygons: Vec<Polygon>) -> Result<Self, MeshError> {
        for (index, polygon) in polygons.iter_mut().enumerate() {
            polygon.id = PolygonId(index);
        }

        for polygon in &polygons {
            if polygon.vertices.len() < 3 {
                return Err(MeshError::DegeneratePolygon(polygon.id.0));
            }
            for (neighbor, diagonal) in polygon.neighbors() {
                let other = polygons.get(neighbor.0).ok_or(MeshError::UnknownNeighbor {
                    polygon: polygon.id.0,
                    neighbor: neighbor.0,
                })?;
                match other.diagonal_to(polygon.id) {
                    Some(back) if back.same_edge(diagonal) => {}
                    _ => {
                        return Err(MeshError::AsymmetricAdjacency {
                            a: polygon.id.0,
                            b: neighbor.0,
                        })
                    }
                }
            }
        }

        Ok(Self { polygons })
    }

    /// Build a mesh from raw vertex rings, linking polygons that share an edge
    pub fn from_rings(rings: Vec<Vec<Vec2>>) -> Result<Self, MeshError> {
        let mut polygons: Vec<Polygon> = rings
            .into_iter()
            .enumerate()
            .map(|(index, ring)| Polygon::new(PolygonId(index), ring))
            .collect();

        if let Some(bad) = polygons.iter().find(|p| p.vertices.len() < 3) {
            return Err(MeshError::DegeneratePolygon(bad.id.0));
        }

        // Collect links first to avoid borrowing two polygons mutably at once
        let mut links: Vec<(usize, usize, Diagonal)> = Vec::new();
        for i in 0..polygons.len() {
            for j in (i + 1)..polygons.len() {
                if let Some(diagonal) = find_shared_edge(&polygons[i], &polygons[j]) {
                    links.push((i, j, diagonal));
                }
            }
        }

        for (i, j, diagonal) in links {
            polygons[i].link(PolygonId(j), diagonal);
            polygons[j].link(PolygonId(i), diagonal);
        }

        Self::from_polygons(polygons)
    }

    /// Decode a mesh snapshot written by [`NavMesh::to_bytes`]
    pub fn from_bytes(data: &[u8]) -> Result<Self, MeshError> {
        let mesh: NavMesh = bincode::deserialize(data)?;
        // Snapshots come from outside; re-check the adjacency invariants
        Self::from_polygons(mesh.polygons)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, MeshError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    pub fn polygon(&self, id: PolygonId) -> &Polygon {
        &self.polygons[id.0]
    }

    /// First polygon containing `point` (boundary inclusive), if any
    pub fn locate_polygon(&self, point: Vec2) -> Option<PolygonId> {
        self.polygons
            .iter()
            .find(|polygon| polygon.contains(point))
            .map(|polygon| polygon.id)
    }

    /// The diagonal shared by two neighboring polygons
    pub fn shared_diagonal(&self, a: PolygonId, b: PolygonId) -> Option<Diagonal> {
        self.polygons.get(a.0)?.diagonal_to(b).copied()
    }

    /// Sum of polygon areas
    pub fn walkable_area(&self) -> f32 {
        self.polygons
            .iter()
            .map(|p| geometry::signed_area_doubled(&p.vertices).abs() * 0.5)
            .sum()
    }
}

/// Edge shared by two polygons, matched in either direction
fn find_shared_edge(a: &Polygon, b: &Polygon) -> Option<Diagonal> {
    for (a1, a2) in a.edges() {
        for (b1, b2) in b.edges() {
            let edge = Diagonal::new(a1, a2);
            if edge.same_edge(&Diagonal::new(b1, b2)) {
                return Some(edge);
            }
        }
    }
    None
}
