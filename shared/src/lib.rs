pub mod geometry;
pub mod navmesh;
pub mod planning;

pub use geometry::*;
pub use navmesh::*;
pub use planning::*;
