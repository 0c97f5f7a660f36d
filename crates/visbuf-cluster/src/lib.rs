//! CPU-side geometry preparation for visibility-buffer rendering: splitting
//! meshes into triangle clusters, concatenating them into global vertex and
//! index tables, culling clusters against the camera, and emitting per-draw
//! metadata with unique triangle ranges.

pub mod cluster;
pub mod cull;
pub mod draw_list;
pub mod error;
pub mod geometry;
pub mod vertex;

pub use cluster::{ClusterBuilder, ClusteredMesh, MeshCluster};
pub use cull::{ClusterCuller, ClusterVisibility, CullStats, Frustum};
pub use draw_list::{DrawList, InstanceRecord};
pub use error::{ClusterError, GeometryError};
pub use geometry::{GlobalGeometry, MeshId, MeshInfo};
pub use vertex::{PackedVertex, Vertex};
