//! Splits triangle meshes into fixed-size clusters with culling bounds.
//!
//! Clusters are consecutive runs of the mesh's triangle list, so a cluster's
//! triangle offset inside the mesh is simply `first_index / 3`. That keeps
//! the triangle ids written by cluster draws identical to the ids the
//! resolve pass computes from the global index table.

use glam::{Vec3, Vec4};
use visbuf_codec::TriangleOffset;

use crate::error::ClusterError;
use crate::geometry::MeshId;
use crate::vertex::Vertex;

/// Faces with a cross-product length below this are treated as degenerate.
const DEGENERATE_AREA: f32 = 1e-8;

/// A contiguous run of triangles from one mesh.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeshCluster {
    /// xyz = center, w = radius (object space).
    pub bounding_sphere: Vec4,
    pub aabb_min: Vec3,
    pub aabb_max: Vec3,
    /// Area-weighted average face normal.
    pub cone_axis: Vec3,
    /// Cosine of the widest face deviation from `cone_axis`. `-1.0` means
    /// the cone is degenerate and the cluster must never be backface-culled.
    pub cone_cutoff: f32,
    /// First index in the mesh's index buffer.
    pub first_index: u32,
    /// Number of indices (triangles * 3).
    pub index_count: u32,
    pub mesh_id: MeshId,
}

impl MeshCluster {
    pub fn triangle_count(&self) -> u32 {
        self.index_count / 3
    }

    /// Offset of the cluster's first triangle within its mesh.
    pub fn triangle_offset(&self) -> TriangleOffset {
        TriangleOffset::from_first_index(self.first_index)
    }
}

/// Clustering output for a single mesh.
#[derive(Clone, Debug, Default)]
pub struct ClusteredMesh {
    pub mesh_id: MeshId,
    pub clusters: Vec<MeshCluster>,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub total_triangles: u32,
}

/// Builds [`ClusteredMesh`]es with a configurable cluster size.
#[derive(Clone, Debug)]
pub struct ClusterBuilder {
    target_cluster_size: u32,
}

impl Default for ClusterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClusterBuilder {
    pub const DEFAULT_CLUSTER_SIZE: u32 = 64;
    pub const MIN_CLUSTER_SIZE: u32 = 32;
    pub const MAX_CLUSTER_SIZE: u32 = 128;

    pub fn new() -> Self {
        Self {
            target_cluster_size: Self::DEFAULT_CLUSTER_SIZE,
        }
    }

    /// Set triangles per cluster, clamped to `[32, 128]`.
    pub fn with_cluster_size(mut self, triangles: u32) -> Self {
        self.set_cluster_size(triangles);
        self
    }

    pub fn set_cluster_size(&mut self, triangles: u32) {
        self.target_cluster_size =
            triangles.clamp(Self::MIN_CLUSTER_SIZE, Self::MAX_CLUSTER_SIZE);
    }

    pub fn cluster_size(&self) -> u32 {
        self.target_cluster_size
    }

    /// Partition a triangle list into consecutive clusters.
    pub fn build(
        &self,
        vertices: &[Vertex],
        indices: &[u32],
        mesh_id: MeshId,
    ) -> Result<ClusteredMesh, ClusterError> {
        validate_triangle_list(vertices, indices)?;

        let total_triangles = (indices.len() / 3) as u32;
        let per_cluster = self.target_cluster_size;
        let cluster_count = total_triangles.div_ceil(per_cluster);

        let clusters = (0..cluster_count)
            .map(|c| {
                let first_triangle = c * per_cluster;
                let triangles = per_cluster.min(total_triangles - first_triangle);
                let first_index = first_triangle * 3;
                let index_count = triangles * 3;
                let range = &indices[first_index as usize..(first_index + index_count) as usize];

                let (aabb_min, aabb_max) = compute_aabb(vertices, range);
                let (cone_axis, cone_cutoff) = compute_normal_cone(vertices, range);

                MeshCluster {
                    bounding_sphere: compute_bounding_sphere(vertices, range),
                    aabb_min,
                    aabb_max,
                    cone_axis,
                    cone_cutoff,
                    first_index,
                    index_count,
                    mesh_id,
                }
            })
            .collect();

        log::debug!(
            "Built {cluster_count} clusters from {total_triangles} triangles for {mesh_id:?} (target {per_cluster} tri/cluster)"
        );

        Ok(ClusteredMesh {
            mesh_id,
            clusters,
            vertices: vertices.to_vec(),
            indices: indices.to_vec(),
            total_triangles,
        })
    }
}

pub(crate) fn validate_triangle_list(vertices: &[Vertex], indices: &[u32]) -> Result<(), ClusterError> {
    if indices.len() % 3 != 0 {
        return Err(ClusterError::NotTriangleList {
            count: indices.len(),
        });
    }
    if u32::try_from(indices.len()).is_err() {
        return Err(ClusterError::TooManyIndices {
            count: indices.len(),
        });
    }
    if let Some((position, &index)) = indices
        .iter()
        .enumerate()
        .find(|&(_, &i)| i as usize >= vertices.len())
    {
        return Err(ClusterError::IndexOutOfRange {
            index,
            position,
            vertex_count: vertices.len(),
        });
    }
    Ok(())
}

/// Centroid of the referenced positions, radius to the farthest one.
fn compute_bounding_sphere(vertices: &[Vertex], indices: &[u32]) -> Vec4 {
    if indices.is_empty() {
        return Vec4::ZERO;
    }

    let center = indices
        .iter()
        .map(|&i| vertices[i as usize].position)
        .sum::<Vec3>()
        / indices.len() as f32;

    let max_dist2 = indices
        .iter()
        .map(|&i| vertices[i as usize].position.distance_squared(center))
        .fold(0.0f32, f32::max);

    center.extend(max_dist2.sqrt())
}

fn compute_aabb(vertices: &[Vertex], indices: &[u32]) -> (Vec3, Vec3) {
    indices.iter().fold(
        (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
        |(min, max), &i| {
            let p = vertices[i as usize].position;
            (min.min(p), max.max(p))
        },
    )
}

fn face_normal(vertices: &[Vertex], tri: &[u32]) -> Vec3 {
    let v0 = vertices[tri[0] as usize].position;
    let v1 = vertices[tri[1] as usize].position;
    let v2 = vertices[tri[2] as usize].position;
    (v1 - v0).cross(v2 - v0)
}

fn compute_normal_cone(vertices: &[Vertex], indices: &[u32]) -> (Vec3, f32) {
    // Unnormalized cross products weight each face by its area.
    let sum: Vec3 = indices
        .chunks_exact(3)
        .map(|tri| face_normal(vertices, tri))
        .filter(|n| n.length() > DEGENERATE_AREA)
        .sum();

    let len = sum.length();
    if len < DEGENERATE_AREA {
        return (Vec3::Y, -1.0);
    }
    let axis = sum / len;

    let min_cos = indices
        .chunks_exact(3)
        .map(|tri| face_normal(vertices, tri))
        .filter(|n| n.length() > DEGENERATE_AREA)
        .map(|n| n.normalize().dot(axis))
        .fold(1.0f32, f32::min);

    (axis, min_cos)
}
