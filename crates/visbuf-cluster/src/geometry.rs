//! Global vertex/index tables shared by every draw into the visibility target.
//!
//! Each mesh is appended once. Its indices are rebased into global vertex
//! space and its first triangle gets a global triangle offset
//! (`global_index_offset / 3`), which is what draws add to the rasterizer's
//! primitive index.

use glam::Vec3;
use rustc_hash::FxHashMap;
use visbuf_codec::TriangleOffset;

use crate::cluster::{ClusteredMesh, validate_triangle_list};
use crate::error::GeometryError;
use crate::vertex::{PackedVertex, Vertex};

/// Caller-chosen mesh identifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(pub u32);

/// Where a mesh lives inside the global tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MeshInfo {
    pub global_vertex_offset: u32,
    pub global_index_offset: u32,
    /// `global_index_offset / 3`.
    pub triangle_offset: TriangleOffset,
    pub triangle_count: u32,
}

impl MeshInfo {
    /// Whether a global triangle id belongs to this mesh.
    pub fn contains_triangle(&self, global_triangle_id: u32) -> bool {
        let start = self.triangle_offset.0 as u64;
        let id = global_triangle_id as u64;
        id >= start && id < start + self.triangle_count as u64
    }
}

/// Concatenated geometry of every mesh that can appear in the visibility target.
#[derive(Clone, Debug, Default)]
pub struct GlobalGeometry {
    vertices: Vec<PackedVertex>,
    indices: Vec<u32>,
    meshes: FxHashMap<MeshId, MeshInfo>,
    clusters: FxHashMap<MeshId, ClusteredMesh>,
}

impl GlobalGeometry {
    /// Build from plain meshes, in iteration order.
    pub fn build<'a, I>(meshes: I) -> Result<Self, GeometryError>
    where
        I: IntoIterator<Item = (MeshId, &'a [Vertex], &'a [u32])>,
    {
        let mut geometry = Self::default();
        for (id, vertices, indices) in meshes {
            geometry.append(id, vertices, indices)?;
        }
        geometry.finish()
    }

    /// Build from clustering output. Cluster index order is kept, so triangle
    /// ids rasterized by cluster draws line up with this table.
    pub fn build_from_clusters<I>(meshes: I) -> Result<Self, GeometryError>
    where
        I: IntoIterator<Item = ClusteredMesh>,
    {
        let mut geometry = Self::default();
        for mesh in meshes {
            geometry.append(mesh.mesh_id, &mesh.vertices, &mesh.indices)?;
            geometry.clusters.insert(mesh.mesh_id, mesh);
        }
        geometry.finish()
    }

    fn append(&mut self, id: MeshId, vertices: &[Vertex], indices: &[u32]) -> Result<(), GeometryError> {
        if self.meshes.contains_key(&id) {
            return Err(GeometryError::DuplicateMesh(id));
        }
        // Indices must stay inside their own mesh once rebased.
        validate_triangle_list(vertices, indices)
            .map_err(|source| GeometryError::Cluster { mesh: id, source })?;

        let overflow = |what| GeometryError::Overflow { what };
        let global_vertex_offset = u32::try_from(self.vertices.len()).map_err(|_| overflow("vertex"))?;
        let global_index_offset = u32::try_from(self.indices.len()).map_err(|_| overflow("index"))?;
        let vertex_count = u32::try_from(vertices.len()).map_err(|_| overflow("vertex"))?;
        let index_count = u32::try_from(indices.len()).map_err(|_| overflow("index"))?;
        global_vertex_offset
            .checked_add(vertex_count)
            .ok_or(overflow("vertex"))?;
        global_index_offset
            .checked_add(index_count)
            .ok_or(overflow("index"))?;

        self.meshes.insert(
            id,
            MeshInfo {
                global_vertex_offset,
                global_index_offset,
                triangle_offset: TriangleOffset(global_index_offset / 3),
                triangle_count: index_count / 3,
            },
        );

        self.vertices.extend(vertices.iter().map(PackedVertex::from));
        for &index in indices {
            let rebased = index
                .checked_add(global_vertex_offset)
                .ok_or(overflow("index"))?;
            self.indices.push(rebased);
        }
        Ok(())
    }

    fn finish(self) -> Result<Self, GeometryError> {
        if self.vertices.is_empty() || self.indices.is_empty() {
            log::warn!("Global geometry has no vertex or index data");
            return Err(GeometryError::Empty);
        }
        log::info!(
            "Global buffers built ({} vertices, {} indices, {} meshes)",
            self.vertices.len(),
            self.indices.len(),
            self.meshes.len()
        );
        Ok(self)
    }

    pub fn mesh_info(&self, id: MeshId) -> Option<&MeshInfo> {
        self.meshes.get(&id)
    }

    /// Cluster data for meshes added through [`build_from_clusters`](Self::build_from_clusters).
    pub fn clusters(&self, id: MeshId) -> Option<&ClusteredMesh> {
        self.clusters.get(&id)
    }

    pub fn vertices(&self) -> &[PackedVertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn triangle_count(&self) -> u32 {
        (self.indices.len() / 3) as u32
    }

    /// Raw bytes for uploading the vertex table to a storage buffer.
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Raw bytes for uploading the index table to a storage buffer.
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Global vertex indices of a triangle.
    pub fn triangle(&self, global_triangle_id: u32) -> Option<[u32; 3]> {
        let base = global_triangle_id as usize * 3;
        let tri = self.indices.get(base..base + 3)?;
        Some([tri[0], tri[1], tri[2]])
    }

    /// Object-space positions of a triangle.
    pub fn triangle_positions(&self, global_triangle_id: u32) -> Option<[Vec3; 3]> {
        let [a, b, c] = self.triangle(global_triangle_id)?;
        let fetch = |i: u32| self.vertices.get(i as usize).map(PackedVertex::position);
        Some([fetch(a)?, fetch(b)?, fetch(c)?])
    }

    /// Mesh owning a global triangle id.
    pub fn mesh_for_triangle(&self, global_triangle_id: u32) -> Option<(MeshId, &MeshInfo)> {
        self.meshes
            .iter()
            .find(|(_, info)| info.contains_triangle(global_triangle_id))
            .map(|(id, info)| (*id, info))
    }

    /// Mesh and mesh-local cluster index that rasterized a global triangle id.
    /// Only available for meshes built from clusters.
    pub fn cluster_for_triangle(&self, global_triangle_id: u32) -> Option<(MeshId, u32)> {
        let (mesh_id, info) = self.mesh_for_triangle(global_triangle_id)?;
        let clustered = self.clusters.get(&mesh_id)?;
        let local = global_triangle_id - info.triangle_offset.0;
        let index = clustered.clusters.iter().position(|c| {
            let first = c.triangle_offset().0;
            local >= first && local < first + c.triangle_count()
        })?;
        Some((mesh_id, index as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ClusterBuilder;
    use crate::error::ClusterError;

    fn quad(origin: Vec3) -> (Vec<Vertex>, Vec<u32>) {
        let vertices = vec![
            Vertex::at(origin),
            Vertex::at(origin + Vec3::X),
            Vertex::at(origin + Vec3::Z),
            Vertex::at(origin + Vec3::X + Vec3::Z),
        ];
        (vertices, vec![0, 2, 1, 1, 2, 3])
    }

    #[test]
    fn test_offsets_accumulate_across_meshes() {
        let (va, ia) = quad(Vec3::ZERO);
        let (vb, ib) = quad(Vec3::new(5.0, 0.0, 0.0));
        let geometry = GlobalGeometry::build([
            (MeshId(10), va.as_slice(), ia.as_slice()),
            (MeshId(20), vb.as_slice(), ib.as_slice()),
        ])
        .unwrap();

        let a = geometry.mesh_info(MeshId(10)).unwrap();
        let b = geometry.mesh_info(MeshId(20)).unwrap();
        assert_eq!(a.triangle_offset, TriangleOffset(0));
        assert_eq!(b.global_vertex_offset, 4);
        assert_eq!(b.global_index_offset, 6);
        assert_eq!(b.triangle_offset, TriangleOffset(2));
        assert_eq!(geometry.triangle_count(), 4);
    }

    #[test]
    fn test_indices_are_rebased_to_global_vertices() {
        let (va, ia) = quad(Vec3::ZERO);
        let (vb, ib) = quad(Vec3::new(5.0, 0.0, 0.0));
        let geometry = GlobalGeometry::build([
            (MeshId(0), va.as_slice(), ia.as_slice()),
            (MeshId(1), vb.as_slice(), ib.as_slice()),
        ])
        .unwrap();

        assert_eq!(geometry.triangle(2), Some([4, 6, 5]));
        let positions = geometry.triangle_positions(2).unwrap();
        assert_eq!(positions[0], Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(geometry.triangle(4), None);
    }

    #[test]
    fn test_mesh_for_triangle() {
        let (va, ia) = quad(Vec3::ZERO);
        let (vb, ib) = quad(Vec3::ONE);
        let geometry = GlobalGeometry::build([
            (MeshId(0), va.as_slice(), ia.as_slice()),
            (MeshId(1), vb.as_slice(), ib.as_slice()),
        ])
        .unwrap();
        assert_eq!(geometry.mesh_for_triangle(1).map(|(id, _)| id), Some(MeshId(0)));
        assert_eq!(geometry.mesh_for_triangle(3).map(|(id, _)| id), Some(MeshId(1)));
        assert!(geometry.mesh_for_triangle(4).is_none());
    }

    #[test]
    fn test_empty_input_is_an_error() {
        let result = GlobalGeometry::build(std::iter::empty::<(MeshId, &[Vertex], &[u32])>());
        assert!(matches!(result, Err(GeometryError::Empty)));
    }

    #[test]
    fn test_duplicate_mesh_is_an_error() {
        let (v, i) = quad(Vec3::ZERO);
        let result = GlobalGeometry::build([
            (MeshId(7), v.as_slice(), i.as_slice()),
            (MeshId(7), v.as_slice(), i.as_slice()),
        ]);
        assert!(matches!(result, Err(GeometryError::DuplicateMesh(MeshId(7)))));
    }

    #[test]
    fn test_build_from_clusters_keeps_cluster_data() {
        let (v, i) = quad(Vec3::ZERO);
        let clustered = ClusterBuilder::new().build(&v, &i, MeshId(4)).unwrap();
        let geometry = GlobalGeometry::build_from_clusters([clustered]).unwrap();
        assert_eq!(geometry.clusters(MeshId(4)).unwrap().clusters.len(), 1);
        assert_eq!(geometry.vertex_bytes().len(), 4 * 64);
        assert_eq!(geometry.index_bytes().len(), 6 * 4);
        assert_eq!(geometry.cluster_for_triangle(1), Some((MeshId(4), 0)));
        assert_eq!(geometry.cluster_for_triangle(2), None);
    }

    #[test]
    fn test_index_past_own_vertices_is_an_error() {
        let va = [
            Vertex::at(Vec3::ZERO),
            Vertex::at(Vec3::X),
            Vertex::at(Vec3::Z),
        ];
        let ia = [0u32, 1, 4];
        let (vb, ib) = quad(Vec3::splat(100.0));
        let result = GlobalGeometry::build([
            (MeshId(0), va.as_slice(), ia.as_slice()),
            (MeshId(1), vb.as_slice(), ib.as_slice()),
        ]);
        assert!(matches!(
            result,
            Err(GeometryError::Cluster {
                mesh: MeshId(0),
                source: ClusterError::IndexOutOfRange {
                    index: 4,
                    position: 2,
                    vertex_count: 3,
                },
            })
        ));
    }

    #[test]
    fn test_partial_triangle_is_an_error() {
        let (v, _) = quad(Vec3::ZERO);
        let indices = [0u32, 1, 2, 3];
        let result = GlobalGeometry::build([(MeshId(1), v.as_slice(), indices.as_slice())]);
        assert!(matches!(
            result,
            Err(GeometryError::Cluster {
                mesh: MeshId(1),
                source: ClusterError::NotTriangleList { count: 4 },
            })
        ));
    }
}
