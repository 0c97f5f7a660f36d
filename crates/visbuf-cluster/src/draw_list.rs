//! Per-frame list of cluster draws feeding the visibility raster pass.
//!
//! Every entry pairs an instance with one cluster (or a whole mesh) and
//! carries the global triangle offset of that cluster, so the ids the shader
//! writes index straight into [`GlobalGeometry`]'s tables.

use rustc_hash::FxHashMap;
use visbuf_codec::{DrawClusterInfo, TriangleOffset};

use crate::cluster::MeshCluster;
use crate::cull::{ClusterCuller, ClusterVisibility, CullStats};
use crate::error::GeometryError;
use crate::geometry::{GlobalGeometry, MeshId};

/// An instance submitted this frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InstanceRecord {
    pub instance_id: u32,
    pub mesh_id: MeshId,
}

/// Draw metadata plus the triangle count each draw rasterizes.
#[derive(Clone, Debug, Default)]
pub struct DrawList {
    draws: Vec<DrawClusterInfo>,
    triangle_counts: Vec<u32>,
    instances: FxHashMap<u32, InstanceRecord>,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submit an instance drawn as one draw per cluster of its mesh.
    pub fn push_clustered(
        &mut self,
        geometry: &GlobalGeometry,
        instance_id: u32,
        mesh_id: MeshId,
    ) -> Result<usize, GeometryError> {
        self.push_clusters(geometry, instance_id, mesh_id, |_| true)
    }

    /// Like [`push_clustered`](Self::push_clustered), but only clusters the
    /// culler keeps become draws. The instance is registered even when every
    /// cluster is culled.
    pub fn push_clustered_culled(
        &mut self,
        geometry: &GlobalGeometry,
        instance_id: u32,
        mesh_id: MeshId,
        culler: &ClusterCuller,
    ) -> Result<CullStats, GeometryError> {
        let mut stats = CullStats::default();
        self.push_clusters(geometry, instance_id, mesh_id, |cluster| {
            let visibility = culler.classify(cluster);
            stats.record(visibility);
            visibility == ClusterVisibility::Visible
        })?;
        Ok(stats)
    }

    fn push_clusters<F>(
        &mut self,
        geometry: &GlobalGeometry,
        instance_id: u32,
        mesh_id: MeshId,
        mut keep: F,
    ) -> Result<usize, GeometryError>
    where
        F: FnMut(&MeshCluster) -> bool,
    {
        let info = geometry
            .mesh_info(mesh_id)
            .ok_or(GeometryError::UnknownMesh(mesh_id))?;
        let clustered = geometry
            .clusters(mesh_id)
            .ok_or(GeometryError::MissingClusters(mesh_id))?;

        // Validate every cluster before touching the list.
        let mut pending = Vec::with_capacity(clustered.clusters.len());
        for cluster in &clustered.clusters {
            let offset = TriangleOffset(info.triangle_offset.0 + cluster.triangle_offset().0);
            let draw = DrawClusterInfo::checked(instance_id, offset, cluster.triangle_count())?;
            if keep(cluster) {
                pending.push((draw, cluster.triangle_count()));
            }
        }

        self.register_instance(instance_id, mesh_id)?;
        let count = pending.len();
        for (draw, triangles) in pending {
            self.draws.push(draw);
            self.triangle_counts.push(triangles);
        }
        Ok(count)
    }

    /// Submit an instance drawn with a single draw covering its whole mesh.
    pub fn push_mesh(
        &mut self,
        geometry: &GlobalGeometry,
        instance_id: u32,
        mesh_id: MeshId,
    ) -> Result<(), GeometryError> {
        let info = geometry
            .mesh_info(mesh_id)
            .ok_or(GeometryError::UnknownMesh(mesh_id))?;
        let draw = DrawClusterInfo::checked(instance_id, info.triangle_offset, info.triangle_count)?;

        self.register_instance(instance_id, mesh_id)?;
        self.draws.push(draw);
        self.triangle_counts.push(info.triangle_count);
        Ok(())
    }

    fn register_instance(&mut self, instance_id: u32, mesh_id: MeshId) -> Result<(), GeometryError> {
        if self.instances.contains_key(&instance_id) {
            return Err(GeometryError::DuplicateInstance(instance_id));
        }
        self.instances.insert(
            instance_id,
            InstanceRecord {
                instance_id,
                mesh_id,
            },
        );
        Ok(())
    }

    /// Clear for reuse next frame, keeping allocated capacity.
    pub fn clear(&mut self) {
        self.draws.clear();
        self.triangle_counts.clear();
        self.instances.clear();
    }

    pub fn draws(&self) -> &[DrawClusterInfo] {
        &self.draws
    }

    /// Triangles rasterized by the draw at the same position in [`draws`](Self::draws).
    pub fn triangle_counts(&self) -> &[u32] {
        &self.triangle_counts
    }

    /// Draws paired with their triangle counts.
    pub fn iter(&self) -> impl Iterator<Item = (&DrawClusterInfo, u32)> {
        self.draws.iter().zip(self.triangle_counts.iter().copied())
    }

    pub fn instance(&self, instance_id: u32) -> Option<&InstanceRecord> {
        self.instances.get(&instance_id)
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    pub fn len(&self) -> usize {
        self.draws.len()
    }

    pub fn is_empty(&self) -> bool {
        self.draws.is_empty()
    }

    /// Raw bytes of the draw-info storage buffer.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.draws)
    }
}
