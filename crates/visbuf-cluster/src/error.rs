//! Error types for clustering and global geometry assembly.

use visbuf_codec::CodecError;

use crate::geometry::MeshId;

/// Errors raised while splitting a mesh into clusters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClusterError {
    /// The index buffer is not a triangle list.
    #[error("index count {count} is not a multiple of 3")]
    NotTriangleList { count: usize },

    /// An index points past the end of the vertex buffer.
    #[error("index {index} at position {position} is out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        index: u32,
        position: usize,
        vertex_count: usize,
    },

    /// The mesh has more indices than a `u32` can address.
    #[error("mesh has {count} indices, more than u32 can address")]
    TooManyIndices { count: usize },
}

/// Errors raised while building global tables or draw lists.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeometryError {
    /// No mesh contributed any vertices or indices.
    #[error("no mesh data to build global buffers from")]
    Empty,

    /// The concatenated tables no longer fit 32-bit offsets.
    #[error("global {what} count overflows u32")]
    Overflow { what: &'static str },

    /// The same mesh was added twice.
    #[error("mesh {0:?} registered twice")]
    DuplicateMesh(MeshId),

    /// A draw referenced a mesh that is not part of the global tables.
    #[error("mesh {0:?} is not in the global geometry")]
    UnknownMesh(MeshId),

    /// A draw referenced clusters for a mesh without cluster data.
    #[error("mesh {0:?} has no cluster data")]
    MissingClusters(MeshId),

    /// The same instance id was submitted twice in one frame.
    #[error("instance {0} submitted twice")]
    DuplicateInstance(u32),

    /// Ids of a draw would not survive the +1 bias.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Clustering failed for one of the meshes.
    #[error("mesh {mesh:?}: {source}")]
    Cluster {
        mesh: MeshId,
        #[source]
        source: ClusterError,
    },
}
