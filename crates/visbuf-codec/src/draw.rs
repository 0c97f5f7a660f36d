//! Per-draw inputs of the visibility raster pass.

use bytemuck::{Pod, Zeroable};

use crate::error::{CodecError, IdKind};
use crate::token::{RawRecord, check_id, encode_fragment};

/// Base added to a draw's local primitive index so triangle ids stay unique
/// across every draw that shares one visibility target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TriangleOffset(pub u32);

impl TriangleOffset {
    /// Offset of the triangle starting at `first_index` in a triangle-list
    /// index buffer.
    ///
    /// `first_index` must be a multiple of 3. Debug builds assert this;
    /// release builds truncate to the triangle containing that index.
    pub fn from_first_index(first_index: u32) -> Self {
        debug_assert!(first_index % 3 == 0, "first_index must start a triangle");
        Self(first_index / 3)
    }
}

/// Global triangle id of a fragment. Wraps like shader integer addition.
#[inline]
pub fn global_triangle_id(local_primitive_index: u32, triangle_offset: u32) -> u32 {
    local_primitive_index.wrapping_add(triangle_offset)
}

/// Per-draw metadata read by the cluster raster shader (one entry per
/// indirect draw, indexed by draw id).
///
/// Layout (8 bytes): `instance_id: u32`, `triangle_offset: u32`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct DrawClusterInfo {
    pub instance_id: u32,
    pub triangle_offset: u32,
}

static_assertions::assert_eq_size!(DrawClusterInfo, [u8; 8]);

impl DrawClusterInfo {
    pub fn new(instance_id: u32, triangle_offset: TriangleOffset) -> Self {
        Self {
            instance_id,
            triangle_offset: triangle_offset.0,
        }
    }

    /// Build draw metadata after checking that every fragment this draw can
    /// emit (`triangle_count` primitives) stays inside the encodable range.
    pub fn checked(
        instance_id: u32,
        triangle_offset: TriangleOffset,
        triangle_count: u32,
    ) -> Result<Self, CodecError> {
        check_id(IdKind::Instance, instance_id as u64)?;
        if triangle_count > 0 {
            let last = triangle_offset.0 as u64 + triangle_count as u64 - 1;
            check_id(IdKind::Triangle, last)?;
        }
        Ok(Self::new(instance_id, triangle_offset))
    }

    /// Record written for the draw's `local_primitive_index`-th triangle.
    #[inline]
    pub fn encode(&self, local_primitive_index: u32) -> RawRecord {
        encode_fragment(self.instance_id, local_primitive_index, self.triangle_offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{MAX_VALID_ID, VisibilityToken, decode};

    #[test]
    fn test_triangle_offset_from_first_index() {
        assert_eq!(TriangleOffset::from_first_index(0), TriangleOffset(0));
        assert_eq!(TriangleOffset::from_first_index(192), TriangleOffset(64));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "first_index must start a triangle")]
    fn test_misaligned_first_index_asserts_in_debug() {
        let _ = TriangleOffset::from_first_index(4);
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn test_misaligned_first_index_truncates_in_release() {
        assert_eq!(TriangleOffset::from_first_index(4), TriangleOffset(1));
    }

    #[test]
    fn test_global_triangle_id_adds_offset() {
        assert_eq!(global_triangle_id(7, 1000), 1007);
        assert_eq!(global_triangle_id(0, 0), 0);
    }

    #[test]
    fn test_draw_info_encodes_fragments() {
        let draw = DrawClusterInfo::new(41, TriangleOffset(1000));
        let record = draw.encode(7);
        assert_eq!(record, RawRecord::new(42, 1008));
        assert_eq!(decode(record), Some(VisibilityToken::new(41, 1007)));
    }

    #[test]
    fn test_checked_accepts_range_ending_at_max_id() {
        let draw = DrawClusterInfo::checked(0, TriangleOffset(MAX_VALID_ID - 63), 64);
        assert!(draw.is_ok());
    }

    #[test]
    fn test_checked_rejects_range_crossing_max_id() {
        let err = DrawClusterInfo::checked(0, TriangleOffset(MAX_VALID_ID - 63), 65).unwrap_err();
        assert_eq!(
            err,
            CodecError::IdOverflow {
                kind: IdKind::Triangle,
                value: u32::MAX as u64,
                max: MAX_VALID_ID,
            }
        );
    }

    #[test]
    fn test_checked_rejects_reserved_instance() {
        let err = DrawClusterInfo::checked(u32::MAX, TriangleOffset(0), 1).unwrap_err();
        assert!(matches!(
            err,
            CodecError::IdOverflow {
                kind: IdKind::Instance,
                ..
            }
        ));
    }

    #[test]
    fn test_checked_allows_empty_draw() {
        let draw = DrawClusterInfo::checked(5, TriangleOffset(u32::MAX), 0).unwrap();
        assert_eq!(draw.triangle_offset, u32::MAX);
    }

    #[test]
    fn test_draw_info_buffer_layout() {
        let draws = [
            DrawClusterInfo::new(1, TriangleOffset(2)),
            DrawClusterInfo::new(3, TriangleOffset(4)),
        ];
        let words: &[u32] = bytemuck::cast_slice(&draws);
        assert_eq!(words, &[1, 2, 3, 4]);
    }
}
