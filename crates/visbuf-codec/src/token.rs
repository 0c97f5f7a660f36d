//! The biased two-lane visibility record and its logical counterpart.
//!
//! Lane layout (`Rg32Uint`, 8 bytes per pixel):
//!   - `[0]` instance id + 1
//!   - `[1]` global triangle id + 1
//!
//! The record `(0, 0)` is reserved for pixels no triangle covered. Because
//! every real id is biased by one, a valid hit can never produce it.

use bytemuck::{Pod, Zeroable};

use crate::draw::global_triangle_id;
use crate::error::{CodecError, IdKind};

/// Largest logical id that survives the +1 bias without wrapping (2^32 - 2).
pub const MAX_VALID_ID: u32 = u32::MAX - 1;

/// One texel of the visibility target, exactly as the raster pass stores it.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct RawRecord {
    /// Biased instance id (channel R).
    pub instance: u32,
    /// Biased global triangle id (channel G).
    pub triangle: u32,
}

static_assertions::assert_eq_size!(RawRecord, [u32; 2]);

impl RawRecord {
    /// Background sentinel: nothing was rasterized at this pixel.
    pub const EMPTY: Self = Self {
        instance: 0,
        triangle: 0,
    };

    /// Build a record from raw lane values.
    pub const fn new(instance: u32, triangle: u32) -> Self {
        Self { instance, triangle }
    }

    /// Whether this is the background sentinel.
    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }

    /// Pack into a single `u64`, channel R in the low 32 bits.
    pub fn to_u64(self) -> u64 {
        ((self.triangle as u64) << 32) | self.instance as u64
    }

    /// Inverse of [`to_u64`](Self::to_u64).
    pub fn from_u64(packed: u64) -> Self {
        Self {
            instance: packed as u32,
            triangle: (packed >> 32) as u32,
        }
    }

    /// Lanes as the `[R, G]` pair a texture readback yields.
    pub fn lanes(self) -> [u32; 2] {
        [self.instance, self.triangle]
    }
}

impl From<[u32; 2]> for RawRecord {
    fn from([instance, triangle]: [u32; 2]) -> Self {
        Self { instance, triangle }
    }
}

/// Logical ids of the closest triangle at a pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VisibilityToken {
    pub instance_id: u32,
    pub triangle_id: u32,
}

impl VisibilityToken {
    /// Create a token without range checks.
    pub const fn new(instance_id: u32, triangle_id: u32) -> Self {
        Self {
            instance_id,
            triangle_id,
        }
    }

    /// Create a token, rejecting ids that would wrap into the sentinel.
    pub fn new_checked(instance_id: u32, triangle_id: u32) -> Result<Self, CodecError> {
        check_id(IdKind::Instance, instance_id as u64)?;
        check_id(IdKind::Triangle, triangle_id as u64)?;
        Ok(Self::new(instance_id, triangle_id))
    }

    /// Biased record for this token. Wraps like GPU integer arithmetic.
    pub fn encode(self) -> RawRecord {
        encode(self.instance_id, self.triangle_id)
    }

    /// Checked encode for the CPU side of draw setup.
    pub fn try_encode(self) -> Result<RawRecord, CodecError> {
        Self::new_checked(self.instance_id, self.triangle_id).map(Self::encode)
    }
}

pub(crate) fn check_id(kind: IdKind, value: u64) -> Result<(), CodecError> {
    if value > MAX_VALID_ID as u64 {
        return Err(CodecError::IdOverflow {
            kind,
            value,
            max: MAX_VALID_ID,
        });
    }
    Ok(())
}

/// Bias both ids by one. Ids above [`MAX_VALID_ID`] wrap, exactly as they
/// would in the fragment shader.
#[inline]
pub fn encode(instance_id: u32, global_triangle_id: u32) -> RawRecord {
    RawRecord {
        instance: instance_id.wrapping_add(1),
        triangle: global_triangle_id.wrapping_add(1),
    }
}

/// Per-fragment encoder: offsets the rasterizer's primitive index by the
/// draw's triangle base, then biases both ids.
#[inline]
pub fn encode_fragment(instance_id: u32, local_primitive_index: u32, triangle_offset: u32) -> RawRecord {
    encode(
        instance_id,
        global_triangle_id(local_primitive_index, triangle_offset),
    )
}

/// Recover logical ids. Returns `None` for the sentinel and for any record
/// with a zero lane, which `encode` cannot produce from valid ids.
#[inline]
pub fn decode(record: RawRecord) -> Option<VisibilityToken> {
    if record.instance == 0 || record.triangle == 0 {
        return None;
    }
    Some(VisibilityToken {
        instance_id: record.instance - 1,
        triangle_id: record.triangle - 1,
    })
}
