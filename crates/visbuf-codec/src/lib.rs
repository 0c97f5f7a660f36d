//! Visibility-buffer id encoding: the per-pixel `(instance, triangle)` record
//! written by the visibility raster pass and read back by material resolve.
//!
//! Both ids are stored with a +1 bias in the two lanes of an `Rg32Uint`
//! target so that the all-zero record stays free to mean "no geometry".

mod draw;
mod error;
mod token;

pub use draw::{DrawClusterInfo, TriangleOffset, global_triangle_id};
pub use error::{CodecError, IdKind};
pub use token::{MAX_VALID_ID, RawRecord, VisibilityToken, decode, encode, encode_fragment};
