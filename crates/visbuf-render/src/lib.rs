//! Visibility-buffer targets: the CPU reference target and rasterizer, the
//! resolve walk that turns records back into triangles, debug colouring,
//! the wgpu `Rg32Uint` attachment, and the WGSL side of the id contract.

pub mod debug_view;
pub mod dump;
pub mod raster;
pub mod resolve;
pub mod shader;
pub mod target;
pub mod texture;

pub use debug_view::{DebugMode, debug_color, debug_image};
pub use dump::{DumpError, MAX_DIMENSION, read_dump, write_dump};
pub use raster::{RasterStats, Rasterizer};
pub use resolve::{
    PixelResolve, ResolveStats, ResolvedHit, Resolver, SurfaceSample, TransformFn,
    perspective_barycentrics,
};
pub use shader::{
    VISBUF_DECODE_WGSL, VISBUF_RASTER_FEATURES, VISBUF_RASTER_SHADER, missing_raster_features,
};
pub use target::VisibilityTarget;
pub use texture::{VisibilityTexture, records_from_readback};
