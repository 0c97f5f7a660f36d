//! GPU visibility attachment: an `Rg32Uint` colour target cleared to the
//! all-zero sentinel, plus readback helpers.

use visbuf_codec::RawRecord;

/// Visibility render target (R = biased instance id, G = biased triangle id).
pub struct VisibilityTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    width: u32,
    height: u32,
}

impl VisibilityTexture {
    /// Two 32-bit unsigned channels, 8 bytes per pixel.
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rg32Uint;

    /// Bytes per texel of [`FORMAT`](Self::FORMAT).
    pub const BYTES_PER_PIXEL: u32 = 8;

    /// Integer targets clear to the truncated colour, so zero here is the
    /// `(0, 0)` background record.
    pub const CLEAR_COLOR: wgpu::Color = wgpu::Color::TRANSPARENT;

    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("visibility-buffer"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        log::debug!("Created visibility buffer {width}x{height}");

        Self {
            texture,
            view,
            width,
            height,
        }
    }

    /// Recreate at new dimensions. No-op if unchanged.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        if self.width == width && self.height == height {
            return;
        }
        *self = Self::new(device, width, height);
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Colour attachment that clears to the sentinel and stores. The raster
    /// pass writes without blending; the depth attachment decides which
    /// fragment survives.
    pub fn color_attachment(&self) -> wgpu::RenderPassColorAttachment<'_> {
        wgpu::RenderPassColorAttachment {
            view: &self.view,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(Self::CLEAR_COLOR),
                store: wgpu::StoreOp::Store,
            },
            depth_slice: None,
        }
    }

    /// Colour target state for the raster pipeline.
    pub fn color_target_state() -> wgpu::ColorTargetState {
        wgpu::ColorTargetState {
            format: Self::FORMAT,
            blend: None,
            write_mask: wgpu::ColorWrites::ALL,
        }
    }

    /// Row pitch of a readback buffer, padded to `COPY_BYTES_PER_ROW_ALIGNMENT`.
    pub fn padded_bytes_per_row(width: u32) -> u32 {
        let unpadded = width * Self::BYTES_PER_PIXEL;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        unpadded.div_ceil(align) * align
    }

    /// Record a copy of the whole target into a new mappable buffer.
    pub fn copy_to_buffer(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
    ) -> wgpu::Buffer {
        let padded = Self::padded_bytes_per_row(self.width);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("visibility-readback"),
            size: u64::from(padded) * u64::from(self.height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );

        buffer
    }
}

/// Strip row padding from mapped readback bytes. Returns `None` if `bytes`
/// is too short for the given dimensions.
pub fn records_from_readback(bytes: &[u8], width: u32, height: u32) -> Option<Vec<RawRecord>> {
    let padded = VisibilityTexture::padded_bytes_per_row(width) as usize;
    let row_bytes = (width * VisibilityTexture::BYTES_PER_PIXEL) as usize;
    if bytes.len() < padded * height as usize {
        return None;
    }

    let mut records = Vec::with_capacity(width as usize * height as usize);
    for row in bytes.chunks_exact(padded).take(height as usize) {
        records.extend(
            row[..row_bytes]
                .chunks_exact(VisibilityTexture::BYTES_PER_PIXEL as usize)
                .map(bytemuck::pod_read_unaligned::<RawRecord>),
        );
    }
    Some(records)
}
