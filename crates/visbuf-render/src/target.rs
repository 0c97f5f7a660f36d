//! CPU visibility target: one [`RawRecord`] and one reverse-Z depth value
//! per pixel, with the same arbitration a GPU depth test gives the raster pass.

use visbuf_codec::{RawRecord, VisibilityToken, decode};

/// Visibility records plus depth, row-major, origin top-left.
#[derive(Clone, Debug)]
pub struct VisibilityTarget {
    width: u32,
    height: u32,
    records: Vec<RawRecord>,
    depth: Vec<f32>,
}

impl VisibilityTarget {
    /// Reverse-Z clear value: 0.0 is the far plane.
    pub const CLEAR_DEPTH: f32 = 0.0;

    /// Create a target cleared to the background sentinel.
    pub fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize;
        Self {
            width,
            height,
            records: vec![RawRecord::EMPTY; len],
            depth: vec![Self::CLEAR_DEPTH; len],
        }
    }

    /// Wrap records read back from a GPU target or a dump. Depth is cleared.
    pub fn from_records(width: u32, height: u32, records: Vec<RawRecord>) -> Option<Self> {
        let len = width as usize * height as usize;
        if records.len() != len {
            return None;
        }
        Some(Self {
            width,
            height,
            records,
            depth: vec![Self::CLEAR_DEPTH; len],
        })
    }

    /// Reset every pixel to "no geometry" and the far plane.
    pub fn clear(&mut self) {
        self.records.fill(RawRecord::EMPTY);
        self.depth.fill(Self::CLEAR_DEPTH);
    }

    /// Resize, clearing contents. No-op if dimensions are unchanged.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.width == width && self.height == height {
            return;
        }
        *self = Self::new(width, height);
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y as usize * self.width as usize + x as usize)
    }

    /// Depth-tested write. Passes when `depth >= stored` (reverse-Z, nearest
    /// wins, equal depth lets the later write win). Returns whether the
    /// record was stored.
    pub fn write_fragment(&mut self, x: u32, y: u32, depth: f32, record: RawRecord) -> bool {
        let Some(index) = self.index(x, y) else {
            return false;
        };
        if depth >= self.depth[index] {
            self.depth[index] = depth;
            self.records[index] = record;
            true
        } else {
            false
        }
    }

    pub fn record(&self, x: u32, y: u32) -> Option<RawRecord> {
        self.index(x, y).map(|i| self.records[i])
    }

    /// Decoded ids at a pixel; `None` outside the target or on background.
    pub fn token(&self, x: u32, y: u32) -> Option<VisibilityToken> {
        self.record(x, y).and_then(decode)
    }

    pub fn depth(&self, x: u32, y: u32) -> Option<f32> {
        self.index(x, y).map(|i| self.depth[i])
    }

    pub fn records(&self) -> &[RawRecord] {
        &self.records
    }

    pub fn depths(&self) -> &[f32] {
        &self.depth
    }

    /// Tightly packed `Rg32Uint` rows.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.records)
    }

    /// Number of pixels holding something other than the sentinel.
    pub fn coverage(&self) -> usize {
        self.records.iter().filter(|r| !r.is_empty()).count()
    }

    /// Every pixel as `(x, y, record)`.
    pub fn pixels(&self) -> impl Iterator<Item = (u32, u32, RawRecord)> + '_ {
        let width = self.width.max(1);
        self.records
            .iter()
            .enumerate()
            .map(move |(i, r)| ((i as u32) % width, (i as u32) / width, *r))
    }
}
