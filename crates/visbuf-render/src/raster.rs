//! Reference CPU rasterizer for the visibility pass.
//!
//! Mirrors what the GPU raster pass does for one draw: every covered pixel
//! centre receives `encode_fragment(instance, primitive_index, offset)`,
//! filtered through the target's reverse-Z depth test. Coverage uses edge
//! functions with a top-left fill rule so triangles sharing an edge never
//! both claim a pixel.

use glam::{Mat4, Vec3, Vec4Swizzles};
use visbuf_cluster::{DrawList, GlobalGeometry};
use visbuf_codec::{DrawClusterInfo, RawRecord};

use crate::target::VisibilityTarget;

/// Counters from a rasterization call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RasterStats {
    pub triangles: u32,
    /// Triangles dropped for crossing the camera plane or being degenerate.
    pub culled_triangles: u32,
    /// Fragments that passed the depth test.
    pub fragments_written: u64,
}

impl std::ops::AddAssign for RasterStats {
    fn add_assign(&mut self, rhs: Self) {
        self.triangles += rhs.triangles;
        self.culled_triangles += rhs.culled_triangles;
        self.fragments_written += rhs.fragments_written;
    }
}

/// Screen-space triangle rasterizer writing visibility records.
#[derive(Clone, Copy, Debug, Default)]
pub struct Rasterizer;

#[inline]
fn edge(a: Vec3, b: Vec3, px: f32, py: f32) -> f32 {
    (b.x - a.x) * (py - a.y) - (b.y - a.y) * (px - a.x)
}

/// Top edge (horizontal, interior below) or left edge (going up in y-down space).
#[inline]
fn is_top_left(a: Vec3, b: Vec3) -> bool {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    (dy == 0.0 && dx > 0.0) || dy < 0.0
}

/// Zero or non-finite screen area.
#[inline]
fn is_degenerate([v0, v1, v2]: [Vec3; 3]) -> bool {
    let area = edge(v0, v1, v2.x, v2.y);
    area == 0.0 || !area.is_finite()
}

#[inline]
fn covers(w: f32, top_left: bool) -> bool {
    w > 0.0 || (w == 0.0 && top_left)
}

impl Rasterizer {
    /// Rasterize one triangle given in screen space (x, y in pixels, origin
    /// top-left; z is reverse-Z depth). Both windings are drawn. Returns the
    /// number of fragments that passed the depth test.
    pub fn draw_triangle(
        &self,
        target: &mut VisibilityTarget,
        triangle: [Vec3; 3],
        record: RawRecord,
    ) -> u32 {
        if is_degenerate(triangle) {
            return 0;
        }
        let [v0, mut v1, mut v2] = triangle;
        let mut area = edge(v0, v1, v2.x, v2.y);
        if area < 0.0 {
            std::mem::swap(&mut v1, &mut v2);
            area = -area;
        }

        let min_x = v0.x.min(v1.x).min(v2.x).floor().max(0.0) as u32;
        let min_y = v0.y.min(v1.y).min(v2.y).floor().max(0.0) as u32;
        let max_x = (v0.x.max(v1.x).max(v2.x).ceil().min(target.width() as f32)) as u32;
        let max_y = (v0.y.max(v1.y).max(v2.y).ceil().min(target.height() as f32)) as u32;

        let tl0 = is_top_left(v1, v2);
        let tl1 = is_top_left(v2, v0);
        let tl2 = is_top_left(v0, v1);

        let mut written = 0;
        for y in min_y..max_y {
            let py = y as f32 + 0.5;
            for x in min_x..max_x {
                let px = x as f32 + 0.5;
                let w0 = edge(v1, v2, px, py);
                let w1 = edge(v2, v0, px, py);
                let w2 = edge(v0, v1, px, py);
                if !(covers(w0, tl0) && covers(w1, tl1) && covers(w2, tl2)) {
                    continue;
                }
                let depth = (w0 * v0.z + w1 * v1.z + w2 * v2.z) / area;
                // Depth clipping: outside [0, 1] lies past the near or far plane.
                if !(0.0..=1.0).contains(&depth) {
                    continue;
                }
                if target.write_fragment(x, y, depth, record) {
                    written += 1;
                }
            }
        }
        written
    }

    /// Rasterize the triangles of one draw. The `i`-th triangle gets local
    /// primitive index `i`, exactly like the GPU's primitive numbering.
    pub fn draw<I>(&self, target: &mut VisibilityTarget, draw: &DrawClusterInfo, triangles: I) -> RasterStats
    where
        I: IntoIterator<Item = [Vec3; 3]>,
    {
        let mut stats = RasterStats::default();
        for (primitive, triangle) in (0u32..).zip(triangles) {
            stats.triangles += 1;
            if is_degenerate(triangle) {
                stats.culled_triangles += 1;
                continue;
            }
            let written = self.draw_triangle(target, triangle, draw.encode(primitive));
            stats.fragments_written += written as u64;
        }
        stats
    }

    /// Rasterize a whole draw list from the global tables, projecting each
    /// instance's triangles with the matrix returned by `transform`
    /// (`view_proj * model`, reverse-Z). Instances without a transform are
    /// skipped. Triangles with any vertex behind the camera plane are culled;
    /// there is no near-plane clipping.
    pub fn draw_list<F>(
        &self,
        target: &mut VisibilityTarget,
        geometry: &GlobalGeometry,
        draws: &DrawList,
        transform: F,
    ) -> RasterStats
    where
        F: Fn(u32) -> Option<Mat4>,
    {
        let size = glam::Vec2::new(target.width() as f32, target.height() as f32);
        let mut stats = RasterStats::default();

        for (draw, triangle_count) in draws.iter() {
            let Some(mvp) = transform(draw.instance_id) else {
                log::debug!("No transform for instance {}, skipping draw", draw.instance_id);
                continue;
            };

            for primitive in 0..triangle_count {
                stats.triangles += 1;
                let global = draw.triangle_offset + primitive;
                let Some(positions) = geometry.triangle_positions(global) else {
                    stats.culled_triangles += 1;
                    continue;
                };

                let mut screen = [Vec3::ZERO; 3];
                let mut behind = false;
                for (out, p) in screen.iter_mut().zip(positions) {
                    let clip = mvp * p.extend(1.0);
                    if clip.w <= 0.0 {
                        behind = true;
                        break;
                    }
                    let ndc = clip.xyz() / clip.w;
                    *out = Vec3::new(
                        (ndc.x * 0.5 + 0.5) * size.x,
                        (0.5 - ndc.y * 0.5) * size.y,
                        ndc.z,
                    );
                }
                if behind {
                    stats.culled_triangles += 1;
                    continue;
                }

                if is_degenerate(screen) {
                    stats.culled_triangles += 1;
                    continue;
                }
                let written = self.draw_triangle(target, screen, draw.encode(primitive));
                stats.fragments_written += written as u64;
            }
        }

        log::debug!(
            "Rasterized {} triangles ({} culled), {} fragments written",
            stats.triangles,
            stats.culled_triangles,
            stats.fragments_written
        );
        stats
    }
}
