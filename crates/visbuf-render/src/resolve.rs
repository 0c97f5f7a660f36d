//! Consumer side of the visibility contract: turn stored records back into
//! the instance and triangle they name, fetch that triangle from the global
//! tables, and reconstruct its vertex attributes at the pixel.

use glam::{Mat4, UVec2, Vec2, Vec3, Vec4, Vec4Swizzles};
use visbuf_cluster::{DrawList, GlobalGeometry, MeshId, PackedVertex};
use visbuf_codec::{RawRecord, VisibilityToken, decode};

use crate::target::VisibilityTarget;

/// Per-instance `clip_from_object` matrix lookup.
pub type TransformFn<'a> = dyn Fn(u32) -> Option<Mat4> + 'a;

/// Vertex attributes interpolated at a pixel centre (object space).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceSample {
    /// Perspective-correct weights of the triangle's three vertices.
    pub barycentrics: Vec3,
    pub uv: Vec2,
    /// Normalized interpolated normal.
    pub normal: Vec3,
    pub tangent: Vec4,
    pub color: Vec4,
}

/// A pixel whose record names a live instance and one of its triangles.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResolvedHit {
    pub token: VisibilityToken,
    pub mesh_id: MeshId,
    /// Global vertex indices of the triangle.
    pub triangle: [u32; 3],
    /// Present when the resolver has the instance's transform.
    pub surface: Option<SurfaceSample>,
}

/// Outcome of resolving a single record.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PixelResolve {
    /// Background sentinel.
    Empty,
    /// A record no valid draw could have produced: a single zero lane, an
    /// unknown instance, or a triangle outside the instance's mesh.
    Invalid(RawRecord),
    Hit(ResolvedHit),
}

/// Per-frame resolve counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResolveStats {
    pub resolved_pixels: u64,
    pub empty_pixels: u64,
    pub invalid_pixels: u64,
}

/// Looks up records against the frame's draw list and global geometry.
pub struct Resolver<'a> {
    geometry: &'a GlobalGeometry,
    draws: &'a DrawList,
    transforms: Option<&'a TransformFn<'a>>,
}

impl<'a> Resolver<'a> {
    pub fn new(geometry: &'a GlobalGeometry, draws: &'a DrawList) -> Self {
        Self {
            geometry,
            draws,
            transforms: None,
        }
    }

    /// Reconstruct attributes using the same per-instance transforms the
    /// raster pass used.
    pub fn with_transforms(mut self, transforms: &'a TransformFn<'a>) -> Self {
        self.transforms = Some(transforms);
        self
    }

    /// Ids and triangle only; [`ResolvedHit::surface`] is always `None`.
    pub fn resolve_record(&self, record: RawRecord) -> PixelResolve {
        if record.is_empty() {
            return PixelResolve::Empty;
        }
        let Some(token) = decode(record) else {
            return PixelResolve::Invalid(record);
        };
        let Some(instance) = self.draws.instance(token.instance_id) else {
            return PixelResolve::Invalid(record);
        };
        let Some(info) = self.geometry.mesh_info(instance.mesh_id) else {
            return PixelResolve::Invalid(record);
        };
        if !info.contains_triangle(token.triangle_id) {
            return PixelResolve::Invalid(record);
        }
        match self.geometry.triangle(token.triangle_id) {
            Some(triangle) => PixelResolve::Hit(ResolvedHit {
                token,
                mesh_id: instance.mesh_id,
                triangle,
                surface: None,
            }),
            None => PixelResolve::Invalid(record),
        }
    }

    /// Resolve the record stored at pixel `(x, y)` of a `size` target,
    /// interpolating attributes when transforms are available.
    pub fn resolve_pixel(&self, record: RawRecord, x: u32, y: u32, size: UVec2) -> PixelResolve {
        let mut resolved = self.resolve_record(record);
        if let (PixelResolve::Hit(hit), Some(transforms)) = (&mut resolved, self.transforms) {
            hit.surface = transforms(hit.token.instance_id)
                .and_then(|clip_from_object| self.sample(hit.triangle, clip_from_object, x, y, size));
        }
        resolved
    }

    fn sample(
        &self,
        triangle: [u32; 3],
        clip_from_object: Mat4,
        x: u32,
        y: u32,
        size: UVec2,
    ) -> Option<SurfaceSample> {
        let vertices = self.geometry.vertices();
        let [a, b, c] = triangle.map(|i| vertices.get(i as usize));
        let corners: [&PackedVertex; 3] = [a?, b?, c?];

        let clip = corners.map(|v| clip_from_object * v.position().extend(1.0));
        let pixel = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
        let weights = perspective_barycentrics(clip, pixel, size.as_vec2())?;

        let blend2 = |f: fn(&PackedVertex) -> Vec2| {
            f(corners[0]) * weights.x + f(corners[1]) * weights.y + f(corners[2]) * weights.z
        };
        let blend3 = |f: fn(&PackedVertex) -> Vec3| {
            f(corners[0]) * weights.x + f(corners[1]) * weights.y + f(corners[2]) * weights.z
        };
        let blend4 = |f: fn(&PackedVertex) -> Vec4| {
            f(corners[0]) * weights.x + f(corners[1]) * weights.y + f(corners[2]) * weights.z
        };

        Some(SurfaceSample {
            barycentrics: weights,
            uv: blend2(PackedVertex::tex_coord),
            normal: blend3(PackedVertex::normal).normalize_or_zero(),
            tangent: blend4(|v| Vec4::from_array(v.tangent)),
            color: blend4(|v| Vec4::from_array(v.color)),
        })
    }

    /// Resolve every pixel, calling `on_hit(x, y, hit)` for covered ones.
    pub fn resolve<F>(&self, target: &VisibilityTarget, mut on_hit: F) -> ResolveStats
    where
        F: FnMut(u32, u32, &ResolvedHit),
    {
        let size = UVec2::new(target.width(), target.height());
        let mut stats = ResolveStats::default();
        for (x, y, record) in target.pixels() {
            match self.resolve_pixel(record, x, y, size) {
                PixelResolve::Empty => stats.empty_pixels += 1,
                PixelResolve::Invalid(_) => stats.invalid_pixels += 1,
                PixelResolve::Hit(hit) => {
                    stats.resolved_pixels += 1;
                    on_hit(x, y, &hit);
                }
            }
        }
        if stats.invalid_pixels > 0 {
            log::warn!(
                "{} visibility records did not match any submitted draw",
                stats.invalid_pixels
            );
        }
        stats
    }
}

fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

/// Perspective-correct barycentrics of `pixel` (screen space, origin
/// top-left) inside the triangle with clip-space corners `clip`, using the
/// same viewport mapping as the rasterizer. `None` if a corner is behind the
/// camera or the triangle has no screen area.
pub fn perspective_barycentrics(clip: [Vec4; 3], pixel: Vec2, size: Vec2) -> Option<Vec3> {
    if clip.iter().any(|c| c.w <= 0.0) {
        return None;
    }
    let screen = clip.map(|c| {
        let ndc = c.xy() / c.w;
        Vec2::new((ndc.x * 0.5 + 0.5) * size.x, (0.5 - ndc.y * 0.5) * size.y)
    });

    let area = edge(screen[0], screen[1], screen[2]);
    if area == 0.0 || !area.is_finite() {
        return None;
    }
    let b0 = edge(screen[1], screen[2], pixel) / area;
    let b1 = edge(screen[2], screen[0], pixel) / area;
    let linear = Vec3::new(b0, b1, 1.0 - b0 - b1);

    // Screen-space weights divided by w, renormalized.
    let corrected = linear / Vec3::new(clip[0].w, clip[1].w, clip[2].w);
    let sum = corrected.x + corrected.y + corrected.z;
    if sum == 0.0 || !sum.is_finite() {
        return None;
    }
    Some(corrected / sum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use visbuf_cluster::{ClusterBuilder, Vertex};
    use visbuf_codec::encode;

    use crate::raster::Rasterizer;

    fn two_quads() -> (GlobalGeometry, DrawList) {
        let quad = |x0: f32, x1: f32| {
            vec![
                Vertex::at(Vec3::new(x0, -1.0, 0.0)),
                Vertex::at(Vec3::new(x1, -1.0, 0.0)),
                Vertex::at(Vec3::new(x0, 1.0, 0.0)),
                Vertex::at(Vec3::new(x1, 1.0, 0.0)),
            ]
        };
        let indices = vec![0, 1, 2, 1, 3, 2];
        let builder = ClusterBuilder::new();
        let left = builder.build(&quad(-1.0, 0.0), &indices, MeshId(0)).unwrap();
        let right = builder.build(&quad(0.0, 1.0), &indices, MeshId(1)).unwrap();
        let geometry = GlobalGeometry::build_from_clusters([left, right]).unwrap();

        let mut list = DrawList::new();
        list.push_clustered(&geometry, 0, MeshId(0)).unwrap();
        list.push_clustered(&geometry, 1, MeshId(1)).unwrap();
        (geometry, list)
    }

    #[test]
    fn test_sentinel_resolves_to_empty() {
        let (geometry, list) = two_quads();
        let resolver = Resolver::new(&geometry, &list);
        assert_eq!(resolver.resolve_record(RawRecord::EMPTY), PixelResolve::Empty);
    }

    #[test]
    fn test_record_resolves_to_triangle() {
        let (geometry, list) = two_quads();
        let resolver = Resolver::new(&geometry, &list);
        let PixelResolve::Hit(hit) = resolver.resolve_record(encode(1, 3)) else {
            panic!("expected a hit");
        };
        assert_eq!(hit.mesh_id, MeshId(1));
        assert_eq!(hit.token, VisibilityToken::new(1, 3));
        assert_eq!(hit.triangle, [5, 7, 6]);
    }

    #[test]
    fn test_mismatched_records_are_invalid() {
        let (geometry, list) = two_quads();
        let resolver = Resolver::new(&geometry, &list);
        // Unknown instance.
        assert!(matches!(resolver.resolve_record(encode(9, 0)), PixelResolve::Invalid(_)));
        // Instance 0 draws mesh 0, triangle 2 belongs to mesh 1.
        assert!(matches!(resolver.resolve_record(encode(0, 2)), PixelResolve::Invalid(_)));
        // One zero lane.
        assert!(matches!(
            resolver.resolve_record(RawRecord::new(1, 0)),
            PixelResolve::Invalid(_)
        ));
    }

    #[test]
    fn test_full_frame_round_trip() {
        let (geometry, list) = two_quads();
        let mut target = VisibilityTarget::new(8, 4);
        Rasterizer.draw_list(&mut target, &geometry, &list, |_| Some(Mat4::IDENTITY));

        let resolver = Resolver::new(&geometry, &list);
        let mut left_pixels = 0;
        let stats = resolver.resolve(&target, |x, _, hit| {
            if hit.mesh_id == MeshId(0) {
                assert!(x < 4);
                left_pixels += 1;
            } else {
                assert!(x >= 4);
            }
        });
        assert_eq!(stats.resolved_pixels, 32);
        assert_eq!(stats.empty_pixels, 0);
        assert_eq!(stats.invalid_pixels, 0);
        assert_eq!(left_pixels, 16);
    }

    /// 2x2 quad filling clip space, uv following position, normal +Z.
    fn textured_quad() -> (GlobalGeometry, DrawList) {
        let corner = |x: f32, y: f32| Vertex {
            position: Vec3::new(x, y, 0.0),
            normal: Vec3::Z,
            tex_coord: Vec2::new((x + 1.0) * 0.5, (y + 1.0) * 0.5),
            color: Vec4::new(1.0, 0.5, 0.0, 1.0),
            ..Vertex::default()
        };
        let vertices = [corner(-1.0, -1.0), corner(1.0, -1.0), corner(-1.0, 1.0), corner(1.0, 1.0)];
        let indices = [0u32, 1, 2, 1, 3, 2];
        let geometry =
            GlobalGeometry::build([(MeshId(0), vertices.as_slice(), indices.as_slice())]).unwrap();
        let mut list = DrawList::new();
        list.push_mesh(&geometry, 0, MeshId(0)).unwrap();
        (geometry, list)
    }

    #[test]
    fn test_resolve_interpolates_attributes() {
        let (geometry, list) = textured_quad();
        let mut target = VisibilityTarget::new(4, 4);
        let transforms = |_: u32| Some(Mat4::IDENTITY);
        Rasterizer.draw_list(&mut target, &geometry, &list, transforms);

        let mut samples = std::collections::HashMap::new();
        let stats = Resolver::new(&geometry, &list)
            .with_transforms(&transforms)
            .resolve(&target, |x, y, hit| {
                samples.insert((x, y), hit.surface.unwrap());
            });
        assert_eq!(stats.resolved_pixels, 16);

        // Pixel (0, 3) is the bottom-left centre at ndc (-0.75, -0.75).
        let bottom_left = samples[&(0, 3)];
        assert!((bottom_left.uv - Vec2::new(0.125, 0.125)).length() < 1e-5);
        let top_right = samples[&(3, 0)];
        assert!((top_right.uv - Vec2::new(0.875, 0.875)).length() < 1e-5);

        for sample in samples.values() {
            assert!((sample.normal - Vec3::Z).length() < 1e-5);
            assert!((sample.color - Vec4::new(1.0, 0.5, 0.0, 1.0)).length() < 1e-5);
            let b = sample.barycentrics;
            assert!((b.x + b.y + b.z - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_resolve_record_has_no_surface() {
        let (geometry, list) = textured_quad();
        let transforms = |_: u32| Some(Mat4::IDENTITY);
        let resolver = Resolver::new(&geometry, &list).with_transforms(&transforms);
        let PixelResolve::Hit(hit) = resolver.resolve_record(encode(0, 0)) else {
            panic!("expected a hit");
        };
        assert!(hit.surface.is_none());
    }

    #[test]
    fn test_missing_transform_leaves_surface_empty() {
        let (geometry, list) = textured_quad();
        let transforms = |_: u32| -> Option<Mat4> { None };
        let resolver = Resolver::new(&geometry, &list).with_transforms(&transforms);
        let PixelResolve::Hit(hit) = resolver.resolve_pixel(encode(0, 0), 0, 3, UVec2::new(4, 4)) else {
            panic!("expected a hit");
        };
        assert!(hit.surface.is_none());
    }

    #[test]
    fn test_barycentrics_are_perspective_correct() {
        let view_proj = Mat4::perspective_infinite_reverse_rh(60f32.to_radians(), 1.0, 0.1)
            * Mat4::look_at_rh(Vec3::new(0.0, 0.0, 3.0), Vec3::ZERO, Vec3::Y);
        // Slanted triangle: corners at very different depths.
        let corners = [
            Vec3::new(-1.0, -1.0, 1.5),
            Vec3::new(1.0, -1.0, -4.0),
            Vec3::new(0.0, 1.0, -1.0),
        ];
        let clip = corners.map(|p| view_proj * p.extend(1.0));
        let size = Vec2::new(256.0, 256.0);

        let expected = Vec3::new(0.2, 0.3, 0.5);
        let point = corners[0] * expected.x + corners[1] * expected.y + corners[2] * expected.z;
        let projected = view_proj * point.extend(1.0);
        let ndc = projected.xy() / projected.w;
        let pixel = Vec2::new((ndc.x * 0.5 + 0.5) * size.x, (0.5 - ndc.y * 0.5) * size.y);

        let weights = perspective_barycentrics(clip, pixel, size).unwrap();
        assert!((weights - expected).length() < 1e-3, "{weights:?}");
    }

    #[test]
    fn test_barycentrics_reject_corner_behind_camera() {
        let clip = [
            Vec4::new(0.0, 0.0, 0.1, 1.0),
            Vec4::new(1.0, 0.0, 0.1, 1.0),
            Vec4::new(0.0, 1.0, 0.1, -1.0),
        ];
        assert!(perspective_barycentrics(clip, Vec2::ZERO, Vec2::ONE).is_none());
    }

    #[test]
    fn test_partial_coverage_counts_background() {
        let (geometry, list) = two_quads();
        let mut target = VisibilityTarget::new(2, 1);
        target.write_fragment(0, 0, 1.0, encode(0, 1));
        let stats = Resolver::new(&geometry, &list).resolve(&target, |_, _, _| {});
        assert_eq!(
            stats,
            ResolveStats {
                resolved_pixels: 1,
                empty_pixels: 1,
                invalid_pixels: 0,
            }
        );
    }
}
