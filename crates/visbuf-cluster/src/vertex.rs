//! Mesh vertex and its packed storage-buffer form used by the resolve pass.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3, Vec4};

/// Source mesh vertex.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub tex_coord: Vec2,
    /// xyz = tangent, w = handedness.
    pub tangent: Vec4,
    pub color: Vec4,
}

impl Default for Vertex {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            normal: Vec3::Y,
            tex_coord: Vec2::ZERO,
            tangent: Vec4::new(1.0, 0.0, 0.0, 1.0),
            color: Vec4::ONE,
        }
    }
}

impl Vertex {
    /// Vertex at `position` with every other attribute defaulted.
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }
}

/// Storage-buffer vertex (64 bytes), four `vec4<f32>` so std430 needs no padding.
///
/// Layout:
///   - `[0..16]`  position.xyz, uv.x
///   - `[16..32]` normal.xyz, uv.y
///   - `[32..48]` tangent.xyzw
///   - `[48..64]` color.rgba
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PackedVertex {
    pub position_u: [f32; 4],
    pub normal_v: [f32; 4],
    pub tangent: [f32; 4],
    pub color: [f32; 4],
}

static_assertions::assert_eq_size!(PackedVertex, [u8; 64]);

impl PackedVertex {
    pub fn position(&self) -> Vec3 {
        Vec3::new(self.position_u[0], self.position_u[1], self.position_u[2])
    }

    pub fn tex_coord(&self) -> Vec2 {
        Vec2::new(self.position_u[3], self.normal_v[3])
    }

    pub fn normal(&self) -> Vec3 {
        Vec3::new(self.normal_v[0], self.normal_v[1], self.normal_v[2])
    }
}

impl From<&Vertex> for PackedVertex {
    fn from(v: &Vertex) -> Self {
        Self {
            position_u: v.position.extend(v.tex_coord.x).to_array(),
            normal_v: v.normal.extend(v.tex_coord.y).to_array(),
            tangent: v.tangent.to_array(),
            color: v.color.to_array(),
        }
    }
}
