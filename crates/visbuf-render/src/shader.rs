//! WGSL side of the visibility contract.
//!
//! The raster shader pulls vertices from the global tables: each indirect
//! draw is issued with `first_instance` = its index into the draw-info
//! buffer and `vertex_count` = `triangle_count * 3`, so `vertex_index / 3`
//! is the draw's local primitive index.

/// Device features the raster pass needs. `first_instance` carries the
/// draw-info index, so indirect draws must honour a nonzero first instance;
/// without this feature wgpu ignores it and every draw reads entry 0.
pub const VISBUF_RASTER_FEATURES: wgpu::Features = wgpu::Features::INDIRECT_FIRST_INSTANCE;

/// Raster features an adapter lacks; empty when the pass can run.
pub fn missing_raster_features(available: wgpu::Features) -> wgpu::Features {
    VISBUF_RASTER_FEATURES - available
}

/// Cluster raster pass writing biased `(instance, triangle)` ids.
pub const VISBUF_RASTER_SHADER: &str = r#"
struct CameraUniform {
    view_proj: mat4x4<f32>,
};

struct DrawClusterInfo {
    instance_id: u32,
    triangle_offset: u32,
};

struct PackedVertex {
    position_u: vec4<f32>,
    normal_v: vec4<f32>,
    tangent: vec4<f32>,
    color: vec4<f32>,
};

@group(0) @binding(0) var<uniform> camera: CameraUniform;
@group(0) @binding(1) var<storage, read> draws: array<DrawClusterInfo>;
@group(0) @binding(2) var<storage, read> instance_transforms: array<mat4x4<f32>>;
@group(0) @binding(3) var<storage, read> vertices: array<PackedVertex>;
@group(0) @binding(4) var<storage, read> indices: array<u32>;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) @interpolate(flat) instance_id: u32,
    @location(1) @interpolate(flat) triangle_id: u32,
};

@vertex
fn vs_main(
    @builtin(vertex_index) vertex_index: u32,
    @builtin(instance_index) draw_index: u32,
) -> VertexOutput {
    let draw = draws[draw_index];
    let local_primitive = vertex_index / 3u;
    let global_triangle = local_primitive + draw.triangle_offset;
    let index = indices[global_triangle * 3u + vertex_index % 3u];
    let position = vertices[index].position_u.xyz;
    let model = instance_transforms[draw.instance_id];

    var out: VertexOutput;
    out.clip_position = camera.view_proj * model * vec4<f32>(position, 1.0);
    out.instance_id = draw.instance_id;
    out.triangle_id = global_triangle;
    return out;
}

// +1 bias keeps (0, 0) free as the "no geometry" clear value.
fn encode_visibility(instance_id: u32, triangle_id: u32) -> vec2<u32> {
    return vec2<u32>(instance_id + 1u, triangle_id + 1u);
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec2<u32> {
    return encode_visibility(in.instance_id, in.triangle_id);
}
"#;

/// Decode helpers for passes that read the visibility target.
pub const VISBUF_DECODE_WGSL: &str = r#"
@group(0) @binding(0) var visibility_target: texture_2d<u32>;

struct VisibilityHit {
    valid: bool,
    instance_id: u32,
    triangle_id: u32,
};

fn decode_visibility(record: vec2<u32>) -> VisibilityHit {
    var hit: VisibilityHit;
    hit.valid = record.x != 0u && record.y != 0u;
    hit.instance_id = record.x - 1u;
    hit.triangle_id = record.y - 1u;
    return hit;
}

fn load_visibility(coord: vec2<i32>) -> VisibilityHit {
    return decode_visibility(textureLoad(visibility_target, coord, 0).xy);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(source: &str) -> naga::Module {
        let module = naga::front::wgsl::parse_str(source)
            .unwrap_or_else(|e| panic!("WGSL parse failed: {}", e.emit_to_string(source)));
        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::default(),
        )
        .validate(&module)
        .unwrap_or_else(|e| panic!("WGSL validation failed: {e:?}"));
        module
    }

    #[test]
    fn test_raster_shader_is_valid() {
        let module = validate(VISBUF_RASTER_SHADER);
        let entry_points: Vec<&str> = module.entry_points.iter().map(|e| e.name.as_str()).collect();
        assert!(entry_points.contains(&"vs_main"));
        assert!(entry_points.contains(&"fs_main"));
    }

    #[test]
    fn test_decode_helpers_are_valid() {
        validate(VISBUF_DECODE_WGSL);
    }

    #[test]
    fn test_raster_shader_applies_bias() {
        assert!(VISBUF_RASTER_SHADER.contains("instance_id + 1u, triangle_id + 1u"));
        assert!(VISBUF_RASTER_SHADER.contains("local_primitive + draw.triangle_offset"));
    }

    #[test]
    fn test_raster_features_request_first_instance() {
        assert!(VISBUF_RASTER_FEATURES.contains(wgpu::Features::INDIRECT_FIRST_INSTANCE));
        assert!(VISBUF_RASTER_SHADER.contains("@builtin(instance_index)"));
    }

    #[test]
    fn test_missing_raster_features() {
        assert_eq!(
            missing_raster_features(wgpu::Features::empty()),
            wgpu::Features::INDIRECT_FIRST_INSTANCE
        );
        let available = wgpu::Features::INDIRECT_FIRST_INSTANCE | wgpu::Features::DEPTH_CLIP_CONTROL;
        assert!(missing_raster_features(available).is_empty());
    }
}
