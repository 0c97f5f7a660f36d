//! Procedural scene used by the `demo` command.

use std::f32::consts::{PI, TAU};

use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
use visbuf_cluster::{
    ClusterBuilder, ClusterCuller, CullStats, DrawList, GeometryError, GlobalGeometry, MeshId,
    Vertex,
};

pub const GROUND: MeshId = MeshId(0);
pub const SPHERE: MeshId = MeshId(1);
pub const CUBE: MeshId = MeshId(2);

/// World-space camera position of the demo view.
pub const EYE: Vec3 = Vec3::new(0.0, 5.0, 9.0);
const LOOK_AT: Vec3 = Vec3::new(0.0, 0.5, 0.0);

/// Geometry, draws and per-instance model matrices ready to rasterize.
pub struct Scene {
    pub geometry: GlobalGeometry,
    pub draws: DrawList,
    /// Indexed by instance id.
    pub models: Vec<Mat4>,
    /// Mesh drawn by each instance, indexed by instance id.
    pub meshes: Vec<MeshId>,
}

impl Scene {
    pub fn build(cluster_size: u32) -> Result<Self, GeometryError> {
        let builder = ClusterBuilder::new().with_cluster_size(cluster_size);
        let (gv, gi) = grid(24, 12.0);
        let (sv, si) = uv_sphere(16, 24);
        let (cv, ci) = cube();

        let clustered = [
            builder.build(&gv, &gi, GROUND),
            builder.build(&sv, &si, SPHERE),
            builder.build(&cv, &ci, CUBE),
        ]
        .into_iter()
        .zip([GROUND, SPHERE, CUBE])
        .map(|(result, mesh)| result.map_err(|source| GeometryError::Cluster { mesh, source }))
        .collect::<Result<Vec<_>, _>>()?;

        let geometry = GlobalGeometry::build_from_clusters(clustered)?;

        let mut models = vec![Mat4::IDENTITY];
        for i in 0..3 {
            let x = (i as f32 - 1.0) * 3.0;
            models.push(Mat4::from_translation(Vec3::new(x, 1.0, 0.0)));
        }
        for i in 0..2 {
            let x = (i as f32 - 0.5) * 3.0;
            models.push(Mat4::from_scale_rotation_translation(
                Vec3::splat(1.2),
                Quat::from_rotation_y(0.6 + i as f32),
                Vec3::new(x, 0.6, 2.5),
            ));
        }

        let meshes = vec![GROUND, SPHERE, SPHERE, SPHERE, CUBE, CUBE];

        let mut draws = DrawList::new();
        for (instance, &mesh) in (0u32..).zip(&meshes) {
            draws.push_clustered(&geometry, instance, mesh)?;
        }

        Ok(Self {
            geometry,
            draws,
            models,
            meshes,
        })
    }

    /// Rebuilds the draw list keeping only clusters visible from `eye`.
    pub fn cull_draws(&mut self, view_proj: Mat4, eye: Vec3) -> Result<CullStats, GeometryError> {
        let mut draws = DrawList::new();
        let mut stats = CullStats::default();
        for (instance, (&mesh, &model)) in (0u32..).zip(self.meshes.iter().zip(&self.models)) {
            let culler = ClusterCuller::for_instance(view_proj, model, eye);
            stats += draws.push_clustered_culled(&self.geometry, instance, mesh, &culler)?;
        }
        self.draws = draws;
        Ok(stats)
    }

    /// Reverse-Z camera looking at the origin from above and behind.
    pub fn view_proj(width: u32, height: u32) -> Mat4 {
        let aspect = width as f32 / height.max(1) as f32;
        let proj = Mat4::perspective_infinite_reverse_rh(60f32.to_radians(), aspect, 0.1);
        let view = Mat4::look_at_rh(EYE, LOOK_AT, Vec3::Y);
        proj * view
    }

    pub fn instance_transform(&self, view_proj: Mat4, instance_id: u32) -> Option<Mat4> {
        self.models
            .get(instance_id as usize)
            .map(|model| view_proj * *model)
    }
}

/// `n x n` quads on the XZ plane centred at the origin.
pub fn grid(n: u32, size: f32) -> (Vec<Vertex>, Vec<u32>) {
    let step = size / n as f32;
    let half = size * 0.5;
    let mut vertices = Vec::with_capacity(((n + 1) * (n + 1)) as usize);
    for z in 0..=n {
        for x in 0..=n {
            let mut v = Vertex::at(Vec3::new(x as f32 * step - half, 0.0, z as f32 * step - half));
            v.tex_coord = Vec2::new(x as f32 / n as f32, z as f32 / n as f32);
            vertices.push(v);
        }
    }

    let mut indices = Vec::with_capacity((n * n * 6) as usize);
    for z in 0..n {
        for x in 0..n {
            let i = z * (n + 1) + x;
            let below = i + n + 1;
            indices.extend_from_slice(&[i, below, i + 1, i + 1, below, below + 1]);
        }
    }
    (vertices, indices)
}

/// Unit UV sphere.
pub fn uv_sphere(rings: u32, segments: u32) -> (Vec<Vertex>, Vec<u32>) {
    let mut vertices = Vec::with_capacity(((rings + 1) * (segments + 1)) as usize);
    for r in 0..=rings {
        let phi = PI * r as f32 / rings as f32;
        for s in 0..=segments {
            let theta = TAU * s as f32 / segments as f32;
            let n = Vec3::new(phi.sin() * theta.cos(), phi.cos(), phi.sin() * theta.sin());
            vertices.push(Vertex {
                position: n,
                normal: n,
                tex_coord: Vec2::new(s as f32 / segments as f32, r as f32 / rings as f32),
                ..Vertex::default()
            });
        }
    }

    let mut indices = Vec::with_capacity((rings * segments * 6) as usize);
    for r in 0..rings {
        for s in 0..segments {
            let a = r * (segments + 1) + s;
            let b = a + segments + 1;
            indices.extend_from_slice(&[a, a + 1, b, a + 1, b + 1, b]);
        }
    }
    (vertices, indices)
}

/// Unit cube with per-face vertices.
pub fn cube() -> (Vec<Vertex>, Vec<u32>) {
    let faces = [Vec3::X, Vec3::NEG_X, Vec3::Y, Vec3::NEG_Y, Vec3::Z, Vec3::NEG_Z];
    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for normal in faces {
        let tangent = normal.any_orthonormal_vector();
        let bitangent = normal.cross(tangent);
        let base = vertices.len() as u32;
        for (u, v) in [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)] {
            vertices.push(Vertex {
                position: normal * 0.5 + tangent * u + bitangent * v,
                normal,
                tangent: tangent.extend(1.0),
                color: Vec4::ONE,
                ..Vertex::default()
            });
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    (vertices, indices)
}
