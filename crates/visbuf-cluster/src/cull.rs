//! Per-cluster visibility tests run before draws are emitted: frustum planes
//! against the cluster's bounds, and the normal cone against the camera.
//!
//! Everything is evaluated in the mesh's object space. Planes come from the
//! instance's `clip_from_object` matrix and the camera position is moved
//! into object space, so arbitrary instance transforms need no bound
//! re-fitting.

use glam::{Mat4, Vec3, Vec4};

use crate::cluster::MeshCluster;

const LEFT: usize = 0;
const RIGHT: usize = 1;
const BOTTOM: usize = 2;
const TOP: usize = 3;
const NEAR: usize = 4;
const FAR: usize = 5;

/// Six inward-facing planes `(n, d)` with `n·p + d >= 0` inside.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frustum {
    planes: [Vec4; 6],
}

impl Frustum {
    /// Extract planes from a reverse-Z clip matrix (Griggs-Hartmann).
    ///
    /// Reverse-Z keeps `0 <= z <= w`, so the near plane is `w - z` and the far
    /// plane is `z`. An infinite far plane degenerates to a constant
    /// positive row and never rejects anything.
    pub fn from_clip_matrix(clip: &Mat4) -> Self {
        let rows = [clip.row(0), clip.row(1), clip.row(2), clip.row(3)];

        let mut planes = [Vec4::ZERO; 6];
        planes[LEFT] = rows[3] + rows[0];
        planes[RIGHT] = rows[3] - rows[0];
        planes[BOTTOM] = rows[3] + rows[1];
        planes[TOP] = rows[3] - rows[1];
        planes[NEAR] = rows[3] - rows[2];
        planes[FAR] = rows[2];

        for plane in &mut planes {
            let len = plane.truncate().length();
            if len > 0.0 {
                *plane /= len;
            }
        }
        Self { planes }
    }

    /// p-vertex test: conservative, never rejects a box that touches the frustum.
    pub fn intersects_aabb(&self, min: Vec3, max: Vec3) -> bool {
        self.planes.iter().all(|plane| {
            let n = plane.truncate();
            let p = Vec3::select(n.cmpge(Vec3::ZERO), max, min);
            n.dot(p) + plane.w >= 0.0
        })
    }

    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.truncate().dot(center) + plane.w >= -radius)
    }
}

/// Why a cluster was or was not kept.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClusterVisibility {
    Visible,
    OutsideFrustum,
    /// Every face points away from the camera.
    Backfacing,
}

/// Counters from culling one instance's clusters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CullStats {
    pub visible: u32,
    pub frustum_culled: u32,
    pub backface_culled: u32,
}

impl CullStats {
    pub fn record(&mut self, visibility: ClusterVisibility) {
        match visibility {
            ClusterVisibility::Visible => self.visible += 1,
            ClusterVisibility::OutsideFrustum => self.frustum_culled += 1,
            ClusterVisibility::Backfacing => self.backface_culled += 1,
        }
    }

    pub fn culled(&self) -> u32 {
        self.frustum_culled + self.backface_culled
    }
}

impl std::ops::AddAssign for CullStats {
    fn add_assign(&mut self, rhs: Self) {
        self.visible += rhs.visible;
        self.frustum_culled += rhs.frustum_culled;
        self.backface_culled += rhs.backface_culled;
    }
}

/// Culls the clusters of one instance.
#[derive(Clone, Copy, Debug)]
pub struct ClusterCuller {
    frustum: Frustum,
    /// Camera position in the instance's object space.
    camera: Vec3,
}

impl ClusterCuller {
    /// `clip_from_object` is `view_proj * model`; `camera` is already in
    /// object space.
    pub fn new(clip_from_object: Mat4, camera: Vec3) -> Self {
        Self {
            frustum: Frustum::from_clip_matrix(&clip_from_object),
            camera,
        }
    }

    /// Culler for an instance placed with `model`, seen from `camera_world`.
    pub fn for_instance(view_proj: Mat4, model: Mat4, camera_world: Vec3) -> Self {
        Self::new(
            view_proj * model,
            model.inverse().transform_point3(camera_world),
        )
    }

    pub fn classify(&self, cluster: &MeshCluster) -> ClusterVisibility {
        let center = cluster.bounding_sphere.truncate();
        let radius = cluster.bounding_sphere.w;
        if !self.frustum.intersects_sphere(center, radius)
            || !self.frustum.intersects_aabb(cluster.aabb_min, cluster.aabb_max)
        {
            return ClusterVisibility::OutsideFrustum;
        }
        if self.is_backfacing(cluster) {
            return ClusterVisibility::Backfacing;
        }
        ClusterVisibility::Visible
    }

    pub fn is_visible(&self, cluster: &MeshCluster) -> bool {
        self.classify(cluster) == ClusterVisibility::Visible
    }

    /// True when every face normal inside the cone points away from the
    /// camera for every point of the bounding sphere.
    ///
    /// With `phi` the angle between the axis and the view vector `d` and
    /// `theta` the cone half-angle, the most camera-facing normal has
    /// `n·d = |d| cos(phi + theta)`; the cluster is backfacing when that
    /// still exceeds the sphere radius.
    pub fn is_backfacing(&self, cluster: &MeshCluster) -> bool {
        let cos_theta = cluster.cone_cutoff;
        // Cones of 90 degrees or wider (including the -1 sentinel) always
        // contain a camera-facing normal.
        if cos_theta <= 0.0 {
            return false;
        }
        let center = cluster.bounding_sphere.truncate();
        let radius = cluster.bounding_sphere.w;
        let d = center - self.camera;
        let dist = d.length();
        if dist <= radius {
            return false;
        }

        let cos_phi = (cluster.cone_axis.dot(d) / dist).clamp(-1.0, 1.0);
        let sin_phi = (1.0 - cos_phi * cos_phi).max(0.0).sqrt();
        let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
        let cos_sum = cos_phi * cos_theta - sin_phi * sin_theta;
        dist * cos_sum > radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ClusterBuilder;
    use crate::geometry::MeshId;
    use crate::vertex::Vertex;

    /// Unit quad in the XY plane at `z`, facing +Z.
    fn facing_quad(z: f32) -> MeshCluster {
        let vertices = [
            Vertex::at(Vec3::new(-0.5, -0.5, z)),
            Vertex::at(Vec3::new(0.5, -0.5, z)),
            Vertex::at(Vec3::new(-0.5, 0.5, z)),
            Vertex::at(Vec3::new(0.5, 0.5, z)),
        ];
        let mesh = ClusterBuilder::new()
            .build(&vertices, &[0, 1, 2, 1, 3, 2], MeshId(0))
            .unwrap();
        mesh.clusters[0]
    }

    fn view_proj(eye: Vec3, target: Vec3) -> Mat4 {
        let proj = Mat4::perspective_infinite_reverse_rh(60f32.to_radians(), 1.0, 0.1);
        proj * Mat4::look_at_rh(eye, target, Vec3::Y)
    }

    fn culler(eye: Vec3, target: Vec3) -> ClusterCuller {
        ClusterCuller::new(view_proj(eye, target), eye)
    }

    #[test]
    fn test_front_facing_cluster_in_view_is_visible() {
        let cluster = facing_quad(0.0);
        assert!((cluster.cone_axis - Vec3::Z).length() < 1e-5);
        let c = culler(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
        assert_eq!(c.classify(&cluster), ClusterVisibility::Visible);
    }

    #[test]
    fn test_cluster_behind_camera_is_outside_frustum() {
        let c = culler(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
        assert_eq!(c.classify(&facing_quad(10.0)), ClusterVisibility::OutsideFrustum);
    }

    #[test]
    fn test_cluster_off_to_the_side_is_outside_frustum() {
        let c = culler(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
        let mut cluster = facing_quad(0.0);
        let shift = Vec3::new(100.0, 0.0, 0.0);
        cluster.aabb_min += shift;
        cluster.aabb_max += shift;
        cluster.bounding_sphere += shift.extend(0.0);
        assert_eq!(c.classify(&cluster), ClusterVisibility::OutsideFrustum);
    }

    #[test]
    fn test_cluster_facing_away_is_backfacing() {
        // Camera on the -Z side looks at the back of the quad.
        let c = culler(Vec3::new(0.0, 0.0, -5.0), Vec3::ZERO);
        assert_eq!(c.classify(&facing_quad(0.0)), ClusterVisibility::Backfacing);
    }

    #[test]
    fn test_degenerate_cone_is_never_backface_culled() {
        let mut cluster = facing_quad(0.0);
        cluster.cone_axis = Vec3::Y;
        cluster.cone_cutoff = -1.0;
        let c = culler(Vec3::new(0.0, 0.0, -5.0), Vec3::ZERO);
        assert!(!c.is_backfacing(&cluster));
        assert_eq!(c.classify(&cluster), ClusterVisibility::Visible);
    }

    #[test]
    fn test_grazing_view_is_kept() {
        // Camera in the quad's plane: edge-on faces are not backfacing.
        let c = culler(Vec3::new(5.0, 0.0, 0.0), Vec3::ZERO);
        assert!(!c.is_backfacing(&facing_quad(0.0)));
    }

    #[test]
    fn test_instance_transform_moves_camera_into_object_space() {
        // Quad rotated half a turn about Y now faces -Z.
        let model = Mat4::from_rotation_y(std::f32::consts::PI);
        let eye = Vec3::new(0.0, 0.0, 5.0);
        let c = ClusterCuller::for_instance(view_proj(eye, Vec3::ZERO), model, eye);
        assert_eq!(c.classify(&facing_quad(0.0)), ClusterVisibility::Backfacing);

        let eye = Vec3::new(0.0, 0.0, -5.0);
        let c = ClusterCuller::for_instance(view_proj(eye, Vec3::ZERO), model, eye);
        assert_eq!(c.classify(&facing_quad(0.0)), ClusterVisibility::Visible);
    }

    #[test]
    fn test_infinite_far_plane_keeps_distant_clusters() {
        let frustum = Frustum::from_clip_matrix(&view_proj(Vec3::ZERO, Vec3::NEG_Z));
        assert!(frustum.intersects_sphere(Vec3::new(0.0, 0.0, -1.0e6), 1.0));
        assert!(!frustum.intersects_sphere(Vec3::new(0.0, 0.0, 1.0e6), 1.0));
    }

    #[test]
    fn test_cull_stats_accumulate() {
        let mut stats = CullStats::default();
        stats.record(ClusterVisibility::Visible);
        stats.record(ClusterVisibility::Backfacing);
        stats.record(ClusterVisibility::OutsideFrustum);
        let mut total = CullStats::default();
        total += stats;
        total += stats;
        assert_eq!(total.visible, 2);
        assert_eq!(total.culled(), 4);
    }
}
