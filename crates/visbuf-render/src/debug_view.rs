//! False-colour views of a visibility target for debugging.

use visbuf_cluster::GlobalGeometry;
use visbuf_codec::{RawRecord, decode};

use crate::target::VisibilityTarget;

/// Colour used for background pixels.
pub const BACKGROUND: [u8; 4] = [0, 0, 0, 255];

/// What a debug view colours by.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum DebugMode {
    #[default]
    Instance = 0,
    Triangle = 1,
    /// Instance and triangle hashed together.
    Mixed = 2,
    /// Cluster that rasterized the triangle (needs cluster data).
    Cluster = 3,
    ClusterInstance = 4,
    /// Reverse-Z depth as greyscale, brighter is nearer.
    Depth = 5,
}

impl DebugMode {
    pub const ALL: [DebugMode; 6] = [
        DebugMode::Instance,
        DebugMode::Triangle,
        DebugMode::Mixed,
        DebugMode::Cluster,
        DebugMode::ClusterInstance,
        DebugMode::Depth,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DebugMode::Instance => "instance",
            DebugMode::Triangle => "triangle",
            DebugMode::Mixed => "mixed",
            DebugMode::Cluster => "cluster",
            DebugMode::ClusterInstance => "cluster-instance",
            DebugMode::Depth => "depth",
        }
    }
}

impl TryFrom<u32> for DebugMode {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::ALL.get(value as usize).copied().ok_or(value)
    }
}

impl std::str::FromStr for DebugMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| format!("unknown debug mode '{s}'"))
    }
}

/// PCG-style integer hash.
fn hash(mut v: u32) -> u32 {
    v = v.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
    let word = ((v >> ((v >> 28) + 4)) ^ v).wrapping_mul(277_803_737);
    (word >> 22) ^ word
}

fn hash_color(key: u32) -> [u8; 4] {
    let h = hash(key);
    // Keep every channel above 48 so ids never look like background.
    let channel = |shift: u32| 48 + ((h >> shift) & 0xFF) as u8 % 208;
    [channel(0), channel(8), channel(16), 255]
}

fn combine(a: u32, b: u32) -> u32 {
    hash(a) ^ b.wrapping_mul(0x9E37_79B9)
}

/// Colour for one pixel. `geometry` is only needed by the cluster modes;
/// without it (or for meshes without cluster data) they fall back to the
/// triangle colour.
pub fn debug_color(
    mode: DebugMode,
    record: RawRecord,
    depth: f32,
    geometry: Option<&GlobalGeometry>,
) -> [u8; 4] {
    let Some(token) = decode(record) else {
        return BACKGROUND;
    };
    let cluster_key = || {
        geometry
            .and_then(|g| g.cluster_for_triangle(token.triangle_id))
            .map(|(mesh, cluster)| combine(mesh.0, cluster))
    };

    match mode {
        DebugMode::Instance => hash_color(token.instance_id),
        DebugMode::Triangle => hash_color(token.triangle_id),
        DebugMode::Mixed => hash_color(combine(token.instance_id, token.triangle_id)),
        DebugMode::Cluster => {
            hash_color(cluster_key().unwrap_or(token.triangle_id))
        }
        DebugMode::ClusterInstance => {
            let key = cluster_key().unwrap_or(token.triangle_id);
            hash_color(combine(key, token.instance_id))
        }
        DebugMode::Depth => {
            let v = (depth.clamp(0.0, 1.0) * 255.0).round() as u8;
            [v, v, v, 255]
        }
    }
}

/// Render the whole target to tightly packed RGBA8 rows.
pub fn debug_image(
    target: &VisibilityTarget,
    mode: DebugMode,
    geometry: Option<&GlobalGeometry>,
) -> Vec<u8> {
    target
        .records()
        .iter()
        .zip(target.depths())
        .flat_map(|(record, depth)| debug_color(mode, *record, *depth, geometry))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use visbuf_codec::encode;

    #[test]
    fn test_mode_from_u32() {
        assert_eq!(DebugMode::try_from(0), Ok(DebugMode::Instance));
        assert_eq!(DebugMode::try_from(5), Ok(DebugMode::Depth));
        assert_eq!(DebugMode::try_from(6), Err(6));
        assert_eq!(DebugMode::Cluster as u32, 3);
    }

    #[test]
    fn test_mode_from_name() {
        assert_eq!("mixed".parse::<DebugMode>(), Ok(DebugMode::Mixed));
        assert!("bogus".parse::<DebugMode>().is_err());
        for mode in DebugMode::ALL {
            assert_eq!(mode.name().parse::<DebugMode>(), Ok(mode));
        }
    }

    #[test]
    fn test_background_is_black_in_every_mode() {
        for mode in DebugMode::ALL {
            assert_eq!(debug_color(mode, RawRecord::EMPTY, 0.7, None), BACKGROUND);
        }
    }

    #[test]
    fn test_hit_never_looks_like_background() {
        for id in 0..256 {
            let color = debug_color(DebugMode::Instance, encode(id, 0), 0.0, None);
            assert_ne!(color, BACKGROUND);
            assert!(color[..3].iter().all(|&c| c >= 48));
        }
    }

    #[test]
    fn test_colors_are_stable_per_instance() {
        let a = debug_color(DebugMode::Instance, encode(3, 10), 0.0, None);
        let b = debug_color(DebugMode::Instance, encode(3, 99), 0.0, None);
        let c = debug_color(DebugMode::Instance, encode(4, 10), 0.0, None);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_cluster_mode_falls_back_to_triangle() {
        let record = encode(1, 17);
        assert_eq!(
            debug_color(DebugMode::Cluster, record, 0.0, None),
            debug_color(DebugMode::Triangle, record, 0.0, None)
        );
    }

    #[test]
    fn test_depth_mode_is_greyscale() {
        assert_eq!(
            debug_color(DebugMode::Depth, encode(0, 0), 1.0, None),
            [255, 255, 255, 255]
        );
    }

    #[test]
    fn test_debug_image_size() {
        let mut target = VisibilityTarget::new(3, 2);
        target.write_fragment(0, 0, 1.0, encode(0, 0));
        let image = debug_image(&target, DebugMode::Triangle, None);
        assert_eq!(image.len(), 3 * 2 * 4);
        assert_eq!(&image[4..8], &BACKGROUND);
    }
}
