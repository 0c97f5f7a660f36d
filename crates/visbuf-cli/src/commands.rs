//! Subcommand implementations.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use tracing::{info, warn};
use visbuf_cluster::GlobalGeometry;
use visbuf_codec::{
    CodecError, IdKind, MAX_VALID_ID, RawRecord, VisibilityToken, decode, encode_fragment,
};
use visbuf_config::{Config, ConfigError};
use visbuf_render::{
    DebugMode, Rasterizer, Resolver, VisibilityTarget, debug_image, read_dump, write_dump,
};

use crate::error::CliError;
use crate::scene::{EYE, Scene};

pub fn run_encode(instance_id: u32, local_primitive_index: u32, triangle_offset: u32) -> Result<(), CliError> {
    let global = u64::from(local_primitive_index) + u64::from(triangle_offset);
    let global = u32::try_from(global)
        .ok()
        .filter(|&id| id <= MAX_VALID_ID)
        .ok_or(CodecError::IdOverflow {
            kind: IdKind::Triangle,
            value: global,
            max: MAX_VALID_ID,
        })?;
    VisibilityToken::new_checked(instance_id, global)?;

    let record = encode_fragment(instance_id, local_primitive_index, triangle_offset);
    println!(
        "instance {instance_id}, triangle {global} -> ({}, {}) = {:#018x}",
        record.instance,
        record.triangle,
        record.to_u64()
    );
    Ok(())
}

pub fn run_decode(instance: u32, triangle: u32) {
    let record = RawRecord::new(instance, triangle);
    match decode(record) {
        Some(token) => println!(
            "({instance}, {triangle}) -> instance {}, triangle {}",
            token.instance_id, token.triangle_id
        ),
        None if record.is_empty() => println!("({instance}, {triangle}) -> background"),
        None => println!("({instance}, {triangle}) -> invalid record"),
    }
}

fn view_mode(config: &Config) -> Result<DebugMode, CliError> {
    config.validate()?;
    let mode = config
        .debug
        .view_mode
        .parse()
        .map_err(|reason| ConfigError::Invalid {
            field: "debug.view_mode",
            reason,
        })?;
    Ok(mode)
}

pub fn run_demo(config: &Config, all_views: bool) -> Result<(), CliError> {
    let mode = view_mode(config)?;
    let mut target = VisibilityTarget::new(config.target.width, config.target.height);

    let mut scene = Scene::build(config.cluster.triangles_per_cluster)?;
    info!(
        "Scene: {} meshes, {} triangles, {} instances",
        scene.geometry.mesh_count(),
        scene.geometry.triangle_count(),
        scene.draws.instance_count()
    );

    let view_proj = Scene::view_proj(target.width(), target.height());
    let culled = scene.cull_draws(view_proj, EYE)?;
    info!(
        "Clusters: {} drawn, {} outside the frustum, {} backfacing",
        culled.visible, culled.frustum_culled, culled.backface_culled
    );

    let transforms = |instance: u32| scene.instance_transform(view_proj, instance);
    let stats = Rasterizer.draw_list(&mut target, &scene.geometry, &scene.draws, transforms);
    info!(
        "Rasterized {} triangles ({} culled), {} fragments, {} covered pixels",
        stats.triangles,
        stats.culled_triangles,
        stats.fragments_written,
        target.coverage()
    );

    let resolver = Resolver::new(&scene.geometry, &scene.draws).with_transforms(&transforms);
    let mut per_instance = vec![0u64; scene.models.len()];
    let mut normals = vec![0u8; target.records().len() * 4];
    let width = target.width() as usize;
    let resolved = resolver.resolve(&target, |x, y, hit| {
        if let Some(count) = per_instance.get_mut(hit.token.instance_id as usize) {
            *count += 1;
        }
        if let Some(surface) = &hit.surface {
            let i = (y as usize * width + x as usize) * 4;
            let n = surface.normal * 0.5 + 0.5;
            normals[i..i + 4].copy_from_slice(&[
                (n.x * 255.0) as u8,
                (n.y * 255.0) as u8,
                (n.z * 255.0) as u8,
                255,
            ]);
        }
    });
    info!(
        "Resolved {} pixels, {} background, {} invalid",
        resolved.resolved_pixels, resolved.empty_pixels, resolved.invalid_pixels
    );
    for (instance, pixels) in per_instance.iter().enumerate() {
        info!("  instance {instance}: {pixels} pixels");
    }

    let out_dir = &config.debug.output_dir;
    std::fs::create_dir_all(out_dir)?;

    let views = if all_views { DebugMode::ALL.to_vec() } else { vec![mode] };
    for view in views {
        let path = out_dir.join(format!("demo-{}.png", view.name()));
        write_png(&path, &target, view, Some(&scene.geometry))?;
        info!("Wrote {}", path.display());
    }

    // Object-space normals of the resolved surfaces.
    let normals_path = out_dir.join("demo-normals.png");
    write_rgba(&normals_path, target.width(), target.height(), &normals)?;
    info!("Wrote {}", normals_path.display());

    let dump_path = out_dir.join("demo.vbuf");
    write_dump(BufWriter::new(File::create(&dump_path)?), &target)?;
    info!("Wrote {}", dump_path.display());
    Ok(())
}

pub fn run_inspect(config: &Config, dump: &Path, png: Option<&Path>) -> Result<(), CliError> {
    let target = read_dump(BufReader::new(File::open(dump)?))?;

    let mut instances = BTreeSet::new();
    let mut triangles = BTreeSet::new();
    let mut invalid = 0usize;
    for (x, y, record) in target.pixels() {
        if record.is_empty() {
            continue;
        }
        match decode(record) {
            Some(token) => {
                instances.insert(token.instance_id);
                triangles.insert(token.triangle_id);
            }
            None => {
                if invalid == 0 {
                    warn!("Invalid record {:?} at ({x}, {y})", record.lanes());
                }
                invalid += 1;
            }
        }
    }

    let pixels = target.records().len();
    println!("{}: {}x{}", dump.display(), target.width(), target.height());
    println!(
        "  coverage: {} / {} pixels ({:.1}%)",
        target.coverage(),
        pixels,
        100.0 * target.coverage() as f64 / pixels.max(1) as f64
    );
    println!("  distinct instances: {}", instances.len());
    println!("  distinct triangles: {}", triangles.len());
    if let (Some(first), Some(last)) = (triangles.first(), triangles.last()) {
        println!("  triangle id range: {first}..={last}");
    }
    println!("  invalid records: {invalid}");

    if let Some(path) = png {
        // A dump carries no geometry, so cluster views fall back to triangles.
        write_png(path, &target, view_mode(config)?, None)?;
        info!("Wrote {}", path.display());
    }
    Ok(())
}

fn write_png(
    path: &Path,
    target: &VisibilityTarget,
    mode: DebugMode,
    geometry: Option<&GlobalGeometry>,
) -> Result<(), CliError> {
    let pixels = debug_image(target, mode, geometry);
    write_rgba(path, target.width(), target.height(), &pixels)
}

fn write_rgba(path: &Path, width: u32, height: u32, pixels: &[u8]) -> Result<(), CliError> {
    let mut encoder = png::Encoder::new(BufWriter::new(File::create(path)?), width, height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(pixels)?;
    writer.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use visbuf_config::VIEW_MODES;

    fn test_config(dir: &Path) -> Config {
        let mut config = Config::default();
        config.target.width = 96;
        config.target.height = 64;
        config.debug.output_dir = dir.to_path_buf();
        config
    }

    #[test]
    fn test_encode_rejects_wrapping_triangle_id() {
        assert!(run_encode(41, 7, 1000).is_ok());
        assert!(matches!(
            run_encode(0, 1, MAX_VALID_ID),
            Err(CliError::Codec(CodecError::IdOverflow {
                kind: IdKind::Triangle,
                ..
            }))
        ));
        assert!(matches!(
            run_encode(u32::MAX, 0, 0),
            Err(CliError::Codec(CodecError::IdOverflow {
                kind: IdKind::Instance,
                ..
            }))
        ));
    }

    #[test]
    fn test_unknown_view_mode() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.debug.view_mode = "normals".to_string();
        assert!(matches!(
            run_demo(&config, false),
            Err(CliError::Config(ConfigError::Invalid {
                field: "debug.view_mode",
                ..
            }))
        ));
    }

    #[test]
    fn test_config_view_modes_match_debug_modes() {
        let names: Vec<&str> = DebugMode::ALL.iter().map(|mode| mode.name()).collect();
        assert_eq!(names, VIEW_MODES);
    }

    #[test]
    fn test_zero_sized_target() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.target.height = 0;
        assert!(matches!(
            run_demo(&config, false),
            Err(CliError::Config(ConfigError::Invalid {
                field: "target.height",
                ..
            }))
        ));
    }

    #[test]
    fn test_demo_writes_images_and_dump() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        run_demo(&config, true).unwrap();

        for mode in DebugMode::ALL {
            assert!(dir.path().join(format!("demo-{}.png", mode.name())).exists());
        }
        assert!(dir.path().join("demo-normals.png").exists());
        let dump = dir.path().join("demo.vbuf");
        let target = read_dump(BufReader::new(File::open(&dump).unwrap())).unwrap();
        assert_eq!((target.width(), target.height()), (96, 64));
        assert!(target.coverage() > 0);
        assert!(target.pixels().all(|(_, _, r)| r.is_empty() || decode(r).is_some()));

        let png_path = dir.path().join("inspect.png");
        run_inspect(&config, &dump, Some(&png_path)).unwrap();
        assert!(png_path.exists());
    }
}
