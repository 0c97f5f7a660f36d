//! `visbuf`: command-line front end for the visibility-buffer toolkit.
//!
//! Encodes and decodes single records, renders a procedural scene through
//! the CPU reference rasterizer, and inspects raw visibility dumps.
//!
//! Run with: `cargo run -p visbuf-cli -- demo --view cluster`

mod commands;
mod error;
mod scene;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use visbuf_config::{Config, ConfigArgs, default_config_dir};

use crate::error::CliError;

#[derive(Parser, Debug)]
#[command(name = "visbuf", about = "Visibility buffer encoding toolkit")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    overrides: ConfigArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encode one fragment into its raw record.
    Encode {
        instance_id: u32,
        local_primitive_index: u32,
        triangle_offset: u32,
    },
    /// Decode a raw record given as its two lanes.
    Decode { instance: u32, triangle: u32 },
    /// Cluster, rasterize and resolve a procedural scene.
    Demo {
        /// Write one image per debug view instead of only the configured one.
        #[arg(long)]
        all_views: bool,
    },
    /// Print statistics for a raw visibility dump.
    Inspect {
        dump: PathBuf,
        /// Also write a debug image of the dump.
        #[arg(long)]
        png: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let config_dir = cli.overrides.config.clone().unwrap_or_else(default_config_dir);
    let (mut config, load_error) = match Config::load_or_create(&config_dir) {
        Ok(config) => (config, None),
        Err(err) => (Config::default(), Some(err)),
    };
    config.apply_cli_overrides(&cli.overrides);

    visbuf_log::init_logging(
        Some(&config.debug.output_dir),
        cfg!(debug_assertions),
        Some(&config),
    );
    if let Some(err) = load_error {
        error!("Using default config: {err}");
    }
    info!(
        "Target {}x{}, {} triangles per cluster, view '{}'",
        config.target.width,
        config.target.height,
        config.cluster.triangles_per_cluster,
        config.debug.view_mode
    );

    if let Err(err) = run(cli.command, &config) {
        error!("{err}");
        std::process::exit(1);
    }
}

fn run(command: Command, config: &Config) -> Result<(), CliError> {
    match command {
        Command::Encode {
            instance_id,
            local_primitive_index,
            triangle_offset,
        } => commands::run_encode(instance_id, local_primitive_index, triangle_offset),
        Command::Decode { instance, triangle } => {
            commands::run_decode(instance, triangle);
            Ok(())
        }
        Command::Demo { all_views } => commands::run_demo(config, all_views),
        Command::Inspect { dump, png } => commands::run_inspect(config, &dump, png.as_deref()),
    }
}
