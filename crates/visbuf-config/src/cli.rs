//! Command-line overrides shared by the visibility-buffer tools.

use std::path::PathBuf;

use clap::Args;

use crate::Config;

/// Flags that override values loaded from `config.ron`.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Visibility target width.
    #[arg(long, global = true)]
    pub width: Option<u32>,

    /// Visibility target height.
    #[arg(long, global = true)]
    pub height: Option<u32>,

    /// Triangles per cluster.
    #[arg(long, global = true)]
    pub cluster_size: Option<u32>,

    /// Debug view mode.
    #[arg(long, global = true)]
    pub view: Option<String>,

    /// Output directory for images and dumps.
    #[arg(long, global = true)]
    pub out: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &ConfigArgs) {
        if let Some(w) = args.width {
            self.target.width = w;
        }
        if let Some(h) = args.height {
            self.target.height = h;
        }
        if let Some(size) = args.cluster_size {
            self.cluster.triangles_per_cluster = size;
        }
        if let Some(ref view) = args.view {
            self.debug.view_mode = view.clone();
        }
        if let Some(ref out) = args.out {
            self.debug.output_dir = out.clone();
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
