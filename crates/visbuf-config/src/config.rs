//! Configuration structs with defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Visibility target settings.
    pub target: TargetConfig,
    /// Mesh clustering settings.
    pub cluster: ClusterConfig,
    /// Debug output settings.
    pub debug: DebugConfig,
}

/// Visibility target dimensions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TargetConfig {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Mesh clustering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClusterConfig {
    /// Triangles per cluster (clamped to 32..=128 by the builder).
    pub triangles_per_cluster: u32,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Debug view: instance, triangle, mixed, cluster, cluster-instance, depth.
    pub view_mode: String,
    /// Directory for debug images and raw dumps.
    pub output_dir: PathBuf,
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            triangles_per_cluster: 64,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            view_mode: "instance".to_string(),
            output_dir: PathBuf::from("visbuf-out"),
            log_level: "info".to_string(),
        }
    }
}

/// Platform config directory for the tools, e.g. `~/.config/visbuf`.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("visbuf")
}

/// File name inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.ron";

/// Largest accepted target edge, matching the dump reader's limit.
pub const MAX_TARGET_DIMENSION: u32 = 16_384;

/// Names accepted by `debug.view_mode`.
pub const VIEW_MODES: [&str; 6] = [
    "instance",
    "triangle",
    "mixed",
    "cluster",
    "cluster-instance",
    "depth",
];

impl Config {
    /// Reads `config.ron` from `config_dir`, writing the defaults there first
    /// when the file does not exist yet.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let path = config_dir.join(CONFIG_FILE_NAME);
        if !path.exists() {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("wrote default visbuf config to {}", path.display());
            return Ok(config);
        }

        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config: Config =
            ron::from_str(&text).map_err(|source| ConfigError::Parse { path: path.clone(), source })?;
        log::debug!("visbuf config loaded from {}", path.display());
        Ok(config)
    }

    /// Writes this config to `config_dir/config.ron`, creating the directory.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        let path = config_dir.join(CONFIG_FILE_NAME);
        let write_err = |source| ConfigError::Write {
            path: path.clone(),
            source,
        };
        std::fs::create_dir_all(config_dir).map_err(write_err)?;

        let text = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::new().depth_limit(2))
            .map_err(ConfigError::Serialize)?;
        std::fs::write(&path, text).map_err(write_err)
    }

    /// Rejects values that parse but cannot drive a run. Cluster size is
    /// not checked here; the cluster builder clamps it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("target.width", self.target.width),
            ("target.height", self.target.height),
        ] {
            if value == 0 || value > MAX_TARGET_DIMENSION {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("{value} is outside 1..={MAX_TARGET_DIMENSION}"),
                });
            }
        }

        if !VIEW_MODES.contains(&self.debug.view_mode.as_str()) {
            return Err(ConfigError::Invalid {
                field: "debug.view_mode",
                reason: format!(
                    "'{}' is not one of {}",
                    self.debug.view_mode,
                    VIEW_MODES.join(", ")
                ),
            });
        }
        Ok(())
    }
}
