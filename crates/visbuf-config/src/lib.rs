//! Configuration for the visibility-buffer tools.
//!
//! Settings persist to disk as `config.ron`, tolerate missing and unknown
//! fields, are validated before use, and can be overridden from the command line via clap.

mod cli;
mod config;
mod error;

pub use cli::ConfigArgs;
pub use config::{
    CONFIG_FILE_NAME, ClusterConfig, Config, DebugConfig, MAX_TARGET_DIMENSION, TargetConfig,
    VIEW_MODES, default_config_dir,
};
pub use error::ConfigError;
