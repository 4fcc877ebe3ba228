//! Global config file source: `{config_dir}/apigit/config.toml`
//!
//! `config_dir` is the platform config directory (`$XDG_CONFIG_HOME` or `~/.config` on Linux).

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File, FileFormat};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Path to the global config file, if a home directory can be determined
pub fn global_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "apigit").map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Add the global config file at `path` to `builder` when it exists
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    path: Option<&Path>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let Some(path) = path else {
        return Ok(builder);
    };
    if !path.exists() {
        debug!(config_path = %path.display(), "No global configuration file");
        return Ok(builder);
    }
    Ok(builder.add_source(File::from(path).format(FileFormat::Toml).required(false)))
}
