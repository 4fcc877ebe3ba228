//! Workspace config file source: `.apigit/config.toml` and `.apigit/{APIGIT_ENV}.toml`

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File, FileFormat};
use std::path::{Path, PathBuf};

/// Directory holding workspace-level configuration
pub fn workspace_config_dir(workspace_root: &Path) -> PathBuf {
    workspace_root.join(".apigit")
}

/// Add workspace config files to builder.
/// Precedence: `config.toml` (base) then `{APIGIT_ENV}.toml` when `APIGIT_ENV` is set.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    workspace_root: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let config_dir = workspace_config_dir(workspace_root);
    let mut builder = builder;

    let base_config_path = config_dir.join("config.toml");
    if base_config_path.exists() {
        builder = builder.add_source(
            File::from(base_config_path)
                .format(FileFormat::Toml)
                .required(false),
        );
    }

    if let Ok(env_name) = std::env::var("APIGIT_ENV") {
        let env_config_path = config_dir.join(format!("{}.toml", env_name));
        if env_config_path.exists() {
            builder = builder.add_source(
                File::from(env_config_path)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }
    }

    Ok(builder)
}
