//! Merge rules: defaults below every other source.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("storage.backend", "memory")?
        .set_default("storage.root_name", "default")?
        .set_default("logging.level", "info")
}
