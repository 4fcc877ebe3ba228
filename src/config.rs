//! Configuration System
//!
//! Layered configuration for a replica: which storage backend to open, which remote it
//! tracks and how it logs. Sources, lowest precedence first:
//!
//! 1. built-in defaults
//! 2. global file (`{config_dir}/apigit/config.toml`)
//! 3. workspace file (`<root>/.apigit/config.toml`, then `<root>/.apigit/{APIGIT_ENV}.toml`)
//! 4. environment (`APIGIT__STORAGE__BACKEND=sled`, ...)

use crate::error::SyncError;
use crate::index::AdapterMeta;
use crate::logging::LoggingConfig;
use crate::storage::{MemoryRegistry, SledStorage, StorageBackend};
use config::Environment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

mod merge;
mod sources;

pub use sources::global_file::global_config_path;
pub use sources::workspace_file::workspace_config_dir;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApigitConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    /// Remote binding; usually also persisted in the index once set
    #[serde(default)]
    pub remote: Option<AdapterMeta>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Memory,
    Sled,
}

/// Storage backend selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: BackendKind,

    /// Database directory for the sled backend; relative paths resolve against the workspace root
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Memory backends opened with the same root name share state
    #[serde(default = "default_root_name")]
    pub root_name: String,
}

fn default_root_name() -> String {
    "default".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Memory,
            path: None,
            root_name: default_root_name(),
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.root_name.trim().is_empty() {
            return Err("Root name cannot be empty".to_string());
        }
        if self.backend == BackendKind::Sled
            && self.path.as_ref().map_or(true, |p| p.as_os_str().is_empty())
        {
            return Err("Sled backend requires a storage path".to_string());
        }
        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Storage: {0}")]
    Storage(String),

    #[error("Remote: {0}")]
    Remote(String),

    #[error("Logging: {0}")]
    Logging(String),
}

impl ApigitConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.storage.validate() {
            errors.push(ValidationError::Storage(e));
        }
        if let Some(remote) = &self.remote {
            if let Err(e) = remote.validate() {
                errors.push(ValidationError::Remote(e));
            }
        }
        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Loads [`ApigitConfig`] from the layered sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration for the workspace at `workspace_root`
    pub fn load(workspace_root: &Path) -> Result<ApigitConfig, SyncError> {
        let global = global_config_path();
        Self::load_with_global(workspace_root, global.as_deref())
    }

    /// Same as [`ConfigLoader::load`] with an explicit global file location
    pub fn load_with_global(
        workspace_root: &Path,
        global_path: Option<&Path>,
    ) -> Result<ApigitConfig, SyncError> {
        let builder = merge::merge_policy::builder_with_defaults()?;
        let builder = sources::global_file::add_to_builder(builder, global_path)?;
        let builder = sources::workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = builder.add_source(
            Environment::with_prefix("APIGIT")
                .prefix_separator("__")
                .separator("__"),
        );

        let mut config: ApigitConfig = builder.build()?.try_deserialize()?;
        if let Some(path) = config.storage.path.as_mut() {
            if path.is_relative() {
                *path = workspace_root.join(&*path);
            }
        }

        config.validate().map_err(join_errors)?;
        debug!(
            workspace = %workspace_root.display(),
            backend = ?config.storage.backend,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Load configuration from a single TOML file, without other layers
    pub fn load_from_file(path: &Path) -> Result<ApigitConfig, SyncError> {
        let config: ApigitConfig = merge::merge_policy::builder_with_defaults()?
            .add_source(config::File::from(path).format(config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate().map_err(join_errors)?;
        Ok(config)
    }
}

fn join_errors(errors: Vec<ValidationError>) -> SyncError {
    let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
    SyncError::Config(format!(
        "Configuration validation failed:\n{}",
        messages.join("\n")
    ))
}

/// Open the storage backend described by `config`
///
/// Memory backends are resolved through `registry`, so replicas opened against the same
/// registry and root name share state.
pub fn open_storage(
    config: &StorageConfig,
    registry: &MemoryRegistry,
) -> Result<Arc<dyn StorageBackend>, SyncError> {
    config.validate().map_err(SyncError::Config)?;
    match config.backend {
        BackendKind::Memory => Ok(Arc::new(registry.open(&config.root_name))),
        BackendKind::Sled => {
            let path = config
                .path
                .as_ref()
                .ok_or_else(|| SyncError::Config("Sled backend requires a storage path".to_string()))?;
            Ok(Arc::new(SledStorage::new(path)?))
        }
    }
}
