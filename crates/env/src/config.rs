//! Persisted per-environment configuration: the installed source revision.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// The configuration record stored on disk for one environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Revision of the last confirmed install.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Storage for the installed version.
pub trait ConfigStore: Send + Sync {
    /// Read the installed version, `None` if nothing was ever installed.
    fn load_version(&self) -> Result<Option<String>, ConfigError>;

    /// Record `version` as installed.
    fn save_version(&self, version: &str) -> Result<(), ConfigError>;
}

/// [`ConfigStore`] backed by a TOML file.
#[derive(Debug, Clone)]
pub struct TomlConfigStore {
    path: PathBuf,
}

impl TomlConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the whole record. A missing file is an empty record.
    pub fn load(&self) -> Result<EnvironmentConfig, ConfigError> {
        if !self.path.exists() {
            return Ok(EnvironmentConfig::default());
        }

        let content = std::fs::read_to_string(&self.path).map_err(|source| ConfigError::Read {
            path: self.path.clone(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Save the whole record, creating the parent directory if needed.
    pub fn save(&self, config: &EnvironmentConfig) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(config)?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        std::fs::write(&self.path, content).map_err(|source| ConfigError::Write {
            path: self.path.clone(),
            source,
        })?;

        tracing::debug!(path = %self.path.display(), "Environment configuration saved");
        Ok(())
    }
}

impl ConfigStore for TomlConfigStore {
    fn load_version(&self) -> Result<Option<String>, ConfigError> {
        Ok(self.load()?.version)
    }

    fn save_version(&self, version: &str) -> Result<(), ConfigError> {
        let mut config = self.load()?;
        config.version = Some(version.to_string());
        self.save(&config)
    }
}
