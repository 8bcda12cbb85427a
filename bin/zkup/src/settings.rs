//! Layered settings: built-in defaults, an optional TOML file, then `ZKUP_` environment variables.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use zkup_env::{
    DEFAULT_L2_RPC_URL, DEFAULT_POLL_INTERVAL, DEFAULT_REPOSITORY_URL, EnvironmentDescriptor,
    ReadinessConfig,
};

/// Prefix of the environment variables read as settings.
const ENV_PREFIX: &str = "ZKUP_";

/// Directory under the home directory used when `data_dir` is not set.
const DEFAULT_DATA_DIR: &str = ".zkup";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Where the environment source and its configuration are kept.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    pub poll_interval_secs: u64,
    /// Give up waiting for the L2 contracts after this many seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_wait_secs: Option<u64>,
    pub repository_url: String,
    pub l2_rpc_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: None,
            poll_interval_secs: DEFAULT_POLL_INTERVAL.as_secs(),
            max_wait_secs: None,
            repository_url: DEFAULT_REPOSITORY_URL.to_string(),
            l2_rpc_url: DEFAULT_L2_RPC_URL.to_string(),
        }
    }
}

impl Settings {
    /// Merge the defaults with `file` (if any) and the environment.
    pub fn load(file: Option<&Path>) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));
        if let Some(file) = file {
            if !file.exists() {
                anyhow::bail!("Settings file not found: {}", file.display());
            }
            figment = figment.merge(Toml::file(file));
        }

        figment
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
            .context("Failed to load zkup settings")
    }

    /// The configured data directory, `~/.zkup` by default.
    pub fn data_dir(&self) -> anyhow::Result<PathBuf> {
        if let Some(data_dir) = &self.data_dir {
            return Ok(data_dir.clone());
        }

        let home = dirs::home_dir().context("Could not determine the home directory")?;
        Ok(home.join(DEFAULT_DATA_DIR))
    }

    pub fn descriptor(&self) -> anyhow::Result<EnvironmentDescriptor> {
        let mut descriptor = EnvironmentDescriptor::default();
        descriptor.repository_url = self.repository_url.clone();
        descriptor.l2_rpc_url = self
            .l2_rpc_url
            .parse()
            .with_context(|| format!("Invalid L2 RPC URL: {}", self.l2_rpc_url))?;
        Ok(descriptor)
    }

    pub fn readiness(&self) -> anyhow::Result<ReadinessConfig> {
        if self.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be greater than zero");
        }

        Ok(ReadinessConfig {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            max_wait: self.max_wait_secs.map(Duration::from_secs),
        })
    }
}
