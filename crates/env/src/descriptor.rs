//! Static description of the dockerized L1 + L2 environment and its on-disk layout.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use url::Url;

/// Chain id of the local L1 node.
pub const DEFAULT_L1_CHAIN_ID: u64 = 9;
/// RPC endpoint of the local L1 node.
pub const DEFAULT_L1_RPC_URL: &str = "http://127.0.0.1:8545";
/// Chain id of the local L2 node.
pub const DEFAULT_L2_CHAIN_ID: u64 = 270;
/// RPC endpoint of the local L2 node.
pub const DEFAULT_L2_RPC_URL: &str = "http://127.0.0.1:3050";
/// File written by the container entrypoint with the pre-funded accounts.
pub const DEFAULT_RICH_ACCOUNTS_FILE: &str = "rich-wallets.json";
/// Repository holding the compose definition of the environment.
pub const DEFAULT_REPOSITORY_URL: &str = "https://github.com/matter-labs/local-setup.git";
/// Compose definition file name inside the repository.
pub const DEFAULT_COMPOSE_FILE: &str = "docker-compose.yml";

/// Name of the directory (and config file stem) the environment lives under.
const MODULE_NAME: &str = "dockerized-node";

/// Compile-time facts about the environment. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentDescriptor {
    /// The L1 chain id.
    pub l1_chain_id: u64,
    /// The L1 RPC URL, as reachable from the host.
    pub l1_rpc_url: Url,
    /// The L2 chain id.
    pub l2_chain_id: u64,
    /// The L2 RPC URL, as reachable from the host.
    pub l2_rpc_url: Url,
    /// Path of the rich-accounts file, relative to the source checkout.
    pub rich_accounts_file: String,
    /// Repository to clone the compose definition from.
    pub repository_url: String,
    /// Compose file name, relative to the source checkout.
    pub compose_file: String,
}

impl Default for EnvironmentDescriptor {
    fn default() -> Self {
        Self {
            l1_chain_id: DEFAULT_L1_CHAIN_ID,
            l1_rpc_url: Url::parse(DEFAULT_L1_RPC_URL).expect("default L1 RPC URL is valid"),
            l2_chain_id: DEFAULT_L2_CHAIN_ID,
            l2_rpc_url: Url::parse(DEFAULT_L2_RPC_URL).expect("default L2 RPC URL is valid"),
            rich_accounts_file: DEFAULT_RICH_ACCOUNTS_FILE.to_string(),
            repository_url: DEFAULT_REPOSITORY_URL.to_string(),
            compose_file: DEFAULT_COMPOSE_FILE.to_string(),
        }
    }
}

/// Local paths used by one environment instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentPaths {
    /// Working directory holding the fetched source.
    pub source_dir: PathBuf,
    /// The compose definition inside `source_dir`.
    pub compose_file: PathBuf,
    /// The persisted configuration record (installed version).
    pub config_file: PathBuf,
    /// The rich-accounts file generated by the containers.
    pub rich_accounts_file: PathBuf,
}

impl EnvironmentPaths {
    /// Lay out the environment under `data_dir`.
    pub fn new(data_dir: &Path, descriptor: &EnvironmentDescriptor) -> Self {
        let source_dir = data_dir.join(MODULE_NAME);
        Self {
            compose_file: source_dir.join(&descriptor.compose_file),
            rich_accounts_file: source_dir.join(&descriptor.rich_accounts_file),
            config_file: data_dir.join(format!("{}.toml", MODULE_NAME)),
            source_dir,
        }
    }
}

/// A chain endpoint reported to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainEndpoint {
    pub chain_id: u64,
    pub rpc_url: Url,
}

/// What the user needs to connect to a running environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartupInfo {
    pub l1: ChainEndpoint,
    pub l2: ChainEndpoint,
    pub rich_accounts_path: PathBuf,
}

impl StartupInfo {
    /// Pure formatting of the descriptor and local paths; performs no I/O.
    pub fn new(descriptor: &EnvironmentDescriptor, paths: &EnvironmentPaths) -> Self {
        Self {
            l1: ChainEndpoint {
                chain_id: descriptor.l1_chain_id,
                rpc_url: descriptor.l1_rpc_url.clone(),
            },
            l2: ChainEndpoint {
                chain_id: descriptor.l2_chain_id,
                rpc_url: descriptor.l2_rpc_url.clone(),
            },
            rich_accounts_path: paths.rich_accounts_file.clone(),
        }
    }
}

impl fmt::Display for StartupInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== L1 ===")?;
        writeln!(f, "  Chain ID: {}", self.l1.chain_id)?;
        writeln!(f, "  RPC URL:  {}", self.l1.rpc_url)?;
        writeln!(f, "=== L2 ===")?;
        writeln!(f, "  Chain ID: {}", self.l2.chain_id)?;
        writeln!(f, "  RPC URL:  {}", self.l2.rpc_url)?;
        write!(f, "Rich accounts: {}", self.rich_accounts_path.display())
    }
}
