//! zkup-env - Lifecycle management for a dockerized L1 + L2 development environment.
//!
//! This crate fetches the compose definition of the environment, drives it through a
//! container runtime and waits until the L2 node reports its main contract before
//! considering an install complete.

mod compose;
pub use compose::{DockerCompose, project_name};

mod config;
pub use config::{ConfigStore, EnvironmentConfig, TomlConfigStore};

mod descriptor;
pub use descriptor::{
    ChainEndpoint, DEFAULT_COMPOSE_FILE, DEFAULT_L1_CHAIN_ID, DEFAULT_L1_RPC_URL,
    DEFAULT_L2_CHAIN_ID, DEFAULT_L2_RPC_URL, DEFAULT_REPOSITORY_URL, DEFAULT_RICH_ACCOUNTS_FILE,
    EnvironmentDescriptor, EnvironmentPaths, StartupInfo,
};

mod error;
pub use error::{ConfigError, DeploymentFailed, FetchError, LifecycleError, RuntimeError};

mod lifecycle;
pub use lifecycle::{EnvironmentStatus, LifecycleManager};

mod readiness;
pub use readiness::{
    ContractProbe, DEFAULT_POLL_INTERVAL, HttpContractProbe, PollState, PollTerminal,
    ReadinessConfig, ReadinessPoller, TickObserver, TickReport,
};

pub mod rpc;
pub use rpc::ProbeOutcome;

mod runtime;
pub use runtime::{ContainerRuntime, ContainerStatusSnapshot, ServiceStatus, is_running};

mod source;
pub use source::{GitSource, SourceFetcher};

#[cfg(test)]
mod testing;

/// The manager wired with the production collaborators.
pub type DockerizedNode =
    LifecycleManager<GitSource, DockerCompose, TomlConfigStore, HttpContractProbe>;

/// Build a [`DockerizedNode`] rooted at `data_dir`.
///
/// Connects to the local Docker daemon; fails if the Docker client cannot be configured.
pub fn dockerized_node(
    data_dir: &std::path::Path,
    descriptor: EnvironmentDescriptor,
) -> anyhow::Result<DockerizedNode> {
    let paths = EnvironmentPaths::new(data_dir, &descriptor);
    let probe = HttpContractProbe::new(descriptor.l2_rpc_url.clone())?;
    let config = TomlConfigStore::new(&paths.config_file);
    let runtime = DockerCompose::new()?;

    Ok(LifecycleManager::new(
        descriptor,
        paths,
        GitSource::default(),
        runtime,
        config,
        probe,
    ))
}
