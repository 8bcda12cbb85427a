//! Error types surfaced by the lifecycle operations.

use std::{path::PathBuf, time::Duration};

/// Failure while cloning, updating or querying the environment source repository.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("failed to run git: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("`{command}` failed: {stderr}")]
    Command { command: String, stderr: String },

    #[error("no revision advertised by {repository}")]
    NoRevision { repository: String },

    #[error("destination {} is unusable: {reason}", path.display())]
    Destination { path: PathBuf, reason: String },
}

/// Failure of a container orchestration command.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("failed to connect to Docker. Is Docker running? {0}")]
    Connect(#[source] bollard::errors::Error),

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` failed: {stderr}")]
    Command { command: String, stderr: String },

    #[error("Docker API request failed: {0}")]
    Api(#[from] bollard::errors::Error),

    #[error("compose definition not found: {}", path.display())]
    MissingDefinition { path: PathBuf },
}

/// Terminal failure of the readiness wait.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeploymentFailed {
    /// The containers stopped running before the main contract was deployed.
    #[error("the environment stopped running before contract deployment completed")]
    EnvironmentStoppedUnexpectedly,

    /// A configured maximum wait elapsed.
    #[error("contract deployment did not complete within {}s", elapsed.as_secs())]
    TimedOut { elapsed: Duration },

    /// The caller cancelled the wait.
    #[error("waiting for contract deployment was cancelled")]
    Cancelled,
}

/// Failure reading or writing the persisted environment configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Any failure returned by a [`crate::LifecycleManager`] operation.
///
/// Each variant is transparent so callers can match on the originating kind.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Deployment(#[from] DeploymentFailed),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl LifecycleError {
    /// Returns the deployment failure if the readiness wait is what failed.
    pub fn deployment_failure(&self) -> Option<&DeploymentFailed> {
        match self {
            LifecycleError::Deployment(failure) => Some(failure),
            _ => None,
        }
    }
}
