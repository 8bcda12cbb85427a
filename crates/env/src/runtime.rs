//! Container runtime boundary.

use std::{future::Future, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::RuntimeError;

/// Running state of one compose service at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub service_name: String,
    pub is_running: bool,
}

impl ServiceStatus {
    pub fn new(service_name: impl Into<String>, is_running: bool) -> Self {
        Self {
            service_name: service_name.into(),
            is_running,
        }
    }
}

/// Point-in-time view of every service of the stack. Never cached.
pub type ContainerStatusSnapshot = Vec<ServiceStatus>;

/// Drives a multi-container stack addressed by its compose definition file.
pub trait ContainerRuntime: Send + Sync {
    /// Bring the stack up in the background. Already running services are left alone.
    fn up(&self, definition: &Path) -> impl Future<Output = Result<(), RuntimeError>> + Send;

    /// Stop the stack, keeping containers and volumes.
    fn stop(&self, definition: &Path) -> impl Future<Output = Result<(), RuntimeError>> + Send;

    /// Tear the stack down, removing containers and volumes.
    fn down(&self, definition: &Path) -> impl Future<Output = Result<(), RuntimeError>> + Send;

    /// Report every known service of the stack, running or not.
    fn status(
        &self,
        definition: &Path,
    ) -> impl Future<Output = Result<ContainerStatusSnapshot, RuntimeError>> + Send;

    /// Return the stack's log lines.
    fn logs(
        &self,
        definition: &Path,
    ) -> impl Future<Output = Result<Vec<String>, RuntimeError>> + Send;

    /// Return at most the last `lines` log lines of every service.
    fn tail_logs(
        &self,
        definition: &Path,
        lines: usize,
    ) -> impl Future<Output = Result<Vec<String>, RuntimeError>> + Send;
}

/// True iff at least one service is running. An empty snapshot is not running.
pub fn is_running(snapshot: &[ServiceStatus]) -> bool {
    snapshot.iter().any(|service| service.is_running)
}
