//! Docker Compose backed container runtime.
//!
//! Lifecycle commands (`up`, `stop`, `down`, `logs`) go through the `docker compose`
//! CLI. Service status is read from the Docker Engine API by filtering containers on
//! the compose project label, so stopped services are reported too.

use std::{collections::HashMap, path::Path};

use bollard::{Docker, container::ListContainersOptions, models::ContainerSummary};
use derive_more::Deref;
use tokio::process::Command;

use crate::{
    error::RuntimeError,
    runtime::{ContainerRuntime, ContainerStatusSnapshot, ServiceStatus},
};

/// Label set by compose on every container of a project.
const PROJECT_LABEL: &str = "com.docker.compose.project";
/// Label set by compose with the service a container belongs to.
const SERVICE_LABEL: &str = "com.docker.compose.service";

/// Container runtime driving a compose stack.
#[derive(Deref)]
pub struct DockerCompose {
    #[deref]
    docker: Docker,

    /// The docker CLI binary.
    program: String,
}

impl DockerCompose {
    /// Connect to the local Docker daemon.
    pub fn new() -> Result<Self, RuntimeError> {
        let docker = Docker::connect_with_local_defaults().map_err(RuntimeError::Connect)?;
        Ok(Self {
            docker,
            program: "docker".to_string(),
        })
    }

    /// Use a different docker CLI binary (e.g. a full path or `podman`).
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Run `docker compose -p <project> -f <definition> <args...>` and return its stdout.
    async fn compose(&self, definition: &Path, args: &[&str]) -> Result<String, RuntimeError> {
        let mut full_args = compose_base_args(definition);
        full_args.extend(args.iter().map(|arg| arg.to_string()));

        let command = format!("{} {}", self.program, full_args.join(" "));
        tracing::debug!(command = %command, "Running compose command");

        let output = Command::new(&self.program)
            .args(&full_args)
            .output()
            .await
            .map_err(|source| RuntimeError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(RuntimeError::Command {
                command,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn compose_logs(
        &self,
        definition: &Path,
        tail: Option<usize>,
    ) -> Result<Vec<String>, RuntimeError> {
        ensure_definition(definition)?;
        let args = logs_args(tail);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.compose(definition, &args).await?;
        Ok(output.lines().map(str::to_string).collect())
    }
}

impl ContainerRuntime for DockerCompose {
    async fn up(&self, definition: &Path) -> Result<(), RuntimeError> {
        ensure_definition(definition)?;
        self.compose(definition, &["up", "--detach"]).await?;
        tracing::debug!(definition = %definition.display(), "Compose stack up");
        Ok(())
    }

    async fn stop(&self, definition: &Path) -> Result<(), RuntimeError> {
        if !definition.exists() {
            tracing::debug!(
                definition = %definition.display(),
                "No compose definition, nothing to stop"
            );
            return Ok(());
        }
        self.compose(definition, &["stop"]).await?;
        Ok(())
    }

    async fn down(&self, definition: &Path) -> Result<(), RuntimeError> {
        if !definition.exists() {
            tracing::debug!(
                definition = %definition.display(),
                "No compose definition, nothing to tear down"
            );
            return Ok(());
        }
        self.compose(definition, &["down", "--volumes", "--remove-orphans"])
            .await?;
        Ok(())
    }

    async fn status(&self, definition: &Path) -> Result<ContainerStatusSnapshot, RuntimeError> {
        let project = project_name(definition);

        let mut filters = HashMap::new();
        filters.insert("label".to_string(), vec![format!("{}={}", PROJECT_LABEL, project)]);

        let containers = self
            .list_containers(Some(ListContainersOptions::<String> {
                all: true,
                filters,
                ..Default::default()
            }))
            .await?;

        let mut snapshot: ContainerStatusSnapshot =
            containers.iter().map(service_status_from_summary).collect();
        snapshot.sort_by(|a, b| a.service_name.cmp(&b.service_name));

        tracing::trace!(project = %project, services = snapshot.len(), "Compose status");
        Ok(snapshot)
    }

    async fn logs(&self, definition: &Path) -> Result<Vec<String>, RuntimeError> {
        self.compose_logs(definition, None).await
    }

    async fn tail_logs(
        &self,
        definition: &Path,
        lines: usize,
    ) -> Result<Vec<String>, RuntimeError> {
        self.compose_logs(definition, Some(lines)).await
    }
}

fn ensure_definition(definition: &Path) -> Result<(), RuntimeError> {
    if definition.exists() {
        Ok(())
    } else {
        Err(RuntimeError::MissingDefinition {
            path: definition.to_path_buf(),
        })
    }
}

fn compose_base_args(definition: &Path) -> Vec<String> {
    vec![
        "compose".to_string(),
        "-p".to_string(),
        project_name(definition),
        "-f".to_string(),
        definition.to_string_lossy().to_string(),
    ]
}

/// `logs` arguments, limited to the last `tail` lines per service when set.
fn logs_args(tail: Option<usize>) -> Vec<String> {
    let mut args = vec!["logs".to_string(), "--no-color".to_string()];
    if let Some(lines) = tail {
        args.push("--tail".to_string());
        args.push(lines.to_string());
    }
    args
}

/// Compose project name for a definition: its directory name, normalized the way compose does.
pub fn project_name(definition: &Path) -> String {
    let dir = definition
        .parent()
        .and_then(|parent| parent.file_name())
        .map(|name| name.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let name: String = dir
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-' || *c == '_')
        .collect();

    let name = name.trim_start_matches(['-', '_']).to_string();
    if name.is_empty() {
        "default".to_string()
    } else {
        name
    }
}

/// Map a container listed by the Docker API to its compose service status.
fn service_status_from_summary(summary: &ContainerSummary) -> ServiceStatus {
    let service_name = summary
        .labels
        .as_ref()
        .and_then(|labels| labels.get(SERVICE_LABEL).cloned())
        .or_else(|| {
            summary
                .names
                .as_ref()
                .and_then(|names| names.first())
                .map(|name| name.trim_start_matches('/').to_string())
        })
        .unwrap_or_else(|| "unknown".to_string());

    let is_running = summary.state.as_deref() == Some("running");

    ServiceStatus {
        service_name,
        is_running,
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_project_name_from_directory() {
        let definition = PathBuf::from("/home/dev/.zkup/dockerized-node/docker-compose.yml");
        assert_eq!(project_name(&definition), "dockerized-node");
    }

    #[test]
    fn test_project_name_is_normalized() {
        let definition = PathBuf::from("/tmp/_My Local.Setup/docker-compose.yml");
        assert_eq!(project_name(&definition), "mylocalsetup");

        let definition = PathBuf::from("docker-compose.yml");
        assert_eq!(project_name(&definition), "default");
    }

    #[test]
    fn test_base_args_pin_project_and_file() {
        let definition = PathBuf::from("/data/dockerized-node/docker-compose.yml");
        assert_eq!(
            compose_base_args(&definition),
            vec![
                "compose",
                "-p",
                "dockerized-node",
                "-f",
                "/data/dockerized-node/docker-compose.yml"
            ]
        );
    }

    #[test]
    fn test_logs_args_limit_tail() {
        assert_eq!(logs_args(None), vec!["logs", "--no-color"]);
        assert_eq!(logs_args(Some(20)), vec!["logs", "--no-color", "--tail", "20"]);
    }

    #[test]
    fn test_service_status_uses_compose_label() {
        let summary = ContainerSummary {
            names: Some(vec!["/dockerized-node-zksync-1".to_string()]),
            labels: Some(HashMap::from([(
                SERVICE_LABEL.to_string(),
                "zksync".to_string(),
            )])),
            state: Some("running".to_string()),
            ..Default::default()
        };
        assert_eq!(
            service_status_from_summary(&summary),
            ServiceStatus::new("zksync", true)
        );
    }

    #[test]
    fn test_service_status_falls_back_to_container_name() {
        let summary = ContainerSummary {
            names: Some(vec!["/dockerized-node-reth-1".to_string()]),
            state: Some("exited".to_string()),
            ..Default::default()
        };
        assert_eq!(
            service_status_from_summary(&summary),
            ServiceStatus::new("dockerized-node-reth-1", false)
        );
    }

    #[tokio::test]
    async fn test_up_without_definition_fails_before_running_compose() {
        let Ok(runtime) = DockerCompose::new() else {
            // connect_with_local_defaults only fails on a malformed DOCKER_HOST
            return;
        };
        let definition = PathBuf::from("/nonexistent/zkup/docker-compose.yml");

        // The Docker API client stays reachable through the runtime.
        let _docker: &Docker = &runtime;

        let result = runtime.up(&definition).await;
        assert!(matches!(result, Err(RuntimeError::MissingDefinition { .. })));

        // stop and down on a missing definition are no-ops
        assert!(runtime.stop(&definition).await.is_ok());
        assert!(runtime.down(&definition).await.is_ok());
    }
}
