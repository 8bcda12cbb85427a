//! Source repository boundary: fetches the compose definition of the environment.

use std::{future::Future, path::Path};

use tokio::process::Command;

use crate::error::FetchError;

/// Clones and updates the repository that holds the environment definition.
pub trait SourceFetcher: Send + Sync {
    /// Clone `repository_url` into `destination`, or fetch it if already cloned there.
    fn clone_or_fetch(
        &self,
        repository_url: &str,
        destination: &Path,
    ) -> impl Future<Output = Result<(), FetchError>> + Send;

    /// Move the working tree at `destination` to `revision`.
    fn checkout(
        &self,
        destination: &Path,
        revision: &str,
    ) -> impl Future<Output = Result<(), FetchError>> + Send;

    /// Resolve the latest revision of the repository's default branch.
    fn resolve_latest_revision(
        &self,
        repository: &str,
    ) -> impl Future<Output = Result<String, FetchError>> + Send;
}

/// [`SourceFetcher`] driving the `git` CLI.
#[derive(Debug, Clone)]
pub struct GitSource {
    program: String,
}

impl Default for GitSource {
    fn default() -> Self {
        Self {
            program: "git".to_string(),
        }
    }
}

impl GitSource {
    async fn run(&self, cwd: Option<&Path>, args: &[&str]) -> Result<String, FetchError> {
        let mut cmd = Command::new(&self.program);
        if let Some(cwd) = cwd {
            cmd.arg("-C").arg(cwd);
        }
        cmd.args(args);

        let rendered = format!("{} {}", self.program, args.join(" "));
        tracing::debug!(command = %rendered, "Running git");

        let output = cmd.output().await.map_err(FetchError::Spawn)?;
        if !output.status.success() {
            return Err(FetchError::Command {
                command: rendered,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl SourceFetcher for GitSource {
    async fn clone_or_fetch(
        &self,
        repository_url: &str,
        destination: &Path,
    ) -> Result<(), FetchError> {
        if destination.join(".git").is_dir() {
            tracing::debug!(
                destination = %destination.display(),
                "Source already cloned, fetching"
            );
            self.run(Some(destination), &["fetch", "--prune", "origin"])
                .await?;
            return Ok(());
        }

        if destination.exists() {
            let is_empty = std::fs::read_dir(destination)
                .map_err(|e| FetchError::Destination {
                    path: destination.to_path_buf(),
                    reason: e.to_string(),
                })?
                .next()
                .is_none();
            if !is_empty {
                return Err(FetchError::Destination {
                    path: destination.to_path_buf(),
                    reason: "directory exists and is not a git checkout".to_string(),
                });
            }
        } else if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent).map_err(|e| FetchError::Destination {
                path: parent.to_path_buf(),
                reason: e.to_string(),
            })?;
        }

        let destination_str = destination.to_string_lossy().to_string();
        self.run(None, &["clone", repository_url, destination_str.as_str()])
            .await?;
        tracing::debug!(repository_url, destination = %destination.display(), "Source cloned");
        Ok(())
    }

    async fn checkout(&self, destination: &Path, revision: &str) -> Result<(), FetchError> {
        self.run(Some(destination), &["checkout", "--force", "--detach", revision])
            .await?;
        Ok(())
    }

    async fn resolve_latest_revision(&self, repository: &str) -> Result<String, FetchError> {
        let output = self.run(None, &["ls-remote", repository, "HEAD"]).await?;
        parse_ls_remote_head(&output).ok_or_else(|| FetchError::NoRevision {
            repository: repository.to_string(),
        })
    }
}

/// Extract the commit hash from `git ls-remote <repo> HEAD` output.
fn parse_ls_remote_head(output: &str) -> Option<String> {
    output
        .lines()
        .filter_map(|line| line.split_once('\t'))
        .find(|(_, reference)| reference.trim() == "HEAD")
        .map(|(hash, _)| hash.trim().to_string())
        .filter(|hash| !hash.is_empty())
}
