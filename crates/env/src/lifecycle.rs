//! Lifecycle orchestration of one environment instance.
//!
//! ```text
//! Absent -> Installing -> Installed & Stopped <-> Installed & Running -> (Cleaning) -> Absent
//! ```
//!
//! Mutating operations (`install`, `update`, `start`, `stop`, `clean`) hold a
//! per-instance lock for their whole duration, so at most one of them talks to the
//! container runtime at a time.

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::{
    config::ConfigStore,
    descriptor::{EnvironmentDescriptor, EnvironmentPaths, StartupInfo},
    error::LifecycleError,
    readiness::{ContractProbe, ReadinessConfig, ReadinessPoller, TickObserver},
    runtime::{self, ContainerRuntime, ContainerStatusSnapshot},
    source::SourceFetcher,
};

/// Number of log lines reported when an install fails.
const FAILURE_LOG_TAIL: usize = 20;

/// Aggregated view used by `status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentStatus {
    pub installed: bool,
    pub running: bool,
    pub version: Option<String>,
    pub services: ContainerStatusSnapshot,
}

/// Orchestrates install/update/start/stop/clean for one environment instance.
pub struct LifecycleManager<S, R, C, P> {
    descriptor: EnvironmentDescriptor,
    paths: EnvironmentPaths,
    source: S,
    runtime: R,
    config: C,
    probe: P,
    readiness: ReadinessConfig,

    /// Latest revision of the source repository, resolved at most once.
    latest_revision: Mutex<Option<String>>,
    /// Serializes mutating operations.
    operation: Mutex<()>,
}

impl<S, R, C, P> LifecycleManager<S, R, C, P>
where
    S: SourceFetcher,
    R: ContainerRuntime,
    C: ConfigStore,
    P: ContractProbe,
{
    pub fn new(
        descriptor: EnvironmentDescriptor,
        paths: EnvironmentPaths,
        source: S,
        runtime: R,
        config: C,
        probe: P,
    ) -> Self {
        Self {
            descriptor,
            paths,
            source,
            runtime,
            config,
            probe,
            readiness: ReadinessConfig::default(),
            latest_revision: Mutex::new(None),
            operation: Mutex::new(()),
        }
    }

    /// Override the readiness polling configuration.
    pub fn with_readiness(mut self, readiness: ReadinessConfig) -> Self {
        self.readiness = readiness;
        self
    }

    pub fn descriptor(&self) -> &EnvironmentDescriptor {
        &self.descriptor
    }

    pub fn paths(&self) -> &EnvironmentPaths {
        &self.paths
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// The compose definition exists and the runtime knows at least one of its services.
    pub async fn is_installed(&self) -> Result<bool, LifecycleError> {
        if !self.paths.compose_file.exists() {
            return Ok(false);
        }
        let snapshot = self.runtime.status(&self.paths.compose_file).await?;
        Ok(!snapshot.is_empty())
    }

    /// At least one service of the stack is running.
    pub async fn is_running(&self) -> Result<bool, LifecycleError> {
        let snapshot = self.runtime.status(&self.paths.compose_file).await?;
        Ok(runtime::is_running(&snapshot))
    }

    /// Installed version, running state and per-service status in one call.
    pub async fn status(&self) -> Result<EnvironmentStatus, LifecycleError> {
        let services = self.runtime.status(&self.paths.compose_file).await?;
        Ok(EnvironmentStatus {
            installed: self.paths.compose_file.exists() && !services.is_empty(),
            running: runtime::is_running(&services),
            version: self.config.load_version()?,
            services,
        })
    }

    /// The revision recorded by the last confirmed install.
    pub fn installed_version(&self) -> Result<Option<String>, LifecycleError> {
        Ok(self.config.load_version()?)
    }

    /// Latest revision of the source repository.
    ///
    /// Resolved on first use and then reused for the lifetime of this manager; call
    /// [`Self::invalidate_revision_cache`] to force a new lookup.
    pub async fn latest_version(&self) -> Result<String, LifecycleError> {
        let mut cached = self.latest_revision.lock().await;
        if let Some(revision) = cached.as_ref() {
            return Ok(revision.clone());
        }

        let revision = self
            .source
            .resolve_latest_revision(&self.descriptor.repository_url)
            .await?;
        tracing::debug!(revision = %revision, "Resolved latest source revision");
        *cached = Some(revision.clone());
        Ok(revision)
    }

    /// Forget the memoized latest revision.
    pub async fn invalidate_revision_cache(&self) {
        self.latest_revision.lock().await.take();
    }

    /// True when nothing is installed or the installed revision is not the latest one.
    pub async fn is_update_available(&self) -> Result<bool, LifecycleError> {
        let installed = self.installed_version()?;
        let latest = self.latest_version().await?;
        Ok(installed.as_deref() != Some(latest.as_str()))
    }

    /// Fetch the source, bring the stack up and wait for the L2 contracts.
    ///
    /// The resolved revision is persisted only once the readiness wait succeeded. On
    /// failure the containers are left as they are and the call can be retried.
    pub async fn install(
        &self,
        observer: Option<TickObserver>,
        cancel: &CancellationToken,
    ) -> Result<String, LifecycleError> {
        let _guard = self.operation.lock().await;

        let revision = self.latest_version().await?;
        let source_dir = &self.paths.source_dir;
        let compose_file = &self.paths.compose_file;

        tracing::info!(
            repository = %self.descriptor.repository_url,
            revision = %revision,
            "Fetching environment source..."
        );
        self.source
            .clone_or_fetch(&self.descriptor.repository_url, source_dir)
            .await?;
        self.source.checkout(source_dir, &revision).await?;

        tracing::info!(compose_file = %compose_file.display(), "Starting containers...");
        if let Err(e) = self.runtime.up(compose_file).await {
            self.report_log_tail().await;
            return Err(e.into());
        }

        tracing::info!(
            l2_rpc_url = %self.descriptor.l2_rpc_url,
            "Waiting for L2 contracts to be deployed. This can take several minutes..."
        );
        let mut poller = ReadinessPoller::new(self.readiness);
        if let Some(observer) = observer {
            poller = poller.with_observer(observer);
        }

        let containers = &self.runtime;
        let poll = poller
            .await_readiness(
                &self.probe,
                || async move {
                    match containers.status(compose_file).await {
                        Ok(snapshot) => runtime::is_running(&snapshot),
                        Err(e) => {
                            tracing::warn!(error = %e, "Failed to query container status");
                            false
                        }
                    }
                },
                cancel,
            )
            .await;

        let state = match poll {
            Ok(state) => state,
            Err(e) => {
                if let Some(last) = poller.last_poll() {
                    tracing::warn!(
                        ticks = last.ticks,
                        elapsed_secs = last.elapsed.as_secs(),
                        terminal = %last.terminal,
                        last_error = ?last.last_error,
                        "Readiness wait failed"
                    );
                }
                self.report_log_tail().await;
                return Err(e.into());
            }
        };

        self.config.save_version(&revision)?;

        tracing::info!(
            revision = %revision,
            elapsed_secs = state.elapsed.as_secs(),
            "✓ Environment installed"
        );
        Ok(revision)
    }

    /// Re-fetch, re-up and re-await readiness. Same as [`Self::install`].
    pub async fn update(
        &self,
        observer: Option<TickObserver>,
        cancel: &CancellationToken,
    ) -> Result<String, LifecycleError> {
        self.install(observer, cancel).await
    }

    /// Bring the containers up. No-op for services already running.
    pub async fn start(&self) -> Result<(), LifecycleError> {
        let _guard = self.operation.lock().await;
        self.runtime.up(&self.paths.compose_file).await?;
        tracing::info!("Environment started");
        Ok(())
    }

    /// Stop the containers, keeping their state.
    pub async fn stop(&self) -> Result<(), LifecycleError> {
        let _guard = self.operation.lock().await;
        self.runtime.stop(&self.paths.compose_file).await?;
        tracing::info!("Environment stopped");
        Ok(())
    }

    /// Tear the containers down and remove their volumes.
    pub async fn clean(&self) -> Result<(), LifecycleError> {
        let _guard = self.operation.lock().await;
        self.runtime.down(&self.paths.compose_file).await?;
        tracing::info!("Environment cleaned");
        Ok(())
    }

    pub async fn get_logs(&self) -> Result<Vec<String>, LifecycleError> {
        Ok(self.runtime.logs(&self.paths.compose_file).await?)
    }

    pub fn get_startup_info(&self) -> StartupInfo {
        StartupInfo::new(&self.descriptor, &self.paths)
    }

    /// Log the last lines of the stack's output after a failure. Best effort.
    async fn report_log_tail(&self) {
        match self
            .runtime
            .tail_logs(&self.paths.compose_file, FAILURE_LOG_TAIL)
            .await
        {
            Ok(lines) => {
                let skip = lines.len().saturating_sub(FAILURE_LOG_TAIL);
                for line in &lines[skip..] {
                    tracing::warn!("{}", line);
                }
            }
            Err(e) => tracing::debug!(error = %e, "Could not retrieve container logs"),
        }
    }
}
