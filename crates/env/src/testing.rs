//! Scripted collaborators for unit tests.

use std::{
    collections::VecDeque,
    path::Path,
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};

use crate::{
    config::ConfigStore,
    error::{ConfigError, FetchError, RuntimeError},
    readiness::ContractProbe,
    rpc::ProbeOutcome,
    runtime::{ContainerRuntime, ContainerStatusSnapshot, ServiceStatus},
    source::SourceFetcher,
};

/// Replays a fixed sequence of probe outcomes, repeating the last one forever.
pub struct ScriptedProbe {
    script: Mutex<VecDeque<ProbeOutcome>>,
    last: Mutex<Option<ProbeOutcome>>,
    calls: AtomicU64,
}

impl ScriptedProbe {
    pub fn new(script: Vec<ProbeOutcome>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            calls: AtomicU64::new(0),
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ContractProbe for ScriptedProbe {
    async fn probe(&self) -> ProbeOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.script.lock().unwrap().pop_front() {
            *last = Some(next);
        }
        last.clone()
            .unwrap_or_else(|| ProbeOutcome::NotReady("empty script".to_string()))
    }
}

/// Calls observed by [`FakeRuntime`], in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeCall {
    UpStarted,
    UpFinished,
    Stop,
    Down,
    Status,
    Logs,
    TailLogs(usize),
}

/// In-memory compose stack. `up` starts every service, `stop` stops them, `down` removes them.
pub struct FakeRuntime {
    service_names: Vec<String>,
    services: Mutex<ContainerStatusSnapshot>,
    calls: Mutex<Vec<RuntimeCall>>,
    fail_up: AtomicBool,
    up_delay: Duration,
    /// Status calls left before every service is reported stopped.
    crash_after: Mutex<Option<usize>>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self {
            service_names: vec![
                "postgres".to_string(),
                "reth".to_string(),
                "zksync".to_string(),
            ],
            services: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            fail_up: AtomicBool::new(false),
            up_delay: Duration::ZERO,
            crash_after: Mutex::new(None),
        }
    }

    /// Make `up` take `delay` before completing.
    pub fn with_up_delay(mut self, delay: Duration) -> Self {
        self.up_delay = delay;
        self
    }

    pub fn fail_up(&self) {
        self.fail_up.store(true, Ordering::SeqCst);
    }

    /// Report every service stopped once `calls` more status queries have been answered.
    pub fn crash_after(&self, calls: usize) {
        *self.crash_after.lock().unwrap() = Some(calls);
    }

    /// Pretend the stack exists with the given running state.
    pub fn set_services(&self, running: bool) {
        *self.services.lock().unwrap() = self
            .service_names
            .iter()
            .map(|name| ServiceStatus::new(name.clone(), running))
            .collect();
    }

    pub fn calls(&self) -> Vec<RuntimeCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: RuntimeCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl ContainerRuntime for FakeRuntime {
    async fn up(&self, _definition: &Path) -> Result<(), RuntimeError> {
        self.record(RuntimeCall::UpStarted);
        tokio::time::sleep(self.up_delay).await;

        if self.fail_up.load(Ordering::SeqCst) {
            self.record(RuntimeCall::UpFinished);
            return Err(RuntimeError::Command {
                command: "docker compose up --detach".to_string(),
                stderr: "Cannot connect to the Docker daemon".to_string(),
            });
        }

        self.set_services(true);
        self.record(RuntimeCall::UpFinished);
        Ok(())
    }

    async fn stop(&self, _definition: &Path) -> Result<(), RuntimeError> {
        self.record(RuntimeCall::Stop);
        let mut services = self.services.lock().unwrap();
        services.iter_mut().for_each(|service| service.is_running = false);
        Ok(())
    }

    async fn down(&self, _definition: &Path) -> Result<(), RuntimeError> {
        self.record(RuntimeCall::Down);
        self.services.lock().unwrap().clear();
        Ok(())
    }

    async fn status(&self, _definition: &Path) -> Result<ContainerStatusSnapshot, RuntimeError> {
        self.record(RuntimeCall::Status);

        let mut crash_after = self.crash_after.lock().unwrap();
        if let Some(remaining) = crash_after.as_mut() {
            if *remaining == 0 {
                let mut services = self.services.lock().unwrap();
                services.iter_mut().for_each(|service| service.is_running = false);
            } else {
                *remaining -= 1;
            }
        }

        Ok(self.services.lock().unwrap().clone())
    }

    async fn logs(&self, _definition: &Path) -> Result<Vec<String>, RuntimeError> {
        self.record(RuntimeCall::Logs);
        Ok(vec!["zksync-1  | waiting for L1".to_string()])
    }

    async fn tail_logs(
        &self,
        _definition: &Path,
        lines: usize,
    ) -> Result<Vec<String>, RuntimeError> {
        self.record(RuntimeCall::TailLogs(lines));
        Ok(vec!["zksync-1  | waiting for L1".to_string()])
    }
}

/// Source fetcher that writes a compose file into the destination.
pub struct FakeSource {
    revision: Mutex<String>,
    resolve_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    checkouts: Mutex<Vec<String>>,
    fail_fetch: AtomicBool,
}

impl FakeSource {
    pub fn new(revision: &str) -> Self {
        Self {
            revision: Mutex::new(revision.to_string()),
            resolve_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            checkouts: Mutex::new(Vec::new()),
            fail_fetch: AtomicBool::new(false),
        }
    }

    /// Change the revision the remote advertises.
    pub fn publish(&self, revision: &str) {
        *self.revision.lock().unwrap() = revision.to_string();
    }

    pub fn fail_fetch(&self) {
        self.fail_fetch.store(true, Ordering::SeqCst);
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn checkouts(&self) -> Vec<String> {
        self.checkouts.lock().unwrap().clone()
    }
}

impl SourceFetcher for FakeSource {
    async fn clone_or_fetch(
        &self,
        repository_url: &str,
        destination: &Path,
    ) -> Result<(), FetchError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(FetchError::Command {
                command: format!("git clone {}", repository_url),
                stderr: "Could not resolve host: github.com".to_string(),
            });
        }

        std::fs::create_dir_all(destination).map_err(|e| FetchError::Destination {
            path: destination.to_path_buf(),
            reason: e.to_string(),
        })?;
        std::fs::write(destination.join("docker-compose.yml"), "services: {}\n").map_err(|e| {
            FetchError::Destination {
                path: destination.to_path_buf(),
                reason: e.to_string(),
            }
        })?;
        Ok(())
    }

    async fn checkout(&self, _destination: &Path, revision: &str) -> Result<(), FetchError> {
        self.checkouts.lock().unwrap().push(revision.to_string());
        Ok(())
    }

    async fn resolve_latest_revision(&self, _repository: &str) -> Result<String, FetchError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.revision.lock().unwrap().clone())
    }
}

/// Config store kept in memory.
#[derive(Default)]
pub struct MemoryConfigStore {
    version: Mutex<Option<String>>,
    saves: AtomicUsize,
}

impl MemoryConfigStore {
    pub fn with_version(version: &str) -> Self {
        Self {
            version: Mutex::new(Some(version.to_string())),
            saves: AtomicUsize::new(0),
        }
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load_version(&self) -> Result<Option<String>, ConfigError> {
        Ok(self.version.lock().unwrap().clone())
    }

    fn save_version(&self, version: &str) -> Result<(), ConfigError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.version.lock().unwrap() = Some(version.to_string());
        Ok(())
    }
}
