//! Readiness polling: waits for the L2 bootstrap to deploy its main contract.
//!
//! The poller probes the L2 RPC endpoint on a fixed interval and, after every probe,
//! asks whether the environment is still running. It resolves on the first tick where
//! the probe reports a deployed contract, and fails on the first tick where the
//! environment is no longer running, whichever the probe said on that tick.

use std::{future::Future, time::Duration};

use tokio_util::sync::CancellationToken;
use url::Url;

use crate::{
    error::DeploymentFailed,
    rpc::{self, ProbeOutcome},
};

/// Default interval between two probes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Something that can be asked whether the main contract is deployed.
pub trait ContractProbe: Send + Sync {
    /// Issue one probe and classify it. Never fails: errors are [`ProbeOutcome::NotReady`].
    fn probe(&self) -> impl Future<Output = ProbeOutcome> + Send;
}

/// Probes the L2 JSON-RPC endpoint over HTTP.
#[derive(Debug, Clone)]
pub struct HttpContractProbe {
    client: reqwest::Client,
    url: Url,
}

impl HttpContractProbe {
    pub fn new(url: Url) -> Result<Self, anyhow::Error> {
        Ok(Self {
            client: rpc::create_client()?,
            url,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl ContractProbe for HttpContractProbe {
    async fn probe(&self) -> ProbeOutcome {
        rpc::probe_main_contract(&self.client, self.url.as_str()).await
    }
}

/// Tuning knobs for the readiness wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessConfig {
    /// Interval between two probes.
    pub poll_interval: Duration,
    /// Optional bound on the whole wait. `None` waits until success or crash.
    pub max_wait: Option<Duration>,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_wait: None,
        }
    }
}

/// Terminal classification of a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum PollTerminal {
    Pending,
    Succeeded,
    FailedCrashed,
    FailedError,
}

/// State of one in-flight readiness wait. Owned by a single `await_readiness` call.
#[derive(Debug, Clone, PartialEq)]
pub struct PollState {
    /// Number of completed ticks.
    pub ticks: u64,
    /// Elapsed wait time, `ticks * poll_interval`.
    pub elapsed: Duration,
    /// Reason reported by the most recent not-ready probe.
    pub last_error: Option<String>,
    pub terminal: PollTerminal,
}

impl PollState {
    fn new() -> Self {
        Self {
            ticks: 0,
            elapsed: Duration::ZERO,
            last_error: None,
            terminal: PollTerminal::Pending,
        }
    }
}

/// What the observer sees once per tick.
#[derive(Debug)]
pub struct TickReport<'a> {
    pub tick: u64,
    pub elapsed: Duration,
    pub probe: &'a ProbeOutcome,
    pub environment_running: bool,
}

/// Per-tick progress callback. Purely observational.
pub type TickObserver = Box<dyn FnMut(&TickReport<'_>) + Send>;

/// Drives the readiness loop.
pub struct ReadinessPoller {
    config: ReadinessConfig,
    observer: Option<TickObserver>,
    /// Final state of the last wait, failures included.
    last_poll: Option<PollState>,
}

impl ReadinessPoller {
    pub fn new(config: ReadinessConfig) -> Self {
        Self {
            config,
            observer: None,
            last_poll: None,
        }
    }

    /// Attach a per-tick progress observer.
    pub fn with_observer(mut self, observer: TickObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// The terminal [`PollState`] of the last `await_readiness` call, if it returned.
    pub fn last_poll(&self) -> Option<&PollState> {
        self.last_poll.as_ref()
    }

    /// Wait until `probe` reports a deployed contract.
    ///
    /// Ticks are strictly sequential: each waits one interval, probes, then calls
    /// `is_environment_running`. Returns the final [`PollState`] on success, or
    /// - [`DeploymentFailed::EnvironmentStoppedUnexpectedly`] as soon as the running
    ///   check reports false,
    /// - [`DeploymentFailed::TimedOut`] once `max_wait` is reached,
    /// - [`DeploymentFailed::Cancelled`] when `cancel` fires.
    ///
    /// The terminal state of a failed wait stays available through [`Self::last_poll`].
    pub async fn await_readiness<P, F, Fut>(
        &mut self,
        probe: &P,
        mut is_environment_running: F,
        cancel: &CancellationToken,
    ) -> Result<PollState, DeploymentFailed>
    where
        P: ContractProbe,
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        let mut state = PollState::new();
        self.last_poll = None;

        loop {
            let cancelled = tokio::select! {
                _ = cancel.cancelled() => true,
                _ = tokio::time::sleep(self.config.poll_interval) => false,
            };
            if cancelled {
                return Err(self.cancelled(state));
            }

            let outcome = tokio::select! {
                _ = cancel.cancelled() => None,
                outcome = probe.probe() => Some(outcome),
            };
            let Some(outcome) = outcome else {
                return Err(self.cancelled(state));
            };

            state.ticks += 1;
            state.elapsed = self
                .config
                .poll_interval
                .saturating_mul(u32::try_from(state.ticks).unwrap_or(u32::MAX));

            if let ProbeOutcome::NotReady(reason) = &outcome {
                tracing::trace!(
                    tick = state.ticks,
                    reason = %reason,
                    "Main contract not deployed yet"
                );
                state.last_error = Some(reason.clone());
            }

            let environment_running = is_environment_running().await;

            if let Some(observer) = self.observer.as_mut() {
                observer(&TickReport {
                    tick: state.ticks,
                    elapsed: state.elapsed,
                    probe: &outcome,
                    environment_running,
                });
            }

            if !environment_running {
                tracing::warn!(
                    elapsed_secs = state.elapsed.as_secs(),
                    last_error = ?state.last_error,
                    "Environment stopped while waiting for contract deployment"
                );
                self.settle(state, PollTerminal::FailedCrashed);
                return Err(DeploymentFailed::EnvironmentStoppedUnexpectedly);
            }

            if let ProbeOutcome::Ready(contract) = &outcome {
                tracing::debug!(
                    %contract,
                    elapsed_secs = state.elapsed.as_secs(),
                    "Main contract deployed"
                );
                return Ok(self.settle(state, PollTerminal::Succeeded));
            }

            if let Some(max_wait) = self.config.max_wait
                && state.elapsed >= max_wait
            {
                let state = self.settle(state, PollTerminal::FailedError);
                return Err(DeploymentFailed::TimedOut {
                    elapsed: state.elapsed,
                });
            }
        }
    }

    fn cancelled(&mut self, state: PollState) -> DeploymentFailed {
        tracing::debug!(ticks = state.ticks, "Readiness wait cancelled");
        self.settle(state, PollTerminal::FailedError);
        DeploymentFailed::Cancelled
    }

    fn settle(&mut self, mut state: PollState, terminal: PollTerminal) -> PollState {
        state.terminal = terminal;
        self.last_poll = Some(state.clone());
        state
    }
}
