//! Fleet orchestration: prepare every instance, run the workers under a
//! concurrency limit and apply the retention policy.
//!
//! Imports only from `crate::domain` and `crate::application`.

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::Instrument;

use crate::application::ports::{
    Clock, CommandChannel, EnvironmentTemplater, InstanceObserver, ManagedProcess,
    ProcessLauncher, ProgressReporter,
};
use crate::application::services::readiness::ReadinessPolicy;
use crate::application::services::worker::{InstanceOutcome, InstanceWorker};
use crate::domain::config::MAX_CONCURRENCY;
use crate::domain::plan::{self, PortRange};
use crate::domain::{AllocationError, FleetConfig, InstancePlan, Retention, RunState};

/// One line of the run summary.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceReport {
    pub identity: String,
    pub port: u16,
    pub endpoint: String,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip)]
    pub state: RunState,
}

/// Terminal state of every instance in a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub instances: Vec<InstanceReport>,
}

impl RunSummary {
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.instances
            .iter()
            .filter(|i| i.state == RunState::Succeeded)
            .count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.instances.len() - self.succeeded()
    }
}

impl<P> From<&InstanceOutcome<P>> for InstanceReport {
    fn from(outcome: &InstanceOutcome<P>) -> Self {
        let reason = match &outcome.state {
            RunState::Failed(e) => Some(e.to_string()),
            _ => None,
        };
        Self {
            identity: outcome.plan.identity.clone(),
            port: outcome.plan.port,
            endpoint: outcome.plan.endpoint(),
            outcome: outcome.state.label(),
            reason,
            log_path: outcome.log_path.clone(),
            link: outcome.link.clone(),
            state: outcome.state.clone(),
        }
    }
}

/// Endpoints that are live right now.
///
/// An unreachable device list counts as "nothing live": allocation then
/// starts at the first port of the range.
pub async fn live_snapshot(
    channel: &impl CommandChannel,
    reporter: &impl ProgressReporter,
) -> BTreeSet<String> {
    match channel.list_live_endpoints().await {
        Ok(live) => live,
        Err(e) => {
            tracing::warn!(error = %e, "device list unavailable, assuming no live endpoints");
            reporter.warn(&format!("{e}; assuming no emulators are running"));
            BTreeSet::new()
        }
    }
}

/// Allocate identities and ports against a fresh snapshot, without cloning
/// or launching anything.
///
/// # Errors
///
/// Returns `NoInstances` or `ResourceExhausted`.
pub async fn plan_only(
    channel: &impl CommandChannel,
    reporter: &impl ProgressReporter,
    template: &str,
    total: usize,
    ports: PortRange,
) -> Result<Vec<InstancePlan>, AllocationError> {
    if total == 0 {
        return Err(AllocationError::NoInstances);
    }
    let live = live_snapshot(channel, reporter).await;
    plan::allocate(template, total, &live, ports)
}

/// The collaborators and settings of one run.
pub struct Fleet<'a, C, T, L, K, R> {
    pub channel: &'a C,
    pub templater: &'a T,
    pub launcher: &'a L,
    pub clock: &'a K,
    pub reporter: &'a R,
    pub config: &'a FleetConfig,
    pub ports: PortRange,
}

impl<C, T, L, K, R> Fleet<'_, C, T, L, K, R>
where
    C: CommandChannel,
    T: EnvironmentTemplater,
    L: ProcessLauncher,
    K: Clock,
    R: ProgressReporter + InstanceObserver,
{
    /// Produce a fresh copy per instance, then reserve ports.
    ///
    /// Copies are made one at a time; nothing is launched here.
    ///
    /// # Errors
    ///
    /// Returns an error if `total` is zero, a copy cannot be made, or the
    /// port range is exhausted.
    pub async fn prepare(&self, total: usize) -> Result<Vec<InstancePlan>> {
        if total == 0 {
            return Err(AllocationError::NoInstances.into());
        }
        let base = &self.config.template.base;
        for name in plan::identities(base, total) {
            self.reporter.step(&format!("creating {name} from {base}"));
            self.templater
                .produce_fresh_copy(base, &name)
                .await
                .with_context(|| format!("preparing {name}"))?;
            tracing::info!(instance = %name, "fresh copy ready");
        }
        self.reporter
            .success(&format!("{total} fresh cop{} ready", if total == 1 { "y" } else { "ies" }));

        let live = live_snapshot(self.channel, self.reporter).await;
        let plans = plan::allocate(base, total, &live, self.ports)?;
        for p in &plans {
            tracing::debug!(instance = %p.identity, port = p.port, "port reserved");
        }
        Ok(plans)
    }

    /// Run one worker per plan and wait until all are terminal.
    ///
    /// Worker `i` starts `i` stagger intervals after the first.
    pub async fn execute(&self, plans: Vec<InstancePlan>) -> Vec<InstanceOutcome<L::Process>> {
        let gate = Semaphore::new(self.config.scheduling.concurrency.clamp(1, MAX_CONCURRENCY));
        let stagger = self.config.scheduling.launch_stagger();
        let payload = &self.config.payload;
        let worker = InstanceWorker {
            channel: self.channel,
            launcher: self.launcher,
            clock: self.clock,
            observer: self.reporter,
            readiness: ReadinessPolicy::from(&self.config.readiness),
            payload,
        };

        let runs = plans.into_iter().enumerate().map(|(i, plan)| {
            let span = tracing::info_span!("instance", instance = %plan.identity, port = plan.port);
            let worker = &worker;
            let gate = &gate;
            async move {
                let delay = stagger.saturating_mul(u32::try_from(i).unwrap_or(u32::MAX));
                if !delay.is_zero() {
                    self.clock.sleep(delay).await;
                }
                worker.run(plan, gate).await
            }
            .instrument(span)
        });
        join_all(runs).await
    }

    /// Apply the configured retention policy to every launched process.
    pub async fn retain(&self, outcomes: &mut [InstanceOutcome<L::Process>]) {
        if self.config.scheduling.retention == Retention::Keep {
            let kept = outcomes.iter().filter(|o| o.process.is_some()).count();
            tracing::info!(kept, "leaving emulators running");
            return;
        }
        for outcome in outcomes.iter_mut() {
            let Some(process) = outcome.process.as_mut() else {
                continue;
            };
            if !process.is_running() {
                continue;
            }
            let endpoint = outcome.plan.endpoint();
            match self.channel.execute(&endpoint, &["emu", "kill"], None).await {
                Ok(out) if out.success() => {
                    tracing::info!(endpoint = %endpoint, "emulator asked to exit");
                }
                other => {
                    if let Err(e) = &other {
                        tracing::debug!(endpoint = %endpoint, error = %e, "emu kill failed");
                    }
                    if let Err(e) = process.terminate() {
                        tracing::warn!(endpoint = %endpoint, error = %e, "could not kill emulator");
                        self.reporter
                            .warn(&format!("could not stop {endpoint}: {e}"));
                    } else {
                        tracing::info!(endpoint = %endpoint, "emulator process killed");
                    }
                }
            }
        }
    }

    /// Prepare, execute and retain.
    ///
    /// Instance failures are part of the summary, not errors.
    ///
    /// # Errors
    ///
    /// Returns an error only when preparation fails, before any launch.
    pub async fn run(&self, total: usize) -> Result<RunSummary> {
        let started_at = Utc::now();
        let plans = self.prepare(total).await?;
        let mut outcomes = self.execute(plans).await;
        self.retain(&mut outcomes).await;
        let summary = RunSummary {
            started_at,
            finished_at: Utc::now(),
            instances: outcomes.iter().map(InstanceReport::from).collect(),
        };
        tracing::info!(
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            "run finished"
        );
        Ok(summary)
    }
}
