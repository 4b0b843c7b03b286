//! Per-instance control flow.
//!
//! A worker holds one concurrency permit from launch until its terminal state
//! has been reported. Every failure, panics included, ends up as that
//! instance's `Failed` state and never reaches sibling workers.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;

use futures_util::FutureExt;
use tokio::sync::Semaphore;

use crate::application::ports::{
    Clock, CommandChannel, InstanceObserver, ManagedProcess, ProcessLauncher,
};
use crate::application::services::payload::{self, PayloadReport};
use crate::application::services::readiness::{self, ReadinessPolicy};
use crate::domain::config::PayloadConfig;
use crate::domain::link;
use crate::domain::{InstanceError, InstancePlan, RunState};

/// Final result of one worker.
pub struct InstanceOutcome<P> {
    pub plan: InstancePlan,
    pub state: RunState,
    /// Present once the launch succeeded, for the retention pass.
    pub process: Option<P>,
    pub log_path: Option<PathBuf>,
    pub link: Option<String>,
}

/// Forward-only state holder that reports every transition.
struct StateTracker<'a, O> {
    plan: &'a InstancePlan,
    observer: &'a O,
    state: RunState,
}

impl<'a, O: InstanceObserver> StateTracker<'a, O> {
    fn new(plan: &'a InstancePlan, observer: &'a O) -> Self {
        observer.on_transition(plan, &RunState::Pending);
        Self {
            plan,
            observer,
            state: RunState::Pending,
        }
    }

    fn advance(&mut self, next: RunState) {
        debug_assert!(
            self.state.can_advance_to(&next),
            "{} -> {next}",
            self.state
        );
        match &next {
            RunState::Failed(reason) => tracing::warn!(%reason, "instance failed"),
            other => tracing::info!(state = other.label(), "instance state"),
        }
        self.observer.on_transition(self.plan, &next);
        self.state = next;
    }
}

/// Everything one instance needs besides its plan and the shared gate.
pub struct InstanceWorker<'a, C, L, K, O> {
    pub channel: &'a C,
    pub launcher: &'a L,
    pub clock: &'a K,
    pub observer: &'a O,
    pub readiness: ReadinessPolicy,
    pub payload: &'a PayloadConfig,
}

impl<C, L, K, O> InstanceWorker<'_, C, L, K, O>
where
    C: CommandChannel,
    L: ProcessLauncher,
    K: Clock,
    O: InstanceObserver,
{
    /// Acquire a slot, launch, wait for readiness and deliver the payload.
    ///
    /// Never fails: the outcome carries the terminal state.
    pub async fn run(&self, plan: InstancePlan, gate: &Semaphore) -> InstanceOutcome<L::Process> {
        let mut outcome = InstanceOutcome {
            plan: plan.clone(),
            state: RunState::Pending,
            process: None,
            log_path: None,
            link: None,
        };
        let mut tracker = StateTracker::new(&plan, self.observer);

        let Ok(_permit) = gate.acquire().await else {
            tracker.advance(RunState::Failed(InstanceError::GateClosed));
            outcome.state = tracker.state;
            return outcome;
        };

        tracker.advance(RunState::Launching);
        let launched = std::panic::catch_unwind(AssertUnwindSafe(|| self.launcher.launch(&plan)));
        let process = match launched {
            Ok(Ok(process)) => process,
            Ok(Err(e)) => {
                tracker.advance(RunState::Failed(InstanceError::Launch(format!("{e:#}"))));
                outcome.state = tracker.state;
                return outcome;
            }
            Err(panic) => {
                tracker.advance(RunState::Failed(InstanceError::Panicked(panic_message(
                    panic.as_ref(),
                ))));
                outcome.state = tracker.state;
                return outcome;
            }
        };
        tracing::debug!(pid = ?process.id(), log = %process.log_path().display(), "emulator started");
        outcome.log_path = Some(process.log_path().to_path_buf());
        outcome.process = Some(process);

        let driven = AssertUnwindSafe(self.drive(&plan, &mut tracker))
            .catch_unwind()
            .await;
        let terminal = match driven {
            Ok(Ok(report)) => {
                outcome.link = Some(report.link);
                RunState::Succeeded
            }
            Ok(Err(reason)) => RunState::Failed(reason),
            Err(panic) => RunState::Failed(InstanceError::Panicked(panic_message(panic.as_ref()))),
        };
        // Reported while the permit is still held.
        tracker.advance(terminal);
        outcome.state = tracker.state;
        outcome
    }

    async fn drive(
        &self,
        plan: &InstancePlan,
        tracker: &mut StateTracker<'_, O>,
    ) -> Result<PayloadReport, InstanceError> {
        let endpoint = plan.endpoint();

        tracker.advance(RunState::AwaitingEndpoint);
        readiness::wait_for_endpoint(self.channel, self.clock, &endpoint, self.readiness.discovery)
            .await?;

        tracker.advance(RunState::AwaitingReady);
        readiness::wait_for_boot(self.channel, self.clock, &endpoint, self.readiness.boot).await?;

        tracker.advance(RunState::Running);
        let user_id = link::draw_id(&self.payload.user_id_range());
        Ok(payload::deliver(self.channel, self.clock, &endpoint, self.payload, user_id).await)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
