//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain`; never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::domain::{ChannelError, FleetConfig, InstancePlan, RunState, TemplateError};

// ── Value Types ───────────────────────────────────────────────────────────────

/// Captured result of a command executed against an endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    /// Exit code zero.
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        }
    }
}

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts process execution so infrastructure can be swapped or mocked.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program and capture its output.
    ///
    /// Implementations should delegate to `run_with_timeout` using the
    /// instance's configured default timeout.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output>;
    /// Run a program with a custom timeout override.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds `timeout`.
    /// On timeout, the child process must be killed (not left orphaned).
    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Output>;
}

// ── Command Channel Port ──────────────────────────────────────────────────────

/// Request/response command execution against device endpoints.
#[allow(async_fn_in_trait)]
pub trait CommandChannel {
    /// Serials of every endpoint currently in the `device` state.
    ///
    /// A fresh snapshot on every call; implementations must not cache.
    async fn list_live_endpoints(&self) -> Result<BTreeSet<String>, ChannelError>;

    /// Execute `args` against `endpoint` and capture the output.
    ///
    /// `timeout` overrides the channel's default when set. A non-zero exit
    /// code is returned as output, not as an error.
    async fn execute(
        &self,
        endpoint: &str,
        args: &[&str],
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, ChannelError>;

    /// Execute `args` against `endpoint` without inspecting the result.
    async fn fire_and_forget(&self, endpoint: &str, args: &[&str]) -> Result<(), ChannelError>;
}

// ── Environment Ports ─────────────────────────────────────────────────────────

/// Produces a ready-to-start environment copy from a template.
#[allow(async_fn_in_trait)]
pub trait EnvironmentTemplater {
    /// Replace any stale `new_name` with a fresh copy of `template`.
    ///
    /// Idempotent: calling it again yields the same fresh copy.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` when a stale copy cannot be removed.
    async fn produce_fresh_copy(
        &self,
        template: &str,
        new_name: &str,
    ) -> Result<(), TemplateError>;
}

/// Handle on a launched environment process.
pub trait ManagedProcess {
    /// OS process id, when known.
    fn id(&self) -> Option<u32>;
    /// File receiving the process's stdout and stderr.
    fn log_path(&self) -> &Path;
    /// Whether the process has not exited yet.
    fn is_running(&mut self) -> bool;
    /// Send a direct termination signal.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal cannot be delivered.
    fn terminate(&mut self) -> Result<()>;
}

/// Starts the environment process for one instance.
pub trait ProcessLauncher {
    type Process: ManagedProcess;

    /// Start the instance described by `plan`, redirecting its output to a
    /// per-instance log file.
    ///
    /// # Errors
    ///
    /// Returns an error if the log file cannot be opened or the process
    /// cannot be spawned.
    fn launch(&self, plan: &InstancePlan) -> Result<Self::Process>;
}

// ── Time Port ─────────────────────────────────────────────────────────────────

/// Monotonic time source. Injected so polling can run on virtual time in tests.
#[allow(async_fn_in_trait)]
pub trait Clock {
    fn now(&self) -> Instant;
    async fn sleep(&self, duration: Duration);
}

// ── Progress Reporting Ports ──────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait; no async needed.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}

/// Receives every state change of every instance.
///
/// Called from the owning worker only; terminal states are delivered before
/// the worker's concurrency slot is released.
pub trait InstanceObserver {
    fn on_transition(&self, plan: &InstancePlan, state: &RunState);
}

// ── Config Port ───────────────────────────────────────────────────────────────

/// Abstracts configuration persistence.
pub trait ConfigStore {
    /// Load the configuration, falling back to defaults when none is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored file cannot be read or parsed.
    fn load(&self) -> Result<FleetConfig>;
    /// Persist the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    fn save(&self, config: &FleetConfig) -> Result<()>;
    /// Location of the configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if no location can be determined.
    fn path(&self) -> Result<PathBuf>;
}
