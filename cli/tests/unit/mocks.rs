//! Shared mock infrastructure for unit tests.
//!
//! [`Emulators`] is a scripted fake of the host: an adb server answering
//! through [`AdbRunner`] and an emulator binary started through
//! [`FakeLauncher`]. Both hold the same `Rc`, so launching an instance makes
//! its endpoint appear in `adb devices`.

#![allow(dead_code, clippy::expect_used)]

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output};
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::Result;
use avdfleet_cli::application::ports::{
    Clock, CommandRunner, EnvironmentTemplater, InstanceObserver, ManagedProcess,
    ProcessLauncher, ProgressReporter,
};
use avdfleet_cli::domain::{InstancePlan, RunState, TemplateError};

// ── Cross-platform ExitStatus construction ───────────────────────────────────

#[cfg(unix)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    ExitStatus::from_raw(code << 8)
}

#[cfg(windows)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;
    #[allow(clippy::cast_sign_loss)]
    ExitStatus::from_raw(code as u32)
}

pub fn ok_output(stdout: &str) -> Output {
    Output {
        status: exit_status(0),
        stdout: stdout.as_bytes().to_vec(),
        stderr: Vec::new(),
    }
}

pub fn err_output(code: i32, stderr: &str) -> Output {
    Output {
        status: exit_status(code),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

// ── Virtual time ─────────────────────────────────────────────────────────────

/// Sleeping advances the clock instantly and yields to sibling futures.
pub struct VirtualClock {
    start: Instant,
    offset: Cell<Duration>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            offset: Cell::new(Duration::ZERO),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.offset.get()
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> Instant {
        self.start + self.offset.get()
    }

    async fn sleep(&self, duration: Duration) {
        self.offset.set(self.offset.get() + duration);
        tokio::task::yield_now().await;
    }
}

// ── Fake host ────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct Emulators {
    /// Endpoints that were live before the run.
    pub preexisting: BTreeSet<String>,
    /// Launched endpoints that never show up in `adb devices`.
    pub hidden: BTreeSet<String>,
    /// Endpoints whose `sys.boot_completed` stays `0`.
    pub never_boots: BTreeSet<String>,
    /// Identities whose launch fails.
    pub launch_fails: BTreeSet<String>,
    /// `adb devices` itself fails.
    pub devices_fails: bool,
    /// `adb emu kill` exits non-zero and leaves the emulator running.
    pub kill_fails: bool,

    /// Endpoints whose `sys.boot_completed` turns `1` only after this many
    /// queries answered `0`.
    pub slow_boot: BTreeMap<String, u32>,

    /// Endpoints whose emulator process is alive.
    pub running: RefCell<BTreeSet<String>>,
    /// Boot queries answered so far, per endpoint.
    pub boot_queries: RefCell<BTreeMap<String, u32>>,
    /// Every `adb -s` call as `"<endpoint> <args...>"`.
    pub commands: RefCell<Vec<String>>,
    /// Endpoints whose process was killed directly.
    pub killed: RefCell<Vec<String>>,
}

impl Emulators {
    pub fn running(&self) -> BTreeSet<String> {
        self.running.borrow().clone()
    }

    pub fn commands_for(&self, endpoint: &str) -> Vec<String> {
        let prefix = format!("{endpoint} ");
        self.commands
            .borrow()
            .iter()
            .filter_map(|c| c.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    fn devices(&self) -> Output {
        let mut out = String::from("List of devices attached\n");
        let running = self.running.borrow();
        let visible = self
            .preexisting
            .iter()
            .chain(running.iter().filter(|e| !self.hidden.contains(*e)));
        for serial in visible {
            out.push_str(&format!("{serial}\tdevice\n"));
        }
        ok_output(&out)
    }

    fn device_command(&self, endpoint: &str, args: &[&str]) -> Output {
        self.commands
            .borrow_mut()
            .push(format!("{endpoint} {}", args.join(" ")));
        match args {
            ["shell", "getprop", "sys.boot_completed"] => {
                let mut queries = self.boot_queries.borrow_mut();
                let asked = queries.entry(endpoint.to_string()).or_default();
                *asked += 1;
                let booting = self
                    .slow_boot
                    .get(endpoint)
                    .is_some_and(|needed| *asked <= *needed);
                if self.never_boots.contains(endpoint) || booting {
                    ok_output("0\n")
                } else {
                    ok_output("1\n")
                }
            }
            ["install", ..] => ok_output("Performing Streamed Install\nSuccess\n"),
            ["emu", "kill"] => {
                if self.kill_fails {
                    err_output(1, "error: could not connect to TCP port")
                } else {
                    self.running.borrow_mut().remove(endpoint);
                    ok_output("OK: killing emulator, bye bye\n")
                }
            }
            _ => ok_output(""),
        }
    }
}

/// `CommandRunner` answering as adb would for [`Emulators`].
pub struct AdbRunner(pub Rc<Emulators>);

impl CommandRunner for AdbRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output> {
        self.run_with_timeout(program, args, Duration::from_secs(30))
            .await
    }

    async fn run_with_timeout(&self, _: &str, args: &[&str], _: Duration) -> Result<Output> {
        match args {
            ["devices"] if self.0.devices_fails => {
                anyhow::bail!("cannot connect to daemon at tcp:5037")
            }
            ["devices"] => Ok(self.0.devices()),
            ["-s", endpoint, rest @ ..] => Ok(self.0.device_command(endpoint, rest)),
            other => anyhow::bail!("unexpected adb invocation: {other:?}"),
        }
    }
}

pub struct FakeLauncher(pub Rc<Emulators>);

impl ProcessLauncher for FakeLauncher {
    type Process = FakeEmulator;

    fn launch(&self, plan: &InstancePlan) -> Result<FakeEmulator> {
        if self.0.launch_fails.contains(&plan.identity) {
            anyhow::bail!("failed to spawn emulator: No such file or directory");
        }
        let endpoint = plan.endpoint();
        self.0.running.borrow_mut().insert(endpoint.clone());
        Ok(FakeEmulator {
            endpoint,
            log_path: PathBuf::from("logs").join(format!("{}.log", plan.identity)),
            host: Rc::clone(&self.0),
        })
    }
}

pub struct FakeEmulator {
    endpoint: String,
    log_path: PathBuf,
    host: Rc<Emulators>,
}

impl ManagedProcess for FakeEmulator {
    fn id(&self) -> Option<u32> {
        None
    }

    fn log_path(&self) -> &Path {
        &self.log_path
    }

    fn is_running(&mut self) -> bool {
        self.host.running.borrow().contains(&self.endpoint)
    }

    fn terminate(&mut self) -> Result<()> {
        self.host.running.borrow_mut().remove(&self.endpoint);
        self.host.killed.borrow_mut().push(self.endpoint.clone());
        Ok(())
    }
}

// ── Templater ────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingTemplater {
    pub conflict_on: Option<String>,
    pub made: RefCell<Vec<String>>,
}

impl EnvironmentTemplater for RecordingTemplater {
    async fn produce_fresh_copy(
        &self,
        template: &str,
        new_name: &str,
    ) -> Result<(), TemplateError> {
        if self.conflict_on.as_deref() == Some(new_name) {
            return Err(TemplateError::Conflict {
                name: new_name.to_string(),
                reason: "directory is in use".into(),
            });
        }
        self.made.borrow_mut().push(format!("{template}->{new_name}"));
        Ok(())
    }
}

// ── Reporter ─────────────────────────────────────────────────────────────────

/// Records transitions and tracks how many instances were active at once.
#[derive(Default)]
pub struct RecordingReporter {
    active: RefCell<BTreeSet<String>>,
    pub peak_active: Cell<usize>,
    pub transitions: RefCell<Vec<(String, &'static str)>>,
    pub warnings: RefCell<Vec<String>>,
}

impl RecordingReporter {
    pub fn states_of(&self, identity: &str) -> Vec<&'static str> {
        self.transitions
            .borrow()
            .iter()
            .filter(|(who, _)| who == identity)
            .map(|(_, label)| *label)
            .collect()
    }
}

impl ProgressReporter for RecordingReporter {
    fn step(&self, _: &str) {}
    fn success(&self, _: &str) {}
    fn warn(&self, message: &str) {
        self.warnings.borrow_mut().push(message.to_string());
    }
}

impl InstanceObserver for RecordingReporter {
    fn on_transition(&self, plan: &InstancePlan, state: &RunState) {
        let mut active = self.active.borrow_mut();
        if *state == RunState::Launching {
            active.insert(plan.identity.clone());
            self.peak_active
                .set(self.peak_active.get().max(active.len()));
        } else if state.is_terminal() {
            active.remove(&plan.identity);
        }
        self.transitions
            .borrow_mut()
            .push((plan.identity.clone(), state.label()));
    }
}
