//! Infrastructure implementation of the `ProcessLauncher` port: detached
//! emulator processes with their output appended to a per-instance log.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use anyhow::{Context, Result};

use crate::application::ports::{ManagedProcess, ProcessLauncher};
use crate::domain::InstancePlan;
use crate::domain::config::ToolsConfig;

/// `-avd <name> -port <port>` followed by the configured extra flags.
#[must_use]
pub fn emulator_args(name: &str, port: u16, extra: &[String]) -> Vec<String> {
    let mut args = vec![
        "-avd".to_string(),
        name.to_string(),
        "-port".to_string(),
        port.to_string(),
    ];
    args.extend(extra.iter().cloned());
    args
}

pub struct EmulatorLauncher {
    program: String,
    extra_args: Vec<String>,
    log_dir: PathBuf,
}

impl EmulatorLauncher {
    #[must_use]
    pub fn new(program: impl Into<String>, extra_args: Vec<String>, log_dir: PathBuf) -> Self {
        Self {
            program: program.into(),
            extra_args,
            log_dir,
        }
    }

    #[must_use]
    pub fn from_tools(tools: &ToolsConfig) -> Self {
        Self::new(
            tools.emulator.clone(),
            tools.emulator_args.clone(),
            tools.log_dir.clone(),
        )
    }

    #[must_use]
    pub fn log_path(&self, identity: &str) -> PathBuf {
        self.log_dir.join(format!("{identity}.log"))
    }

    fn open_log(&self, identity: &str) -> Result<(File, PathBuf)> {
        std::fs::create_dir_all(&self.log_dir)
            .with_context(|| format!("creating log dir {}", self.log_dir.display()))?;
        let path = self.log_path(identity);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening {}", path.display()))?;
        Ok((file, path))
    }
}

impl ProcessLauncher for EmulatorLauncher {
    type Process = EmulatorProcess;

    fn launch(&self, plan: &InstancePlan) -> Result<EmulatorProcess> {
        let args = emulator_args(&plan.identity, plan.port, &self.extra_args);
        let (mut log, log_path) = self.open_log(&plan.identity)?;
        writeln!(
            log,
            "==== {} {} {}",
            chrono::Local::now().to_rfc3339(),
            self.program,
            args.join(" ")
        )
        .with_context(|| format!("writing {}", log_path.display()))?;

        let stderr = log.try_clone().context("duplicating log handle")?;
        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(stderr))
            .spawn()
            .with_context(|| format!("failed to spawn {}", self.program))?;
        tracing::info!(pid = child.id(), log = %log_path.display(), "emulator launched");
        Ok(EmulatorProcess { child, log_path })
    }
}

/// A running emulator. Dropping the handle leaves the process running.
pub struct EmulatorProcess {
    child: Child,
    log_path: PathBuf,
}

impl ManagedProcess for EmulatorProcess {
    fn id(&self) -> Option<u32> {
        Some(self.child.id())
    }

    fn log_path(&self) -> &Path {
        &self.log_path
    }

    fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    fn terminate(&mut self) -> Result<()> {
        self.child
            .kill()
            .with_context(|| format!("killing emulator pid {}", self.child.id()))?;
        let _ = self.child.wait();
        Ok(())
    }
}
