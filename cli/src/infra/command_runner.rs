//! Infrastructure implementation of the `CommandRunner` port.
//!
//! adb and emulator helpers are short-lived; every call gets a deadline and
//! an overrun child is killed rather than left behind.

use std::process::{Output, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};

use crate::application::ports::CommandRunner;

/// Default timeout for adb invocations (devices, getprop, am start).
pub const DEFAULT_CMD_TIMEOUT: Duration = Duration::from_secs(30);

/// Production `CommandRunner` backed by `tokio::process`.
pub struct TokioCommandRunner {
    timeout: Duration,
}

impl TokioCommandRunner {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TokioCommandRunner {
    fn default() -> Self {
        Self::new(DEFAULT_CMD_TIMEOUT)
    }
}

impl CommandRunner for TokioCommandRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output> {
        self.run_with_timeout(program, args, self.timeout).await
    }

    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Output> {
        let mut child = spawn_piped(program, args)?;
        if let Ok(finished) = tokio::time::timeout(timeout, collect(&mut child, program)).await {
            return finished;
        }
        // Dropping the collect future does not stop the process.
        tracing::debug!(program, pid = child.id(), "deadline passed, killing");
        if let Err(e) = child.kill().await {
            tracing::warn!(program, error = %e, "could not kill timed-out process");
        }
        anyhow::bail!("{program} timed out after {}s", timeout.as_secs())
    }
}

fn spawn_piped(program: &str, args: &[&str]) -> Result<Child> {
    tracing::trace!(program, ?args, "spawning");
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("failed to spawn {program}"))
}

/// Wait for exit while draining both pipes, so a chatty child never blocks
/// on a full pipe buffer.
async fn collect(child: &mut Child, program: &str) -> Result<Output> {
    let (stdout, stderr) = (child.stdout.take(), child.stderr.take());
    let (status, stdout, stderr) = tokio::join!(child.wait(), drain(stdout), drain(stderr));
    Ok(Output {
        status: status.with_context(|| format!("waiting for {program}"))?,
        stdout,
        stderr,
    })
}

async fn drain(pipe: Option<impl AsyncRead + Unpin>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        // Partial output is still useful for diagnostics.
        let _ = pipe.read_to_end(&mut buf).await;
    }
    buf
}
