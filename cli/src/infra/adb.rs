//! Infrastructure implementation of the `CommandChannel` port over adb.
//!
//! `AdbChannel<R>` routes every adb call through a `CommandRunner`, so tests
//! can inject canned output without a device or an adb server.

use std::collections::BTreeSet;
use std::time::Duration;

use crate::application::ports::{CommandChannel, CommandOutput, CommandRunner};
use crate::domain::ChannelError;
use crate::infra::command_runner::{DEFAULT_CMD_TIMEOUT, TokioCommandRunner};

/// State column of a usable device in `adb devices` output.
const READY_STATE: &str = "device";

/// Serials in the `device` state from `adb devices` output.
///
/// The header line, blank lines, and `offline`/`unauthorized` entries are
/// skipped.
#[must_use]
pub fn parse_devices(stdout: &str) -> BTreeSet<String> {
    stdout
        .lines()
        .filter(|line| !line.starts_with("List of devices"))
        .filter_map(|line| {
            let mut cols = line.split_whitespace();
            match (cols.next(), cols.next()) {
                (Some(serial), Some(READY_STATE)) => Some(serial.to_string()),
                _ => None,
            }
        })
        .collect()
}

pub struct AdbChannel<R: CommandRunner> {
    runner: R,
    adb: String,
    timeout: Duration,
}

impl<R: CommandRunner> AdbChannel<R> {
    pub fn new(runner: R, adb: impl Into<String>, timeout: Duration) -> Self {
        Self {
            runner,
            adb: adb.into(),
            timeout,
        }
    }

    async fn adb_s(
        &self,
        endpoint: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<CommandOutput, ChannelError> {
        let mut argv = Vec::with_capacity(args.len() + 2);
        argv.extend_from_slice(&["-s", endpoint]);
        argv.extend_from_slice(args);
        self.runner
            .run_with_timeout(&self.adb, &argv, timeout)
            .await
            .map(CommandOutput::from)
            .map_err(|e| ChannelError::Exec {
                endpoint: endpoint.to_string(),
                reason: format!("{e:#}"),
            })
    }
}

impl AdbChannel<TokioCommandRunner> {
    /// Convenience constructor for production use.
    #[must_use]
    pub fn default_runner(adb: impl Into<String>, timeout: Duration) -> Self {
        Self::new(TokioCommandRunner::new(DEFAULT_CMD_TIMEOUT), adb, timeout)
    }
}

impl<R: CommandRunner> CommandChannel for AdbChannel<R> {
    async fn list_live_endpoints(&self) -> Result<BTreeSet<String>, ChannelError> {
        let output = self
            .runner
            .run_with_timeout(&self.adb, &["devices"], self.timeout)
            .await
            .map_err(|e| ChannelError::Enumerate(format!("{e:#}")))?;
        if !output.status.success() {
            return Err(ChannelError::Enumerate(format!(
                "adb devices exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(parse_devices(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn execute(
        &self,
        endpoint: &str,
        args: &[&str],
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, ChannelError> {
        self.adb_s(endpoint, args, timeout.unwrap_or(self.timeout))
            .await
    }

    async fn fire_and_forget(&self, endpoint: &str, args: &[&str]) -> Result<(), ChannelError> {
        let out = self.adb_s(endpoint, args, self.timeout).await?;
        if !out.success() {
            tracing::debug!(endpoint, ?args, exit_code = ?out.exit_code, "ignored non-zero exit");
        }
        Ok(())
    }
}
