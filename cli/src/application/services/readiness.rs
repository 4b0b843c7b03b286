//! Readiness waiting: endpoint discovery and boot completion.
//!
//! Both phases are bounded polls driven by an injected [`Clock`]. Channel
//! errors during a poll are treated as "not ready yet", never as failure.

use std::future::Future;
use std::time::Duration;

use crate::application::ports::{Clock, CommandChannel};
use crate::domain::ReadinessError;
use crate::domain::config::ReadinessConfig;

/// Property reporting boot completion.
pub const BOOT_COMPLETED_PROP: &str = "sys.boot_completed";
/// Value of [`BOOT_COMPLETED_PROP`] once the guest has booted.
pub const BOOT_COMPLETED_VALUE: &str = "1";

/// Interval and deadline of one bounded poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

/// A poll ran out of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTimeout {
    pub waited: Duration,
    pub attempts: u32,
}

/// Deadlines for both readiness phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    pub discovery: PollPolicy,
    pub boot: PollPolicy,
}

impl From<&ReadinessConfig> for ReadinessPolicy {
    fn from(cfg: &ReadinessConfig) -> Self {
        Self {
            discovery: PollPolicy {
                interval: cfg.poll_interval(),
                timeout: cfg.discovery_timeout(),
            },
            boot: PollPolicy {
                interval: cfg.poll_interval(),
                timeout: cfg.boot_timeout(),
            },
        }
    }
}

/// Run `probe` every `policy.interval` until it yields a value or
/// `policy.timeout` has elapsed since the first attempt.
///
/// The deadline is checked before each attempt, so a probe is never started
/// after the deadline. `probe` receives the 1-based attempt number.
///
/// # Errors
///
/// Returns [`PollTimeout`] when the deadline passes without a value.
pub async fn poll_until<T, F, Fut>(
    clock: &impl Clock,
    policy: PollPolicy,
    mut probe: F,
) -> Result<T, PollTimeout>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let started = clock.now();
    let mut attempts = 0u32;
    loop {
        let waited = clock.now().saturating_duration_since(started);
        if waited >= policy.timeout {
            return Err(PollTimeout { waited, attempts });
        }
        attempts += 1;
        if let Some(value) = probe(attempts).await {
            return Ok(value);
        }
        clock.sleep(policy.interval).await;
    }
}

/// Wait until `endpoint` appears in the channel's live device list.
///
/// # Errors
///
/// Returns [`ReadinessError::DiscoveryTimeout`] if it never shows up.
pub async fn wait_for_endpoint(
    channel: &impl CommandChannel,
    clock: &impl Clock,
    endpoint: &str,
    policy: PollPolicy,
) -> Result<(), ReadinessError> {
    poll_until(clock, policy, |attempt| async move {
        match channel.list_live_endpoints().await {
            Ok(live) if live.contains(endpoint) => Some(()),
            Ok(_) => {
                tracing::debug!(endpoint, attempt, "endpoint not listed yet");
                None
            }
            Err(e) => {
                tracing::debug!(endpoint, attempt, error = %e, "device list unavailable");
                None
            }
        }
    })
    .await
    .map_err(|t| ReadinessError::DiscoveryTimeout {
        endpoint: endpoint.to_string(),
        waited: t.waited,
    })
}

/// Wait until the guest on `endpoint` reports boot completion.
///
/// # Errors
///
/// Returns [`ReadinessError::BootTimeout`] if boot never completes.
pub async fn wait_for_boot(
    channel: &impl CommandChannel,
    clock: &impl Clock,
    endpoint: &str,
    policy: PollPolicy,
) -> Result<(), ReadinessError> {
    poll_until(clock, policy, |attempt| async move {
        match channel
            .execute(endpoint, &["shell", "getprop", BOOT_COMPLETED_PROP], None)
            .await
        {
            Ok(out) if out.success() && out.stdout.trim() == BOOT_COMPLETED_VALUE => Some(()),
            Ok(out) => {
                tracing::debug!(endpoint, attempt, value = out.stdout.trim(), "still booting");
                None
            }
            Err(e) => {
                tracing::debug!(endpoint, attempt, error = %e, "boot query failed");
                None
            }
        }
    })
    .await
    .map_err(|t| ReadinessError::BootTimeout {
        endpoint: endpoint.to_string(),
        waited: t.waited,
    })
}
