//! Per-instance run state.
//!
//! Owned by exactly one worker; the state only ever moves forward.

use std::fmt;

use crate::domain::error::InstanceError;

/// Lifecycle stage of one instance within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Pending,
    Launching,
    AwaitingEndpoint,
    AwaitingReady,
    Running,
    Succeeded,
    Failed(InstanceError),
}

impl RunState {
    fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Launching => 1,
            Self::AwaitingEndpoint => 2,
            Self::AwaitingReady => 3,
            Self::Running => 4,
            Self::Succeeded | Self::Failed(_) => 5,
        }
    }

    /// `Succeeded` or `Failed`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.rank() == 5
    }

    /// Holding a concurrency slot: launched and not yet terminal.
    #[must_use]
    pub fn is_active(&self) -> bool {
        (1..5).contains(&self.rank())
    }

    /// Whether moving to `next` keeps the state monotonic.
    #[must_use]
    pub fn can_advance_to(&self, next: &RunState) -> bool {
        next.rank() > self.rank()
    }

    /// Short lowercase label used in logs and JSON.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Launching => "launching",
            Self::AwaitingEndpoint => "awaiting-endpoint",
            Self::AwaitingReady => "awaiting-ready",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(reason) => write!(f, "failed: {reason}"),
            other => f.write_str(other.label()),
        }
    }
}
