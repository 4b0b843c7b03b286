//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use std::time::Duration;

use thiserror::Error;

// ── Allocation errors ─────────────────────────────────────────────────────────

/// Errors raised while reserving identities and ports for a run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    #[error("At least 1 instance is required.")]
    NoInstances,

    #[error(
        "No free emulator port in {first}..={last}: {allocated} of {requested} instance(s) allocated."
    )]
    ResourceExhausted {
        first: u16,
        last: u16,
        requested: usize,
        allocated: usize,
    },
}

// ── Template errors ───────────────────────────────────────────────────────────

/// Errors produced while creating a fresh copy of the base environment.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Base AVD '{name}' not found in {home}")]
    BaseMissing { name: String, home: String },

    #[error("Cannot remove stale copy '{name}': {reason}")]
    Conflict { name: String, reason: String },

    #[error("Invalid AVD name '{0}': must match ^[A-Za-z0-9._-]+$")]
    InvalidName(String),

    #[error("Cloning '{name}' failed: {reason}")]
    Io { name: String, reason: String },
}

// ── Command channel errors ────────────────────────────────────────────────────

/// Failures at the command channel boundary.
///
/// A non-zero exit code is not a channel error; it is carried in the
/// command output and classified by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("cannot enumerate devices: {0}")]
    Enumerate(String),

    #[error("command on {endpoint} failed: {reason}")]
    Exec { endpoint: String, reason: String },
}

// ── Readiness errors ──────────────────────────────────────────────────────────

/// Timeouts raised by the two readiness phases.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadinessError {
    #[error("{endpoint} did not appear in the device list within {}s", waited.as_secs())]
    DiscoveryTimeout { endpoint: String, waited: Duration },

    #[error("{endpoint} did not finish booting within {}s", waited.as_secs())]
    BootTimeout { endpoint: String, waited: Duration },
}

// ── Instance errors ───────────────────────────────────────────────────────────

/// Reason an instance reached the `Failed` terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstanceError {
    #[error("concurrency gate closed before a slot was granted")]
    GateClosed,

    #[error("failed to launch emulator: {0}")]
    Launch(String),

    #[error(transparent)]
    Readiness(#[from] ReadinessError),

    #[error("worker panicked: {0}")]
    Panicked(String),
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors related to configuration key/value validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown setting: {key}\n\nValid settings: {valid}")]
    UnknownKey { key: String, valid: String },

    #[error("Invalid value for {key}: {value}\n\nExpected: {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: String,
    },

    #[error("Missing setting: {key}\n\nSet it with: avdfleet config set {key} <value>")]
    Missing { key: String },
}
