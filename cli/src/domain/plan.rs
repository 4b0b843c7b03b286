//! Instance plans: identity and console-port reservation for a run.
//!
//! Pure functions only: no I/O, no async. The live endpoint snapshot is
//! taken by the caller and passed in.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::domain::error::AllocationError;

/// Prefix of the serial the emulator registers under (`emulator-5554`).
pub const ENDPOINT_PREFIX: &str = "emulator";

/// Identity and port reserved for one instance. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstancePlan {
    /// AVD name of the fresh copy, e.g. `MyAVD3_copy2`.
    pub identity: String,
    /// Even console port the emulator is started on.
    pub port: u16,
}

impl InstancePlan {
    /// Serial of the endpoint this instance will expose.
    #[must_use]
    pub fn endpoint(&self) -> String {
        endpoint_for_port(self.port)
    }
}

/// Inclusive range of even console ports available to emulators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    first: u16,
    last: u16,
}

impl PortRange {
    /// Console ports accepted by the Android emulator.
    pub const EMULATOR: Self = Self {
        first: 5554,
        last: 5682,
    };

    /// Build a range; `first` is rounded up to the next even port.
    #[must_use]
    pub fn new(first: u16, last: u16) -> Self {
        Self {
            first: first.saturating_add(first % 2),
            last,
        }
    }

    #[must_use]
    pub fn first(self) -> u16 {
        self.first
    }

    #[must_use]
    pub fn last(self) -> u16 {
        self.last
    }

    /// Ascending even ports in the range.
    pub fn ports(self) -> impl Iterator<Item = u16> {
        (self.first..=self.last).step_by(2)
    }

    /// Number of usable ports.
    #[must_use]
    pub fn capacity(self) -> usize {
        self.ports().count()
    }
}

impl Default for PortRange {
    fn default() -> Self {
        Self::EMULATOR
    }
}

/// Endpoint serial derived from a console port.
#[must_use]
pub fn endpoint_for_port(port: u16) -> String {
    format!("{ENDPOINT_PREFIX}-{port}")
}

/// Console port encoded in an emulator serial, if it is one.
#[must_use]
pub fn port_for_endpoint(endpoint: &str) -> Option<u16> {
    endpoint
        .strip_prefix(ENDPOINT_PREFIX)?
        .strip_prefix('-')?
        .parse()
        .ok()
}

/// Names of the fresh copies for a run: `<template>_copy1..=<template>_copy<total>`.
#[must_use]
pub fn identities(template: &str, total: usize) -> Vec<String> {
    (1..=total).map(|i| format!("{template}_copy{i}")).collect()
}

/// Reserve `count` ports, skipping any whose endpoint is already live or
/// already reserved by this run.
///
/// # Errors
///
/// Returns `ResourceExhausted` when the range runs out first.
pub fn reserve_ports(
    count: usize,
    live: &BTreeSet<String>,
    range: PortRange,
) -> Result<Vec<u16>, AllocationError> {
    let taken: BTreeSet<u16> = live.iter().filter_map(|e| port_for_endpoint(e)).collect();
    let mut reserved = Vec::with_capacity(count);
    let mut free = range.ports().filter(|port| !taken.contains(port));
    while reserved.len() < count {
        let Some(port) = free.next() else {
            return Err(AllocationError::ResourceExhausted {
                first: range.first(),
                last: range.last(),
                requested: count,
                allocated: reserved.len(),
            });
        };
        reserved.push(port);
    }
    Ok(reserved)
}

/// Build the full plan list for a run.
///
/// # Errors
///
/// Returns `NoInstances` when `total` is zero and `ResourceExhausted` when
/// the port range cannot satisfy every plan.
pub fn allocate(
    template: &str,
    total: usize,
    live: &BTreeSet<String>,
    range: PortRange,
) -> Result<Vec<InstancePlan>, AllocationError> {
    if total == 0 {
        return Err(AllocationError::NoInstances);
    }
    let ports = reserve_ports(total, live, range)?;
    Ok(identities(template, total)
        .into_iter()
        .zip(ports)
        .map(|(identity, port)| InstancePlan { identity, port })
        .collect())
}
