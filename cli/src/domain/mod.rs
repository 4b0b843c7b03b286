//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod config;
pub mod error;
pub mod instance;
pub mod link;
pub mod plan;

pub use config::{FleetConfig, Retention, validate_config_key, validate_config_value};
pub use error::{
    AllocationError, ChannelError, ConfigError, InstanceError, ReadinessError, TemplateError,
};
pub use instance::RunState;
pub use plan::{InstancePlan, PortRange};
