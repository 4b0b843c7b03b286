//! Application service: configuration use-cases.

use anyhow::Result;

use crate::application::ports::ConfigStore;
use crate::domain::FleetConfig;

/// Load configuration.
///
/// # Errors
///
/// Returns an error if the stored configuration cannot be read.
pub fn load_config(store: &impl ConfigStore) -> Result<FleetConfig> {
    store.load()
}

/// Apply a single `key = value` setting and persist it.
///
/// # Errors
///
/// Returns an error if the key or value is invalid, or the file cannot be
/// written. Nothing is saved on a validation failure.
pub fn set_value(store: &impl ConfigStore, key: &str, value: &str) -> Result<FleetConfig> {
    let mut config = store.load()?;
    config.set(key, value)?;
    store.save(&config)?;
    Ok(config)
}
