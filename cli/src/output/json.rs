//! JSON output helpers.
//!
//! Every `--json` code path prints exactly one pretty-printed document on
//! stdout; failures use the error object below.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::domain::{AllocationError, ChannelError, ConfigError, TemplateError};

/// Format a JSON error object.
///
/// Output (pretty-printed):
/// ```json
/// {
///   "error": true,
///   "message": "...",
///   "code": "..."
/// }
/// ```
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_error(message: &str, code: &str) -> Result<String> {
    let obj = serde_json::json!({
        "error": true,
        "message": message,
        "code": code,
    });
    serde_json::to_string_pretty(&obj).context("JSON serialization failed")
}

/// Stable machine-readable code for a command failure.
#[must_use]
pub fn error_code(err: &anyhow::Error) -> &'static str {
    if let Some(e) = err.downcast_ref::<AllocationError>() {
        return match e {
            AllocationError::NoInstances => "NO_INSTANCES",
            AllocationError::ResourceExhausted { .. } => "RESOURCE_EXHAUSTED",
        };
    }
    if err.downcast_ref::<ConfigError>().is_some() {
        "INVALID_CONFIG"
    } else if err.downcast_ref::<TemplateError>().is_some() {
        "TEMPLATE_FAILED"
    } else if err.downcast_ref::<ChannelError>().is_some() {
        "CHANNEL_FAILED"
    } else {
        "ERROR"
    }
}

/// Renders values as pretty-printed JSON on stdout.
pub struct JsonRenderer;

impl JsonRenderer {
    /// Print `value` as one JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        println!(
            "{}",
            serde_json::to_string_pretty(value).context("JSON serialization failed")?
        );
        Ok(())
    }
}
