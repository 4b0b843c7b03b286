//! `avdfleet devices`: list endpoints adb reports as ready.

use std::process::ExitCode;

use anyhow::{Context, Result};

use crate::app::AppContext;
use crate::application::ports::CommandChannel;

/// Run the devices command.
///
/// # Errors
///
/// Returns an error if adb cannot be queried.
pub async fn run(app: &AppContext) -> Result<ExitCode> {
    let config = app.load_config()?;
    let live = app
        .channel(&config)
        .list_live_endpoints()
        .await
        .with_context(|| format!("querying {}", config.tools.adb))?;
    app.renderer().render_devices(&live)?;
    Ok(ExitCode::SUCCESS)
}
