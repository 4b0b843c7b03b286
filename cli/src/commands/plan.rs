//! `avdfleet plan`: show the identity/port allocation a run would use.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::fleet;
use crate::domain::PortRange;
use crate::output::TerminalReporter;

/// Arguments for the plan command.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Number of emulator instances
    #[arg(long, short = 'n')]
    pub total: usize,
}

/// Run the plan command. Nothing is cloned or launched.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the allocation fails.
pub async fn run(app: &AppContext, args: &PlanArgs) -> Result<ExitCode> {
    let config = app.load_config()?;
    config.validate_scheduling()?;
    let channel = app.channel(&config);
    let reporter = if app.is_json() {
        TerminalReporter::silent(&app.output)
    } else {
        TerminalReporter::new(&app.output)
    };

    let plans = fleet::plan_only(
        &channel,
        &reporter,
        &config.template.base,
        args.total,
        PortRange::EMULATOR,
    )
    .await?;
    drop(reporter);
    app.renderer().render_plan(&plans)?;
    Ok(ExitCode::SUCCESS)
}
