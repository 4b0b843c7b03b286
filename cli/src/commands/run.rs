//! Run command: clone, launch, drive and summarize a fleet of emulators.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::Fleet;
use crate::domain::{FleetConfig, PortRange, Retention};
use crate::infra::avd::AvdTemplater;
use crate::infra::clock::TokioClock;
use crate::infra::emulator::EmulatorLauncher;
use crate::output::TerminalReporter;

/// Instances started when `--total` is omitted and no prompt is possible.
const DEFAULT_TOTAL: usize = 1;

/// Arguments for the run command.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Number of emulator instances (prompted when omitted)
    #[arg(long, short = 'n')]
    pub total: Option<usize>,

    /// Maximum instances running at once
    #[arg(long, short = 'c')]
    pub concurrency: Option<usize>,

    /// APK installed on every instance
    #[arg(long)]
    pub artifact: Option<PathBuf>,

    /// Application id launched after install
    #[arg(long)]
    pub package: Option<String>,

    /// Link template opened before install; must contain {userId}
    #[arg(long)]
    pub link: Option<String>,

    /// Stop every emulator once all instances are done
    #[arg(long)]
    pub terminate: bool,
}

impl RunArgs {
    /// Overlay command-line overrides on the stored configuration.
    pub fn apply(&self, config: &mut FleetConfig) {
        if let Some(n) = self.concurrency {
            config.scheduling.concurrency = n;
        }
        if let Some(path) = &self.artifact {
            config.payload.artifact.clone_from(path);
        }
        if let Some(package) = &self.package {
            config.payload.package.clone_from(package);
        }
        if let Some(link) = &self.link {
            config.payload.link_template.clone_from(link);
        }
        if self.terminate {
            config.scheduling.retention = Retention::Terminate;
        }
    }
}

/// Entry point for `avdfleet run`.
///
/// Instance failures are reported in the summary and do not change the exit
/// code.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or preparation fails
/// before any emulator was launched.
pub async fn run(app: &AppContext, args: &RunArgs) -> Result<ExitCode> {
    let mut config = app.load_config()?;
    args.apply(&mut config);
    config.validate()?;

    let total = match args.total {
        Some(n) => n,
        None => app.prompt_total(DEFAULT_TOTAL)?,
    };

    let channel = app.channel(&config);
    let templater = AvdTemplater::resolve(config.template.avd_home.as_deref())?;
    let launcher = EmulatorLauncher::from_tools(&config.tools);
    let reporter = if app.is_json() {
        TerminalReporter::silent(&app.output)
    } else {
        TerminalReporter::new(&app.output)
    };
    tracing::info!(
        total,
        concurrency = config.scheduling.concurrency,
        avd_home = %templater.home().display(),
        "starting run"
    );

    let fleet = Fleet {
        channel: &channel,
        templater: &templater,
        launcher: &launcher,
        clock: &TokioClock,
        reporter: &reporter,
        config: &config,
        ports: PortRange::EMULATOR,
    };
    let summary = fleet.run(total).await?;
    drop(reporter);

    app.renderer().render_summary(&summary)?;
    Ok(ExitCode::SUCCESS)
}
