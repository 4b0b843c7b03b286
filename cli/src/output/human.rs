//! Human-readable terminal renderer.

use std::collections::BTreeSet;
use std::path::Path;

use owo_colors::OwoColorize as _;

use crate::application::services::{InstanceReport, RunSummary};
use crate::domain::{FleetConfig, InstancePlan};
use crate::output::OutputContext;
use crate::output::styles::state_marker;

/// Renders domain types as human-readable terminal output using `OutputContext`.
pub struct HumanRenderer<'a> {
    ctx: &'a OutputContext,
}

impl<'a> HumanRenderer<'a> {
    /// Create a new `HumanRenderer` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }

    /// Render the CLI version information.
    pub fn render_version(&self, version: &str) {
        println!("avdfleet {version}");
    }

    /// Render the identity/port allocation of a prospective run.
    pub fn render_plan(&self, plans: &[InstancePlan]) {
        if self.ctx.quiet {
            return;
        }
        self.ctx.header(&format!("Plan ({} instance(s))", plans.len()));
        for plan in plans {
            println!(
                "    {:<24} {:<6} {}",
                plan.identity,
                plan.port,
                plan.endpoint().style(self.ctx.styles.dim)
            );
        }
    }

    /// Render the endpoints currently in the `device` state.
    pub fn render_devices(&self, live: &BTreeSet<String>) {
        if self.ctx.quiet {
            return;
        }
        if live.is_empty() {
            self.ctx.info("No devices attached.");
            return;
        }
        self.ctx.header(&format!("Devices ({})", live.len()));
        for serial in live {
            println!("    {serial}");
        }
    }

    /// Render the per-instance outcome table and totals.
    pub fn render_summary(&self, summary: &RunSummary) {
        if self.ctx.quiet {
            return;
        }
        println!();
        self.ctx.header("Summary");
        for report in &summary.instances {
            let style = self.ctx.styles.for_state(&report.state);
            println!(
                "  {} {}",
                state_marker(&report.state).style(style),
                summary_line(report).style(style)
            );
            if let Some(log) = &report.log_path {
                println!("      {}", format!("log: {}", log.display()).style(self.ctx.styles.dim));
            }
        }
        println!();
        self.ctx.kv(
            "Result:",
            &format!(
                "{} succeeded, {} failed ({})",
                summary.succeeded(),
                summary.failed(),
                format_elapsed(
                    (summary.finished_at - summary.started_at)
                        .num_seconds()
                        .max(0)
                        .unsigned_abs()
                )
            ),
        );
    }

    /// Render the current configuration.
    pub fn render_config(&self, config: &FleetConfig, path: &Path) {
        println!();
        println!(
            "  {}",
            format!("Configuration ({})", path.display()).style(self.ctx.styles.header)
        );
        println!();
        for (key, value) in config.entries() {
            let value = if value.is_empty() {
                "(not set)".to_string()
            } else {
                value
            };
            println!("  {:<34} {value}", format!("{key}:"));
        }
        println!();
        println!("  {}", "Environment:".style(self.ctx.styles.bold));
        for var in ["AVDFLEET_CONFIG", "ANDROID_AVD_HOME", "NO_COLOR"] {
            println!(
                "    {:<18} {}",
                format!("{var}:"),
                std::env::var(var).unwrap_or_else(|_| "(not set)".to_string())
            );
        }
        println!();
    }
}

/// `"<identity>  <endpoint>  <outcome>[: reason]"`.
#[must_use]
pub fn summary_line(report: &InstanceReport) -> String {
    match &report.reason {
        Some(reason) => format!(
            "{:<24} {:<15} {}: {reason}",
            report.identity, report.endpoint, report.outcome
        ),
        None => format!(
            "{:<24} {:<15} {}",
            report.identity, report.endpoint, report.outcome
        ),
    }
}

/// Format a duration in seconds as `"Xh Ym"`, `"Ym Zs"` or `"Zs"`.
#[must_use]
pub fn format_elapsed(seconds: u64) -> String {
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;
    if h > 0 {
        format!("{h}h {m}m")
    } else if m > 0 {
        format!("{m}m {s}s")
    } else {
        format!("{s}s")
    }
}
