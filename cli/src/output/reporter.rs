//! `TerminalReporter`: Presentation-layer implementation of
//! `ProgressReporter` and `InstanceObserver`.
//!
//! Wraps `&OutputContext` so application services can emit progress and
//! per-instance state changes without depending on any presentation type.

use std::cell::RefCell;

use indicatif::ProgressBar;
use owo_colors::OwoColorize as _;

use crate::application::ports::{InstanceObserver, ProgressReporter};
use crate::domain::{InstancePlan, RunState};
use crate::output::styles::state_marker;
use crate::output::{OutputContext, progress};

/// Terminal reporter that wraps an `OutputContext`.
///
/// - `step()` shows a spinner on a TTY, or prints `"  → {message}"`
/// - `success()` / `warn()` finish the spinner, or print `✓` / `⚠` lines
/// - instance transitions print one `"  → {identity} ({endpoint}) {state}"` line
///
/// Everything is suppressed when `ctx.quiet` or when built with `silent()`.
pub struct TerminalReporter<'a> {
    ctx: &'a OutputContext,
    enabled: bool,
    spinner: RefCell<Option<ProgressBar>>,
}

impl<'a> TerminalReporter<'a> {
    /// Create a new `TerminalReporter` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self {
            ctx,
            enabled: !ctx.quiet,
            spinner: RefCell::new(None),
        }
    }

    /// A reporter that prints nothing, for JSON mode.
    #[must_use]
    pub fn silent(ctx: &'a OutputContext) -> Self {
        Self {
            ctx,
            enabled: false,
            spinner: RefCell::new(None),
        }
    }

    fn take_spinner(&self) -> Option<ProgressBar> {
        self.spinner.borrow_mut().take()
    }
}

impl ProgressReporter for TerminalReporter<'_> {
    fn step(&self, message: &str) {
        if !self.enabled {
            return;
        }
        if self.ctx.show_progress() {
            let mut slot = self.spinner.borrow_mut();
            match slot.as_ref() {
                Some(pb) => pb.set_message(message.to_string()),
                None => *slot = Some(progress::spinner(message)),
            }
        } else {
            println!("  {} {message}", "→".style(self.ctx.styles.progress));
        }
    }

    fn success(&self, message: &str) {
        if !self.enabled {
            return;
        }
        match self.take_spinner() {
            Some(pb) => progress::finish_ok(&pb, message),
            None => self.ctx.success(message),
        }
    }

    fn warn(&self, message: &str) {
        if !self.enabled {
            return;
        }
        match self.take_spinner() {
            Some(pb) => progress::finish_warn(&pb, message),
            None => self.ctx.warn(message),
        }
    }
}

impl InstanceObserver for TerminalReporter<'_> {
    fn on_transition(&self, plan: &InstancePlan, state: &RunState) {
        if !self.enabled || *state == RunState::Pending {
            return;
        }
        let who = format!("{} ({})", plan.identity, plan.endpoint());
        match state {
            RunState::Succeeded => self.ctx.success(&format!("{who} finished")),
            RunState::Failed(reason) => self.ctx.error(&format!("{who} failed: {reason}")),
            other => println!(
                "  {} {who} {}",
                state_marker(other).style(self.ctx.styles.for_state(other)),
                other.label().style(self.ctx.styles.dim)
            ),
        }
    }
}

impl Drop for TerminalReporter<'_> {
    fn drop(&mut self) {
        if let Some(pb) = self.spinner.get_mut().take() {
            pb.finish_and_clear();
        }
    }
}
