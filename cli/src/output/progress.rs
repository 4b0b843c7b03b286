//! Spinners for the preparation phase, using indicatif.
//!
//! Cloning a large AVD takes long enough to need feedback; the spinner is
//! replaced by a `✓`/`⚠` line once the phase ends.

#![allow(clippy::expect_used)] // Templates are compile-time constants

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

const TICK: Duration = Duration::from_millis(80);
const SPINNER_TEMPLATE: &str = "  {spinner:.cyan} {msg}";
const DONE_TEMPLATE: &str = "  {prefix} {msg}";

/// Start a steadily ticking spinner showing `msg`.
#[must_use]
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"])
            .template(SPINNER_TEMPLATE)
            .expect("valid template"),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(TICK);
    pb
}

fn finish(pb: &ProgressBar, marker: &'static str, msg: &str) {
    pb.set_style(
        ProgressStyle::default_spinner()
            .template(DONE_TEMPLATE)
            .expect("valid template"),
    );
    pb.set_prefix(marker);
    pb.finish_with_message(msg.to_string());
}

/// Replace the spinner with a `✓` line.
pub fn finish_ok(pb: &ProgressBar, msg: &str) {
    finish(pb, "✓", msg);
}

/// Replace the spinner with a `⚠` line, leaving it visible.
pub fn finish_warn(pb: &ProgressBar, msg: &str) {
    finish(pb, "⚠", msg);
}
