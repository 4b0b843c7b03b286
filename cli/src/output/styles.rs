//! Output styles using owo-colors stylesheet pattern

use owo_colors::Style;

use crate::domain::RunState;

/// Centralized stylesheet for CLI output colors.
#[derive(Default, Clone)]
pub struct Styles {
    /// Success messages and succeeded instances (green)
    pub success: Style,
    /// Warning messages (yellow)
    pub warning: Style,
    /// Error messages and failed instances (red)
    pub error: Style,
    /// Info messages (blue)
    pub info: Style,
    /// Dimmed/secondary text
    pub dim: Style,
    /// Bold text
    pub bold: Style,
    /// Headers/section titles
    pub header: Style,
    /// In-flight instance states (cyan)
    pub progress: Style,
}

impl Styles {
    /// Apply colors to the stylesheet.
    pub fn colorize(&mut self) {
        self.success = Style::new().green();
        self.warning = Style::new().yellow();
        self.error = Style::new().red();
        self.info = Style::new().blue();
        self.dim = Style::new().dimmed();
        self.bold = Style::new().bold();
        self.header = Style::new().bold().cyan();
        self.progress = Style::new().cyan();
    }

    /// Style for an instance in `state`.
    #[must_use]
    pub fn for_state(&self, state: &RunState) -> Style {
        match state {
            RunState::Succeeded => self.success,
            RunState::Failed(_) => self.error,
            RunState::Pending => self.dim,
            _ => self.progress,
        }
    }
}

/// One-character marker for an instance in `state`.
#[must_use]
pub fn state_marker(state: &RunState) -> &'static str {
    match state {
        RunState::Succeeded => "✓",
        RunState::Failed(_) => "✗",
        RunState::Pending => "·",
        _ => "→",
    }
}
