//! Stylesheet in the owo-colors pattern.

use owo_colors::Style;

/// Centralized styles so every message draws from the same palette.
#[derive(Default, Clone)]
pub struct Styles {
    pub success: Style,
    pub warning: Style,
    pub error: Style,
    pub dim: Style,
}

impl Styles {
    /// Switch the default (plain) stylesheet to colored output.
    pub fn colorize(&mut self) {
        self.success = Style::new().green();
        self.warning = Style::new().yellow();
        self.error = Style::new().red();
        self.dim = Style::new().dimmed();
    }
}
