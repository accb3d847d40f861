//! Colors for terminal output.

use owo_colors::Style;

/// Stylesheet; every style is plain until [`Styles::colorize`] runs.
#[derive(Default, Clone, Copy)]
pub struct Styles {
    /// `✓` lines and finished spinners.
    pub success: Style,
    /// `⚠` lines.
    pub warning: Style,
    /// `→` and `ℹ` markers.
    pub marker: Style,
    /// Table headers.
    pub dim: Style,
}

impl Styles {
    pub fn colorize(&mut self) {
        self.success = Style::new().green();
        self.warning = Style::new().yellow();
        self.marker = Style::new().cyan();
        self.dim = Style::new().dimmed();
    }
}
