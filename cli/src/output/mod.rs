//! Terminal output for the launcher.
//!
//! Stage lines and image tables go to stdout; errors are printed by `main`.
//! While a guest is attached it owns the terminal, so the session reporter
//! is the only writer until teardown.

pub mod images;
pub mod json;
pub mod progress;
pub mod reporter;
pub mod styles;

use console::Term;
use owo_colors::OwoColorize as _;
pub use styles::Styles;

/// Where and how to print: styling, TTY detection and `--quiet`.
pub struct OutputContext {
    pub styles: Styles,
    /// Whether stdout is a terminal.
    pub is_tty: bool,
    /// `--quiet`: only errors are printed.
    pub quiet: bool,
}

impl OutputContext {
    /// Colors are used only on a terminal and without `--no-color` (which
    /// clap also reads from a non-empty `NO_COLOR`).
    #[must_use]
    pub fn new(no_color: bool, quiet: bool) -> Self {
        let is_tty = Term::stdout().is_term();
        let mut styles = Styles::default();
        if !no_color && is_tty {
            styles.colorize();
        }
        Self {
            styles,
            is_tty,
            quiet,
        }
    }

    /// Spinners only make sense on an interactive, non-quiet stdout.
    #[must_use]
    pub fn show_progress(&self) -> bool {
        self.is_tty && !self.quiet
    }

    fn line(&self, marker: &str, style: owo_colors::Style, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", marker.style(style));
        }
    }

    /// `→ msg`, for a stage that started.
    pub fn step(&self, msg: &str) {
        self.line("→", self.styles.marker, msg);
    }

    /// `✓ msg`
    pub fn success(&self, msg: &str) {
        self.line("✓", self.styles.success, msg);
    }

    /// `⚠ msg`
    pub fn warn(&self, msg: &str) {
        self.line("⚠", self.styles.warning, msg);
    }

    /// `ℹ msg`
    pub fn info(&self, msg: &str) {
        self.line("ℹ", self.styles.marker, msg);
    }

    /// Column header row of a table.
    pub fn table_header(&self, row: &str) {
        if !self.quiet {
            println!("{}", row.style(self.styles.dim));
        }
    }
}
