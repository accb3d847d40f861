//! `TerminalReporter` — Presentation-layer implementation of `ProgressReporter`.
//!
//! Wraps `&OutputContext` and implements the `application::ports::ProgressReporter`
//! trait so application services can emit progress events without depending on
//! any presentation type directly.

use std::sync::Mutex;

use indicatif::ProgressBar;

use crate::application::ports::ProgressReporter;
use crate::output::{OutputContext, progress};

/// Terminal progress reporter that wraps an `OutputContext`.
///
/// - `step()` shows a spinner on a TTY, otherwise prints `"  → {message}"`
/// - `success()` prints `"  ✓ {message}"`
/// - `warn()` prints `"  ⚠ {message}"`
///
/// Every event first completes the spinner of the previous step. All output
/// is suppressed when `ctx.quiet`.
pub struct TerminalReporter<'a> {
    ctx: &'a OutputContext,
    active: Mutex<Option<ProgressBar>>,
}

impl<'a> TerminalReporter<'a> {
    /// Create a new `TerminalReporter` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self {
            ctx,
            active: Mutex::new(None),
        }
    }

    fn settle(&self) {
        if let Ok(mut active) = self.active.lock()
            && let Some(pb) = active.take()
        {
            progress::finish_ok(&pb);
        }
    }
}

impl ProgressReporter for TerminalReporter<'_> {
    fn step(&self, message: &str) {
        self.settle();
        if self.ctx.quiet {
            return;
        }
        if self.ctx.show_progress() {
            if let Ok(mut active) = self.active.lock() {
                *active = Some(progress::spinner(message));
            }
        } else {
            self.ctx.step(message);
        }
    }

    fn success(&self, message: &str) {
        self.settle();
        self.ctx.success(message);
    }

    fn warn(&self, message: &str) {
        self.settle();
        self.ctx.warn(message);
    }
}

impl Drop for TerminalReporter<'_> {
    /// A spinner still running here belongs to a step that failed.
    fn drop(&mut self) {
        if let Ok(mut active) = self.active.lock()
            && let Some(pb) = active.take()
        {
            progress::finish_error(&pb);
        }
    }
}
