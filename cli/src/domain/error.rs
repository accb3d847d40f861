//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::domain::config::ValidationErrors;

// ── Config errors ─────────────────────────────────────────────────────────────

/// One invalid option from the configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionDiagnostic {
    /// Option name in its file (hyphenated) form.
    pub option: String,
    /// 1-based line of the first mention, when it could be found.
    pub line: Option<usize>,
    pub messages: Vec<String>,
}

impl fmt::Display for OptionDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(
                f,
                "Invalid option on line {line} in configuration file: {}",
                self.option
            )?,
            None => write!(f, "Invalid option in configuration file: {}", self.option)?,
        }
        if !self.messages.is_empty() {
            write!(f, " ({})", self.messages.join(" "))?;
        }
        Ok(())
    }
}

/// Errors raised while resolving a configuration. None are retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file {}: {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration file {}: {source}", path.display())]
    FileParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{}", render_diagnostics(path, diagnostics))]
    FileOption {
        path: PathBuf,
        diagnostics: Vec<OptionDiagnostic>,
    },

    #[error("Invalid command line arguments given: {0}")]
    CliArgument(ValidationErrors),
}

fn render_diagnostics(path: &std::path::Path, diagnostics: &[OptionDiagnostic]) -> String {
    let lines: Vec<String> = diagnostics.iter().map(ToString::to_string).collect();
    format!("{}\n  in {}", lines.join("\n"), path.display())
}

// ── Session errors ────────────────────────────────────────────────────────────

/// Fatal session failures, attached as context to the underlying cause.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("failed to provision image '{image}' (index {index})")]
    Provisioning { image: String, index: usize },

    #[error("failed to start the virtual machine")]
    Launch,

    #[error("failed to mount shared folder '{local}' at '{remote}'")]
    Mount { local: String, remote: String },

    #[error("failed to connect to the guest over SSH")]
    Connect,
}
