//! Domain layer — pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod config;
pub mod error;
pub mod session;

pub use config::{Config, DeleteConfig, ListConfig, RunConfig};
pub use error::{ConfigError, OptionDiagnostic, SessionError};
pub use session::ConsolePolicy;
