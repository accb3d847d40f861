//! JSON output helpers for `--json` code paths.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::application::ports::FrontendImage;

/// Pretty-printed JSON array of frontend images.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_images(images: &[FrontendImage]) -> Result<String> {
    serde_json::to_string_pretty(images).context("JSON serialization failed")
}

/// Format a JSON error object.
///
/// Output (pretty-printed):
/// ```json
/// {
///   "error": true,
///   "message": "..."
/// }
/// ```
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_error(message: &str) -> Result<String> {
    #[derive(Serialize)]
    struct ErrorObject<'a> {
        error: bool,
        message: &'a str,
    }
    serde_json::to_string_pretty(&ErrorObject {
        error: true,
        message,
    })
    .context("JSON serialization failed")
}
