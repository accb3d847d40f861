//! Configuration resolution use-case.
//!
//! Turns the options collected from the command line (and, for `run`, an
//! optional TOML file) into one validated [`Config`] per invocation. CLI
//! values win over file values, which win over schema defaults.

use std::path::Path;

use crate::application::ports::ConfigFileReader;
use crate::domain::config::{
    CliOptions, Config, RawOptions, Schema, extract_file_options, locate_option_line, merge_cli_and_file,
};
use crate::domain::error::{ConfigError, OptionDiagnostic};

/// Read, normalize and validate a configuration file against the run schema.
///
/// # Errors
///
/// - [`ConfigError::FileRead`] if the file cannot be read.
/// - [`ConfigError::FileParse`] if it is not valid TOML.
/// - [`ConfigError::FileOption`] if any option fails validation; each
///   diagnostic carries the line of the option's first mention when found.
pub fn load_file_config(path: &Path, reader: &impl ConfigFileReader) -> Result<Config, ConfigError> {
    let content = reader
        .read_to_string(path)
        .map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

    let document: toml::Table = content.parse().map_err(|source| ConfigError::FileParse {
        path: path.to_path_buf(),
        source,
    })?;

    let file = extract_file_options(document);
    for key in &file.ignored {
        tracing::warn!(path = %path.display(), key = %key, "ignoring unknown configuration entry");
    }

    Schema::run().validate(&file.options).map_err(|errors| {
        let diagnostics = errors
            .iter()
            .map(|(option, messages)| OptionDiagnostic {
                option: option.replace('_', "-"),
                line: locate_option_line(&content, option),
                messages: messages.to_vec(),
            })
            .collect();
        ConfigError::FileOption {
            path: path.to_path_buf(),
            diagnostics,
        }
    })
}

/// Resolve the configuration for `transient run`.
///
/// # Errors
///
/// Returns any file error from [`load_file_config`], or
/// [`ConfigError::CliArgument`] if the merged options fail validation.
pub fn resolve_run_config(
    cli: &CliOptions,
    reader: &impl ConfigFileReader,
) -> Result<Config, ConfigError> {
    let raw = match cli.config_path() {
        Some(path) => {
            tracing::debug!(path, "loading configuration file");
            let file = load_file_config(Path::new(path), reader)?;
            merge_cli_and_file(cli, &file)
        }
        None => cli.strip_unset(),
    };
    validate(&Schema::run(), &raw)
}

/// Resolve the configuration for `transient list`.
///
/// # Errors
///
/// Returns [`ConfigError::CliArgument`] on invalid options.
pub fn resolve_list_config(cli: &CliOptions) -> Result<Config, ConfigError> {
    validate(&Schema::list(), &cli.strip_unset())
}

/// Resolve the configuration for `transient delete`.
///
/// # Errors
///
/// Returns [`ConfigError::CliArgument`] on invalid options.
pub fn resolve_delete_config(cli: &CliOptions) -> Result<Config, ConfigError> {
    validate(&Schema::delete(), &cli.strip_unset())
}

fn validate(schema: &Schema, raw: &RawOptions) -> Result<Config, ConfigError> {
    let config = schema.validate(raw).map_err(ConfigError::CliArgument)?;
    tracing::debug!(schema = ?schema.kind(), ?config, "configuration resolved");
    Ok(config)
}
