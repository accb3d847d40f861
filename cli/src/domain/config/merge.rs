//! Precedence between command-line and file-sourced options.

use super::Config;
use super::file::QEMU_ARGS;
use super::value::{CliOptions, RawOptions};

/// Merge file-sourced options under the options the user supplied.
///
/// Starts from the CLI options with unset sentinels stripped, then takes each
/// file value only where the CLI value is unset. The pass-through argument
/// list is taken from the file only when the CLI list is empty.
#[must_use]
pub fn merge_cli_and_file(cli: &CliOptions, file: &Config) -> RawOptions {
    let mut merged = cli.strip_unset();
    for (name, value) in file.iter() {
        let take_file = match cli.get(name) {
            None => true,
            Some(cli_value) if name == QEMU_ARGS => cli_value.is_empty_list(),
            Some(cli_value) => !cli_value.is_set(),
        };
        if take_file {
            merged.insert(name.to_string(), value.to_raw());
        }
    }
    merged
}
