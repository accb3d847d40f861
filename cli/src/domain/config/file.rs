//! Shaping a parsed configuration file into flat, schema-ready options.
//!
//! The file is organised in two sections:
//!
//! ```toml
//! [transient]
//! ssh-console = true
//!
//! [qemu]
//! qemu-args = ["-m", "1G"]
//! ```
//!
//! Keys use hyphens; the schema uses underscores.

use super::value::RawOptions;

/// Section holding the regular options.
pub const OPTIONS_SECTION: &str = "transient";
/// Section holding the pass-through hypervisor arguments.
pub const QEMU_SECTION: &str = "qemu";
/// Key (after normalization) of the pass-through argument list.
pub const QEMU_ARGS: &str = "qemu_args";

/// Rewrite hyphens to underscores in every table key, at any depth.
#[must_use]
pub fn normalize_keys(value: toml::Value) -> toml::Value {
    match value {
        toml::Value::Table(table) => toml::Value::Table(normalize_table(table)),
        toml::Value::Array(items) => {
            toml::Value::Array(items.into_iter().map(normalize_keys).collect())
        }
        other => other,
    }
}

fn normalize_table(table: toml::Table) -> toml::Table {
    table
        .into_iter()
        .map(|(key, value)| (key.replace('-', "_"), normalize_keys(value)))
        .collect()
}

/// Result of flattening a normalized document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileOptions {
    pub options: RawOptions,
    /// Keys found in the `[qemu]` section other than `qemu_args`.
    pub ignored: Vec<String>,
}

/// Flatten a parsed document into one option set.
///
/// The `[transient]` table supplies the options; the `[qemu]` table's
/// `qemu-args` list is lifted in as `qemu_args`. Either section may be
/// missing. Top-level keys outside both sections are reported through
/// [`FileOptions::ignored`] as well.
#[must_use]
pub fn extract_file_options(document: toml::Table) -> FileOptions {
    let mut document = normalize_table(document);
    let mut result = FileOptions::default();

    match document.remove(OPTIONS_SECTION) {
        Some(toml::Value::Table(options)) => result.options = options,
        Some(other) => {
            result
                .options
                .insert(OPTIONS_SECTION.to_string(), other);
        }
        None => {}
    }

    if let Some(section) = document.remove(QEMU_SECTION) {
        match section {
            toml::Value::Table(mut qemu) => {
                if let Some(args) = qemu.remove(QEMU_ARGS) {
                    result.options.insert(QEMU_ARGS.to_string(), args);
                }
                result
                    .ignored
                    .extend(qemu.keys().map(|k| format!("{QEMU_SECTION}.{k}")));
            }
            _ => result.ignored.push(QEMU_SECTION.to_string()),
        }
    }

    result.ignored.extend(document.keys().cloned());
    result
}

/// 1-based line number of the first line mentioning `option` in its
/// hyphenated file form, if any.
#[must_use]
pub fn locate_option_line(content: &str, option: &str) -> Option<usize> {
    let hyphenated = option.replace('_', "-");
    content
        .lines()
        .position(|line| line.contains(&hyphenated))
        .map(|idx| idx + 1)
}
