//! Configuration resolution: schema validation, file normalization, CLI/file
//! merging and the typed per-subcommand views the rest of the crate reads.
//!
//! Pure functions only — no I/O, no async, no filesystem access. Reading the
//! configuration file is the caller's job.

pub mod file;
pub mod merge;
pub mod schema;
pub mod typed;
pub mod value;

use std::collections::BTreeMap;

use serde::Serialize;

pub use file::{extract_file_options, locate_option_line, normalize_keys};
pub use merge::merge_cli_and_file;
pub use schema::{DefaultValue, OptionKind, OptionSpec, Schema, SchemaKind, ValidationErrors};
pub use typed::{DeleteConfig, ListConfig, PathPair, RunConfig, StorePaths};
pub use value::{CliOptions, CliValue, OptionValue, RawOptions, Switch};

/// A validated configuration: option name → value, ordered by name.
///
/// Only [`Schema::validate`] creates one, so every value has the declared
/// type and every defaulted option is present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Config {
    values: BTreeMap<String, OptionValue>,
}

impl Config {
    pub(crate) fn from_values(values: BTreeMap<String, OptionValue>) -> Self {
        Self { values }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.values.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(OptionValue::Str(s)) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(OptionValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn get_int(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(OptionValue::Int(i)) => Some(*i),
            _ => None,
        }
    }

    #[must_use]
    pub fn get_list(&self, name: &str) -> Option<&[String]> {
        match self.values.get(name) {
            Some(OptionValue::List(items)) => Some(items),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}
