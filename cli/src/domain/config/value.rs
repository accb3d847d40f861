//! Option values at each stage of resolution.
//!
//! CLI input arrives as [`CliValue`]s (which know what "not supplied" means
//! for their type), file input arrives as raw `toml::Value`s, and the schema
//! turns both into validated [`OptionValue`]s.

use std::collections::BTreeMap;

use serde::Serialize;

/// Raw, not yet validated option set keyed by underscore-separated name.
pub type RawOptions = toml::Table;

/// Tri-state boolean for command-line switches.
///
/// A clap flag cannot tell an explicit `false` apart from "not passed", so an
/// absent flag maps to [`Switch::Unset`]. [`Switch::Off`] exists for callers
/// that can express an explicit `false`; the command line never produces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Switch {
    #[default]
    Unset,
    Off,
    On,
}

impl Switch {
    /// Map a clap boolean flag. `false` is read as "not passed".
    #[must_use]
    pub fn from_flag(flag: bool) -> Self {
        if flag { Self::On } else { Self::Unset }
    }

    #[must_use]
    pub fn is_set(self) -> bool {
        self != Self::Unset
    }
}

/// A single option as supplied on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliValue {
    Str(Option<String>),
    Int(Option<i64>),
    Switch(Switch),
    List(Vec<String>),
}

impl CliValue {
    /// Whether the user actually supplied this option.
    ///
    /// Absent strings/integers, unset switches and empty lists all count as
    /// "not supplied".
    #[must_use]
    pub fn is_set(&self) -> bool {
        match self {
            Self::Str(v) => v.is_some(),
            Self::Int(v) => v.is_some(),
            Self::Switch(s) => s.is_set(),
            Self::List(v) => !v.is_empty(),
        }
    }

    /// `true` for a list value with no items.
    #[must_use]
    pub fn is_empty_list(&self) -> bool {
        matches!(self, Self::List(v) if v.is_empty())
    }

    /// Raw value for schema validation, or `None` when unset.
    #[must_use]
    pub fn to_raw(&self) -> Option<toml::Value> {
        if !self.is_set() {
            return None;
        }
        Some(match self {
            Self::Str(v) => toml::Value::String(v.clone().unwrap_or_default()),
            Self::Int(v) => toml::Value::Integer(v.unwrap_or_default()),
            Self::Switch(s) => toml::Value::Boolean(*s == Switch::On),
            Self::List(v) => {
                toml::Value::Array(v.iter().cloned().map(toml::Value::String).collect())
            }
        })
    }
}

/// Options collected from the command line for one subcommand.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOptions {
    values: BTreeMap<String, CliValue>,
}

impl CliOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_str(mut self, name: &str, value: Option<String>) -> Self {
        self.values.insert(name.to_string(), CliValue::Str(value));
        self
    }

    #[must_use]
    pub fn with_int(mut self, name: &str, value: Option<i64>) -> Self {
        self.values.insert(name.to_string(), CliValue::Int(value));
        self
    }

    #[must_use]
    pub fn with_switch(mut self, name: &str, value: Switch) -> Self {
        self.values.insert(name.to_string(), CliValue::Switch(value));
        self
    }

    #[must_use]
    pub fn with_list(mut self, name: &str, value: Vec<String>) -> Self {
        self.values.insert(name.to_string(), CliValue::List(value));
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CliValue> {
        self.values.get(name)
    }

    /// Path of the configuration file, when one was passed.
    #[must_use]
    pub fn config_path(&self) -> Option<&str> {
        match self.values.get("config") {
            Some(CliValue::Str(Some(path))) => Some(path),
            _ => None,
        }
    }

    /// Drop every option the user did not supply, leaving raw values only.
    #[must_use]
    pub fn strip_unset(&self) -> RawOptions {
        self.values
            .iter()
            .filter_map(|(name, value)| value.to_raw().map(|raw| (name.clone(), raw)))
            .collect()
    }
}

/// A validated option value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OptionValue {
    Str(String),
    Bool(bool),
    Int(i64),
    List(Vec<String>),
}

impl OptionValue {
    /// Back to a raw value, e.g. to feed a file-sourced option into a merge.
    #[must_use]
    pub fn to_raw(&self) -> toml::Value {
        match self {
            Self::Str(s) => toml::Value::String(s.clone()),
            Self::Bool(b) => toml::Value::Boolean(*b),
            Self::Int(i) => toml::Value::Integer(*i),
            Self::List(items) => {
                toml::Value::Array(items.iter().cloned().map(toml::Value::String).collect())
            }
        }
    }
}
