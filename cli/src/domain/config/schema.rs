//! Per-subcommand option schemas and validation.
//!
//! Validation runs in one pass: every supplied option is coerced to its
//! declared type, absent options receive their defaults, and every violation
//! is collected before the result is returned.

use std::collections::BTreeMap;
use std::fmt;

use super::Config;
use super::value::{OptionValue, RawOptions};

/// Semantic type of an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Str,
    Bool,
    Int,
    StrList,
    /// List of `local:remote` path pairs.
    PairList,
}

/// Default applied when an option is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultValue {
    Str(&'static str),
    Bool(bool),
    Int(i64),
    EmptyList,
}

impl DefaultValue {
    fn to_value(self) -> OptionValue {
        match self {
            Self::Str(s) => OptionValue::Str(s.to_string()),
            Self::Bool(b) => OptionValue::Bool(b),
            Self::Int(i) => OptionValue::Int(i),
            Self::EmptyList => OptionValue::List(Vec::new()),
        }
    }
}

/// Definition of a single option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionSpec {
    pub name: &'static str,
    pub kind: OptionKind,
    pub default: Option<DefaultValue>,
    /// Whether the option may be missing from the validated result.
    pub allow_absent: bool,
    /// Inclusive range for integer options.
    pub bounds: Option<(i64, i64)>,
}

impl OptionSpec {
    /// Option that may be left out entirely.
    #[must_use]
    pub const fn optional(name: &'static str, kind: OptionKind) -> Self {
        Self {
            name,
            kind,
            default: None,
            allow_absent: true,
            bounds: None,
        }
    }

    /// Option filled with `default` when absent.
    #[must_use]
    pub const fn defaulted(name: &'static str, kind: OptionKind, default: DefaultValue) -> Self {
        Self {
            name,
            kind,
            default: Some(default),
            allow_absent: true,
            bounds: None,
        }
    }

    #[must_use]
    pub const fn bounded(mut self, min: i64, max: i64) -> Self {
        self.bounds = Some((min, max));
        self
    }

    fn coerce(&self, raw: &toml::Value) -> Result<OptionValue, String> {
        let value = match self.kind {
            OptionKind::Str => coerce_str(raw)?,
            OptionKind::Bool => coerce_bool(raw)?,
            OptionKind::Int => coerce_int(raw)?,
            OptionKind::StrList => OptionValue::List(coerce_list(raw)?),
            OptionKind::PairList => {
                let items = coerce_list(raw)?;
                for (i, item) in items.iter().enumerate() {
                    if split_pair(item).is_none() {
                        return Err(format!(
                            "Item {i}: expected 'local:remote', got '{item}'."
                        ));
                    }
                }
                OptionValue::List(items)
            }
        };
        if let (OptionValue::Int(i), Some((min, max))) = (&value, self.bounds)
            && !(min..=max).contains(i)
        {
            return Err(format!(
                "Must be greater than or equal to {min} and less than or equal to {max}."
            ));
        }
        Ok(value)
    }
}

/// Split a `local:remote` pair. Both sides must be non-empty and there must
/// be exactly one separator.
#[must_use]
pub fn split_pair(spec: &str) -> Option<(&str, &str)> {
    let (local, remote) = spec.split_once(':')?;
    if local.is_empty() || remote.is_empty() || remote.contains(':') {
        return None;
    }
    Some((local, remote))
}

fn coerce_str(raw: &toml::Value) -> Result<OptionValue, String> {
    match raw {
        toml::Value::String(s) => Ok(OptionValue::Str(s.clone())),
        _ => Err("Not a valid string.".to_string()),
    }
}

fn coerce_bool(raw: &toml::Value) -> Result<OptionValue, String> {
    const TRUTHY: &[&str] = &["true", "t", "yes", "y", "on", "1"];
    const FALSY: &[&str] = &["false", "f", "no", "n", "off", "0"];
    let invalid = || "Not a valid boolean.".to_string();
    match raw {
        toml::Value::Boolean(b) => Ok(OptionValue::Bool(*b)),
        toml::Value::Integer(0) => Ok(OptionValue::Bool(false)),
        toml::Value::Integer(1) => Ok(OptionValue::Bool(true)),
        toml::Value::String(s) => {
            let lowered = s.trim().to_ascii_lowercase();
            if TRUTHY.contains(&lowered.as_str()) {
                Ok(OptionValue::Bool(true))
            } else if FALSY.contains(&lowered.as_str()) {
                Ok(OptionValue::Bool(false))
            } else {
                Err(invalid())
            }
        }
        _ => Err(invalid()),
    }
}

fn coerce_int(raw: &toml::Value) -> Result<OptionValue, String> {
    match raw {
        toml::Value::Integer(i) => Ok(OptionValue::Int(*i)),
        toml::Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(OptionValue::Int)
            .map_err(|_| "Not a valid integer.".to_string()),
        _ => Err("Not a valid integer.".to_string()),
    }
}

fn coerce_list(raw: &toml::Value) -> Result<Vec<String>, String> {
    let toml::Value::Array(items) = raw else {
        return Err("Not a valid list.".to_string());
    };
    items
        .iter()
        .enumerate()
        .map(|(i, item)| match item {
            toml::Value::String(s) => Ok(s.clone()),
            _ => Err(format!("Item {i}: Not a valid string.")),
        })
        .collect()
}

// ── Schemas ──────────────────────────────────────────────────────────────────

const BASE_OPTIONS: &[OptionSpec] = &[
    OptionSpec::defaulted("image", OptionKind::StrList, DefaultValue::EmptyList),
    OptionSpec::optional("image_backend", OptionKind::Str),
    OptionSpec::optional("image_frontend", OptionKind::Str),
    OptionSpec::optional("name", OptionKind::Str),
];

const DELETE_OPTIONS: &[OptionSpec] = &[OptionSpec::defaulted(
    "force",
    OptionKind::Bool,
    DefaultValue::Bool(false),
)];

const PORT_MAX: i64 = 65535;
const TIMEOUT_MAX: i64 = 86_400;

const RUN_OPTIONS: &[OptionSpec] = &[
    OptionSpec::optional("config", OptionKind::Str),
    OptionSpec::defaulted("copy_in_before", OptionKind::PairList, DefaultValue::EmptyList),
    OptionSpec::defaulted("copy_out_after", OptionKind::PairList, DefaultValue::EmptyList),
    OptionSpec::optional("copy_timeout", OptionKind::Int).bounded(0, TIMEOUT_MAX),
    OptionSpec::defaulted("prepare_only", OptionKind::Bool, DefaultValue::Bool(false)),
    OptionSpec::optional("qemu_args", OptionKind::StrList),
    OptionSpec::defaulted("qmp_timeout", OptionKind::Int, DefaultValue::Int(10))
        .bounded(0, TIMEOUT_MAX),
    OptionSpec::defaulted("shutdown_timeout", OptionKind::Int, DefaultValue::Int(20))
        .bounded(0, TIMEOUT_MAX),
    OptionSpec::optional("ssh_command", OptionKind::Str),
    OptionSpec::defaulted("ssh_bin_name", OptionKind::Str, DefaultValue::Str("ssh")),
    OptionSpec::optional("ssh_port", OptionKind::Int).bounded(1, PORT_MAX),
    OptionSpec::defaulted("ssh_timeout", OptionKind::Int, DefaultValue::Int(90))
        .bounded(0, TIMEOUT_MAX),
    OptionSpec::defaulted("ssh_user", OptionKind::Str, DefaultValue::Str("vagrant")),
    OptionSpec::defaulted("ssh_console", OptionKind::Bool, DefaultValue::Bool(false)),
    OptionSpec::defaulted("ssh_with_serial", OptionKind::Bool, DefaultValue::Bool(false)),
    OptionSpec::defaulted("shared_folder", OptionKind::PairList, DefaultValue::EmptyList),
];

/// Which subcommand a schema belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    List,
    Delete,
    Run,
}

/// Declarative option set for one subcommand.
#[derive(Debug, Clone)]
pub struct Schema {
    kind: SchemaKind,
    options: Vec<OptionSpec>,
}

impl Schema {
    #[must_use]
    pub fn list() -> Self {
        Self::extend(SchemaKind::List, &[])
    }

    #[must_use]
    pub fn delete() -> Self {
        Self::extend(SchemaKind::Delete, DELETE_OPTIONS)
    }

    #[must_use]
    pub fn run() -> Self {
        Self::extend(SchemaKind::Run, RUN_OPTIONS)
    }

    fn extend(kind: SchemaKind, extra: &[OptionSpec]) -> Self {
        let options = BASE_OPTIONS.iter().chain(extra).copied().collect();
        Self { kind, options }
    }

    #[must_use]
    pub fn kind(&self) -> SchemaKind {
        self.kind
    }

    #[must_use]
    pub fn spec(&self, name: &str) -> Option<&OptionSpec> {
        self.options.iter().find(|o| o.name == name)
    }

    /// Coerce, default-fill and check `raw` against this schema.
    ///
    /// # Errors
    ///
    /// Returns every violation found, keyed by option name.
    pub fn validate(&self, raw: &RawOptions) -> Result<Config, ValidationErrors> {
        let mut values = BTreeMap::new();
        let mut errors = ValidationErrors::default();

        for (name, value) in raw {
            match self.spec(name) {
                None => errors.push(name, "Unknown field."),
                Some(spec) => match spec.coerce(value) {
                    Ok(v) => {
                        values.insert(name.clone(), v);
                    }
                    Err(msg) => errors.push(name, msg),
                },
            }
        }

        for spec in &self.options {
            if values.contains_key(spec.name) || errors.contains(spec.name) {
                continue;
            }
            if let Some(default) = spec.default {
                values.insert(spec.name.to_string(), default.to_value());
            } else if !spec.allow_absent {
                errors.push(spec.name, "Missing data for required field.");
            }
        }

        if errors.is_empty() {
            Ok(Config::from_values(values))
        } else {
            Err(errors)
        }
    }
}

/// All violations from one validation pass, keyed by option name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    messages: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn push(&mut self, option: &str, message: impl Into<String>) {
        self.messages
            .entry(option.to_string())
            .or_default()
            .push(message.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    #[must_use]
    pub fn contains(&self, option: &str) -> bool {
        self.messages.contains_key(option)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.messages
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (option, messages) in &self.messages {
            if !first {
                f.write_str("; ")?;
            }
            first = false;
            write!(f, "{option}: {}", messages.join(" "))?;
        }
        Ok(())
    }
}
