//! Typed views over a validated [`Config`], one per subcommand.
//!
//! The projections trust the schema: types, defaults and ranges have already
//! been checked, so reading them cannot fail.

use std::path::PathBuf;
use std::time::Duration;

use super::Config;
use super::schema::split_pair;

/// A `local:remote` path pair (shared folders, copy-in/out specs).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPair {
    pub local: String,
    pub remote: String,
}

impl PathPair {
    fn parse_all(items: &[String]) -> Vec<Self> {
        items
            .iter()
            .filter_map(|item| split_pair(item))
            .map(|(local, remote)| Self {
                local: local.to_string(),
                remote: remote.to_string(),
            })
            .collect()
    }
}

/// Where the image store keeps base and session-local images.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorePaths {
    pub backend: Option<PathBuf>,
    pub frontend: Option<PathBuf>,
}

impl StorePaths {
    fn from_config(config: &Config) -> Self {
        Self {
            backend: config.get_str("image_backend").map(PathBuf::from),
            frontend: config.get_str("image_frontend").map(PathBuf::from),
        }
    }
}

fn strings(config: &Config, name: &str) -> Vec<String> {
    config.get_list(name).map(<[String]>::to_vec).unwrap_or_default()
}

fn seconds(config: &Config, name: &str) -> Option<Duration> {
    config
        .get_int(name)
        .and_then(|secs| u64::try_from(secs).ok())
        .map(Duration::from_secs)
}

/// Resolved options for `transient run`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub image: Vec<String>,
    pub store: StorePaths,
    pub name: Option<String>,
    pub config: Option<PathBuf>,
    pub copy_in_before: Vec<PathPair>,
    pub copy_out_after: Vec<PathPair>,
    pub copy_timeout: Option<Duration>,
    pub prepare_only: bool,
    pub qemu_args: Vec<String>,
    pub qmp_timeout: Option<Duration>,
    pub shutdown_timeout: Duration,
    pub ssh_command: Option<String>,
    pub ssh_bin_name: String,
    pub ssh_port: Option<u16>,
    pub ssh_timeout: Duration,
    pub ssh_user: String,
    pub ssh_console: bool,
    pub ssh_with_serial: bool,
    pub shared_folder: Vec<PathPair>,
}

impl RunConfig {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            image: strings(config, "image"),
            store: StorePaths::from_config(config),
            name: config.get_str("name").map(str::to_string),
            config: config.get_str("config").map(PathBuf::from),
            copy_in_before: PathPair::parse_all(&strings(config, "copy_in_before")),
            copy_out_after: PathPair::parse_all(&strings(config, "copy_out_after")),
            copy_timeout: seconds(config, "copy_timeout"),
            prepare_only: config.get_bool("prepare_only").unwrap_or(false),
            qemu_args: strings(config, "qemu_args"),
            qmp_timeout: seconds(config, "qmp_timeout"),
            shutdown_timeout: seconds(config, "shutdown_timeout").unwrap_or_default(),
            ssh_command: config.get_str("ssh_command").map(str::to_string),
            ssh_bin_name: config.get_str("ssh_bin_name").unwrap_or("ssh").to_string(),
            ssh_port: config
                .get_int("ssh_port")
                .and_then(|port| u16::try_from(port).ok()),
            ssh_timeout: seconds(config, "ssh_timeout").unwrap_or_default(),
            ssh_user: config.get_str("ssh_user").unwrap_or("vagrant").to_string(),
            ssh_console: config.get_bool("ssh_console").unwrap_or(false),
            ssh_with_serial: config.get_bool("ssh_with_serial").unwrap_or(false),
            shared_folder: PathPair::parse_all(&strings(config, "shared_folder")),
        }
    }
}

/// Resolved options for `transient list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListConfig {
    pub image: Vec<String>,
    pub store: StorePaths,
    pub name: Option<String>,
}

impl ListConfig {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            image: strings(config, "image"),
            store: StorePaths::from_config(config),
            name: config.get_str("name").map(str::to_string),
        }
    }
}

/// Resolved options for `transient delete`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteConfig {
    pub image: Vec<String>,
    pub store: StorePaths,
    pub name: Option<String>,
    pub force: bool,
}

impl DeleteConfig {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            image: strings(config, "image"),
            store: StorePaths::from_config(config),
            name: config.get_str("name").map(str::to_string),
            force: config.get_bool("force").unwrap_or(false),
        }
    }
}
