use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Lifecycle stage of a single VM session.
///
/// Stages advance strictly in order; `Prepared` is the early-exit point for
/// prepare-only sessions and `Bridging` is skipped when no remote shell is
/// requested.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SessionStage {
    Init,
    Provisioning,
    Prepared,
    Launching,
    Running,
    Bridging,
    Teardown,
    Done,
}

impl SessionStage {
    /// The stage that follows this one, or `None` once the session is done.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Init => Some(Self::Provisioning),
            Self::Provisioning => Some(Self::Prepared),
            Self::Prepared => Some(Self::Launching),
            Self::Launching => Some(Self::Running),
            Self::Running => Some(Self::Bridging),
            Self::Bridging => Some(Self::Teardown),
            Self::Teardown => Some(Self::Done),
            Self::Done => None,
        }
    }

    /// Short human-readable description used in progress output.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Init => "initializing session",
            Self::Provisioning => "provisioning disk images",
            Self::Prepared => "images prepared",
            Self::Launching => "starting virtual machine",
            Self::Running => "virtual machine running",
            Self::Bridging => "connecting to guest",
            Self::Teardown => "shutting down guest",
            Self::Done => "session finished",
        }
    }
}

impl fmt::Display for SessionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A disk image materialized for one session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VmImage {
    /// Image name as requested (e.g. `centos/7:2004.01`).
    pub name: String,
    /// Position of the image in the request list; also the attachment order.
    pub index: usize,
    /// Session-local image file.
    pub path: PathBuf,
}

/// Connection parameters for the guest's SSH daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SshConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    /// SSH client executable, looked up on `PATH` when not absolute.
    pub ssh_bin_name: String,
}

impl SshConfig {
    /// `user@host` destination string.
    #[must_use]
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}
