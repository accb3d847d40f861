//! Session planning: which features a run needs, the console policy, and the
//! hypervisor arguments synthesized for devices and networking.
//!
//! Pure functions only. Port allocation and process control live behind the
//! application ports.

use transient_common::{SshConfig, VmImage};

use crate::domain::config::RunConfig;

/// Host the guest's forwarded SSH port is reached on.
pub const SSH_HOST: &str = "localhost";
/// Guest port the forwarding rule targets.
pub const GUEST_SSH_PORT: u16 = 22;
/// QEMU id shared by the user-mode netdev and the NIC bound to it.
pub const SSH_NETDEV_ID: &str = "transient-sshdev";
/// Command sent over SSH to power the guest off after the shell exits.
pub const GUEST_SHUTDOWN_COMMAND: &str = "sudo shutdown -h now";

/// How the hypervisor's own console output is handled.
///
/// The variants are mutually exclusive: a console is either fully quiet from
/// the start, visible until silenced, or left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsolePolicy {
    /// No redirection; the hypervisor owns the terminal.
    Inherit,
    /// Hypervisor output discarded; the remote shell is the only surface.
    Quiet,
    /// Serial console shown until the remote shell is confirmed live.
    Silenceable,
}

impl RunConfig {
    /// Any feature that needs the guest reachable over SSH.
    #[must_use]
    pub fn needs_ssh(&self) -> bool {
        self.needs_bridging() || !self.shared_folder.is_empty()
    }

    /// Whether the session ends in an SSH connection the user interacts with
    /// (or that carries `ssh_command`).
    #[must_use]
    pub fn needs_bridging(&self) -> bool {
        self.ssh_console || self.ssh_with_serial || self.ssh_command.is_some()
    }

    /// Console policy for the hypervisor process.
    #[must_use]
    pub fn console_policy(&self) -> ConsolePolicy {
        if !self.needs_bridging() {
            ConsolePolicy::Inherit
        } else if self.ssh_with_serial {
            ConsolePolicy::Silenceable
        } else {
            ConsolePolicy::Quiet
        }
    }

    /// SSH descriptor for a guest forwarded on `port`.
    #[must_use]
    pub fn ssh_config(&self, port: u16) -> SshConfig {
        SshConfig {
            host: SSH_HOST.to_string(),
            port,
            user: self.ssh_user.clone(),
            ssh_bin_name: self.ssh_bin_name.clone(),
        }
    }
}

/// One `-drive` pair per image, in attachment order.
#[must_use]
pub fn disk_args(images: &[VmImage]) -> Vec<String> {
    images
        .iter()
        .flat_map(|image| {
            [
                "-drive".to_string(),
                format!("file={}", image.path.display()),
            ]
        })
        .collect()
}

/// User-mode network forwarding `host_port` to the guest's SSH port, plus
/// the NIC attached to it.
#[must_use]
pub fn ssh_forward_args(host_port: u16) -> Vec<String> {
    vec![
        "-netdev".to_string(),
        format!("user,id={SSH_NETDEV_ID},hostfwd=tcp::{host_port}-:{GUEST_SSH_PORT}"),
        "-device".to_string(),
        format!("e1000,netdev={SSH_NETDEV_ID}"),
    ]
}

/// Full hypervisor argument list.
///
/// Synthesized arguments come first so the user's pass-through arguments can
/// still append to or override them. `ssh_port` must be `Some` exactly when
/// [`RunConfig::needs_ssh`] holds.
#[must_use]
pub fn compose_qemu_args(config: &RunConfig, images: &[VmImage], ssh_port: Option<u16>) -> Vec<String> {
    let mut args = disk_args(images);
    if let Some(port) = ssh_port {
        args.push("-nographic".to_string());
        args.extend(ssh_forward_args(port));
    }
    args.extend(config.qemu_args.iter().cloned());
    args
}
