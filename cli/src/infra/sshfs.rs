//! Filesystem bridge — implements `FolderMounter` with sshfs in slave mode.
//!
//! The guest runs `sshfs -o slave`, which speaks SFTP over its own stdio
//! instead of opening a connection. That stdio is the SSH channel, and we
//! wire the other end to a local `sftp-server`, so the guest mounts a host
//! directory without being able to reach the host.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::process::Child;
use tokio::time::Instant;
use transient_common::SshConfig;

use crate::application::ports::{CommandRunner, FolderMounter};
use crate::infra::command_runner::stderr_text;
use crate::infra::ssh::{PROBE_INTERVAL, SshClient, ssh_args};

/// Usual `sftp-server` locations across distributions.
pub const SFTP_SERVER_PATHS: &[&str] = &[
    "/usr/lib/openssh/sftp-server",
    "/usr/libexec/openssh/sftp-server",
    "/usr/lib/ssh/sftp-server",
    "/usr/libexec/sftp-server",
];

/// First `sftp-server` that exists on this host.
///
/// # Errors
///
/// Returns an error when none of [`SFTP_SERVER_PATHS`] exists.
pub fn find_sftp_server() -> Result<PathBuf> {
    SFTP_SERVER_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .with_context(|| {
            format!(
                "sftp-server not found (looked in {}); install openssh-server",
                SFTP_SERVER_PATHS.join(", ")
            )
        })
}

/// One shell-quoted command line for ssh, which hands it to the guest's
/// shell for re-splitting.
#[must_use]
pub fn remote_command<S: AsRef<str>>(args: &[S]) -> String {
    shell_words::join(args)
}

/// Remote command that mounts `local_dir` (served over stdio) at `remote_dir`.
#[must_use]
pub fn sshfs_remote_args(local_user: &str, local_dir: &Path, remote_dir: &str) -> Vec<String> {
    let local = local_dir.display();
    let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
    vec![
        "sudo".to_string(),
        "sshfs".to_string(),
        "-o".to_string(),
        format!("slave,fsname={local_user}@{host}:{local}"),
        format!(":{local}"),
        remote_dir.to_string(),
    ]
}

/// Production `FolderMounter`. Bridges live as long as the mounter.
pub struct SshfsMounter<R: CommandRunner> {
    ssh: SshClient<R>,
    runner: R,
    bridges: Mutex<Vec<Child>>,
}

impl<R: CommandRunner + Clone> SshfsMounter<R> {
    pub fn new(runner: R) -> Self {
        Self {
            ssh: SshClient::new(runner.clone()),
            runner,
            bridges: Mutex::new(Vec::new()),
        }
    }
}

impl<R: CommandRunner> SshfsMounter<R> {
    async fn run_remote(&self, ssh: &SshConfig, remote: &[&str], timeout: Duration) -> Result<bool> {
        let mut args = ssh_args(ssh);
        args.push(remote_command(remote));
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self
            .runner
            .run_with_timeout(&ssh.ssh_bin_name, &args, timeout)
            .await?;
        if !output.status.success() {
            tracing::debug!(?remote, stderr = %stderr_text(&output), "remote command failed");
        }
        Ok(output.status.success())
    }

    fn spawn_bridge(ssh: &SshConfig, sftp_server: &Path, remote: Vec<String>) -> Result<(Child, Child)> {
        let mut server = tokio::process::Command::new(sftp_server)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {}", sftp_server.display()))?;

        let mut client = tokio::process::Command::new(&ssh.ssh_bin_name)
            .args(ssh_args(ssh))
            .arg(remote_command(&remote))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {}", ssh.ssh_bin_name))?;

        if let (Some(mut from_server), Some(mut to_client)) = (server.stdout.take(), client.stdin.take()) {
            tokio::spawn(async move {
                let _ = tokio::io::copy(&mut from_server, &mut to_client).await;
            });
        }
        if let (Some(mut from_client), Some(mut to_server)) = (client.stdout.take(), server.stdin.take()) {
            tokio::spawn(async move {
                let _ = tokio::io::copy(&mut from_client, &mut to_server).await;
            });
        }
        Ok((server, client))
    }
}

impl<R: CommandRunner> FolderMounter for SshfsMounter<R> {
    async fn mount(
        &self,
        ssh: &SshConfig,
        local_dir: &Path,
        remote_dir: &str,
        local_user: &str,
        connect_timeout: Duration,
    ) -> Result<()> {
        let deadline = Instant::now() + connect_timeout;
        self.ssh.wait_until_reachable(ssh, connect_timeout).await?;

        let remaining = deadline.saturating_duration_since(Instant::now());
        if !self
            .run_remote(ssh, &["sudo", "mkdir", "-p", remote_dir], remaining)
            .await?
        {
            anyhow::bail!("cannot create '{remote_dir}' in the guest");
        }

        let sftp_server = find_sftp_server()?;
        let (server, mut client) = Self::spawn_bridge(
            ssh,
            &sftp_server,
            sshfs_remote_args(local_user, local_dir, remote_dir),
        )?;

        loop {
            if let Some(status) = client.try_wait()? {
                anyhow::bail!("sshfs exited before the mount appeared ({status})");
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if self
                .run_remote(ssh, &["mountpoint", "-q", remote_dir], remaining.max(PROBE_INTERVAL))
                .await
                .unwrap_or(false)
            {
                break;
            }
            if Instant::now() >= deadline {
                anyhow::bail!(
                    "'{remote_dir}' was not mounted within {}s",
                    connect_timeout.as_secs()
                );
            }
            tokio::time::sleep(PROBE_INTERVAL).await;
        }

        let mut bridges = self
            .bridges
            .lock()
            .map_err(|_| anyhow::anyhow!("sshfs bridge registry poisoned"))?;
        bridges.push(server);
        bridges.push(client);
        Ok(())
    }
}
