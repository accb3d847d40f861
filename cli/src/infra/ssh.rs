//! SSH client — implements `RemoteShell` by spawning the system `ssh`.
//!
//! The guest is a throwaway VM on a forwarded localhost port, so host keys
//! are neither checked nor recorded.

use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Child;
use tokio::time::Instant;
use transient_common::SshConfig;

use crate::application::ports::{CommandRunner, InteractiveConnection, PipedConnection, RemoteShell};
use crate::infra::command_runner::exit_code;

/// Delay between reachability probes.
pub const PROBE_INTERVAL: Duration = Duration::from_secs(1);
/// Upper bound for a single probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Arguments shared by every invocation: port, host-key options, destination.
#[must_use]
pub fn ssh_args(config: &SshConfig) -> Vec<String> {
    vec![
        "-p".to_string(),
        config.port.to_string(),
        "-o".to_string(),
        "StrictHostKeyChecking=no".to_string(),
        "-o".to_string(),
        "UserKnownHostsFile=/dev/null".to_string(),
        config.destination(),
    ]
}

/// Non-interactive probe that succeeds once the guest accepts logins.
#[must_use]
pub fn probe_args(config: &SshConfig) -> Vec<String> {
    let mut args = ssh_args(config);
    let destination = args.pop().unwrap_or_default();
    args.extend([
        "-o".to_string(),
        "BatchMode=yes".to_string(),
        "-o".to_string(),
        "ConnectTimeout=5".to_string(),
        destination,
        "exit".to_string(),
    ]);
    args
}

/// Production `RemoteShell`.
#[derive(Debug, Clone)]
pub struct SshClient<R: CommandRunner> {
    runner: R,
}

impl<R: CommandRunner> SshClient<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    /// Probe the guest every [`PROBE_INTERVAL`] until it answers or
    /// `timeout` passes.
    ///
    /// # Errors
    ///
    /// Returns an error when the deadline expires first.
    pub async fn wait_until_reachable(&self, config: &SshConfig, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let args = probe_args(config);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self
                .runner
                .run_with_timeout(&config.ssh_bin_name, &args, remaining.min(PROBE_TIMEOUT))
                .await
            {
                Ok(output) if output.status.success() => {
                    tracing::debug!(attempts, "guest reachable over SSH");
                    return Ok(());
                }
                Ok(output) => tracing::trace!(status = ?output.status, "ssh probe failed"),
                Err(e) => tracing::trace!(error = %e, "ssh probe failed"),
            }
            if Instant::now() + PROBE_INTERVAL >= deadline {
                anyhow::bail!(
                    "guest not reachable at {}:{} after {}s",
                    config.host,
                    config.port,
                    timeout.as_secs()
                );
            }
            tokio::time::sleep(PROBE_INTERVAL).await;
        }
    }

    fn command(config: &SshConfig, remote_command: Option<&str>) -> tokio::process::Command {
        let mut command = tokio::process::Command::new(&config.ssh_bin_name);
        command.args(ssh_args(config)).kill_on_drop(true);
        if let Some(remote) = remote_command {
            command.arg(remote);
        }
        command
    }
}

impl<R: CommandRunner> RemoteShell for SshClient<R> {
    type Interactive = SshConnection;
    type Piped = PipedSshConnection;

    async fn connect_interactive(
        &self,
        config: &SshConfig,
        command: Option<&str>,
        timeout: Duration,
    ) -> Result<SshConnection> {
        self.wait_until_reachable(config, timeout).await?;
        let child = Self::command(config, command)
            .spawn()
            .with_context(|| format!("failed to spawn {}", config.ssh_bin_name))?;
        tracing::info!(destination = %config.destination(), port = config.port, "ssh connected");
        Ok(SshConnection { child })
    }

    async fn connect_piped(
        &self,
        config: &SshConfig,
        command: Option<&str>,
        timeout: Duration,
    ) -> Result<PipedSshConnection> {
        self.wait_until_reachable(config, timeout).await?;
        let child = Self::command(config, command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn {}", config.ssh_bin_name))?;
        Ok(PipedSshConnection { child })
    }
}

/// SSH attached to the user's terminal.
pub struct SshConnection {
    child: Child,
}

impl InteractiveConnection for SshConnection {
    async fn wait(&mut self) -> Result<i32> {
        let status = self.child.wait().await.context("waiting for ssh")?;
        Ok(exit_code(status))
    }
}

/// SSH with piped standard streams.
pub struct PipedSshConnection {
    child: Child,
}

impl PipedConnection for PipedSshConnection {
    async fn communicate(&mut self, input: &[u8], timeout: Duration) -> Result<(Vec<u8>, Vec<u8>)> {
        let stdin = self.child.stdin.take();
        let mut stdout = self.child.stdout.take();
        let mut stderr = self.child.stderr.take();

        let exchange = async {
            if let Some(mut stdin) = stdin {
                stdin.write_all(input).await.context("writing to ssh")?;
                // Dropping stdin closes it, ending the remote shell's input.
            }
            let (out, err) = tokio::join!(
                async {
                    let mut buf = Vec::new();
                    if let Some(ref mut h) = stdout {
                        let _ = h.read_to_end(&mut buf).await;
                    }
                    buf
                },
                async {
                    let mut buf = Vec::new();
                    if let Some(ref mut h) = stderr {
                        let _ = h.read_to_end(&mut buf).await;
                    }
                    buf
                },
            );
            Ok::<_, anyhow::Error>((out, err))
        };

        if let Ok(result) = tokio::time::timeout(timeout, exchange).await {
            result
        } else {
            let _ = self.child.kill().await;
            anyhow::bail!("ssh did not finish within {}s", timeout.as_secs())
        }
    }

    fn poll(&mut self) -> Result<Option<i32>> {
        Ok(self.child.try_wait().context("polling ssh")?.map(exit_code))
    }
}
