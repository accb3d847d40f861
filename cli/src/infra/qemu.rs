//! Hypervisor process wrapper — implements `VmLauncher` for
//! `qemu-system-x86_64`.
//!
//! Under [`ConsolePolicy::Silenceable`] the serial console is proxied to our
//! stdout by a background task. Output before the first kernel timestamp is
//! held back so firmware escape sequences never reach the terminal, and once
//! silenced the task keeps draining the pipe without forwarding.
//!
//! Stopping sends SIGTERM, which QEMU handles by flushing its disk images,
//! and only kills the process when it is still alive after a grace period.

use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use regex::bytes::Regex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdout};

use crate::application::ports::{VmHandle, VmLauncher};
use crate::domain::ConsolePolicy;
use crate::infra::command_runner::exit_code;

/// Hypervisor binary.
pub const QEMU_BIN: &str = "qemu-system-x86_64";

/// Kernel log timestamp, e.g. `[    0.000000]`.
static BOOT_TIMESTAMP: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\[[ \d]+\.\d+\]").ok());

/// Time QEMU gets to exit after SIGTERM before it is killed.
pub const TERMINATE_GRACE: Duration = Duration::from_secs(5);

/// Bytes of pre-boot output retained while searching for the timestamp.
const PENDING_TAIL: usize = 256;

/// Offset of the first kernel timestamp in `output`.
#[must_use]
pub fn boot_output_start(output: &[u8]) -> Option<usize> {
    BOOT_TIMESTAMP.as_ref()?.find(output).map(|m| m.start())
}

/// Production `VmLauncher`.
#[derive(Debug, Clone)]
pub struct QemuRunner {
    binary: String,
    terminate_grace: Duration,
}

impl QemuRunner {
    #[must_use]
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            terminate_grace: TERMINATE_GRACE,
        }
    }

    /// Override [`TERMINATE_GRACE`].
    #[must_use]
    pub fn with_terminate_grace(mut self, grace: Duration) -> Self {
        self.terminate_grace = grace;
        self
    }
}

impl Default for QemuRunner {
    fn default() -> Self {
        Self::new(QEMU_BIN)
    }
}

impl VmLauncher for QemuRunner {
    type Handle = QemuSession;

    async fn start(&self, args: &[String], policy: ConsolePolicy) -> Result<QemuSession> {
        tracing::info!(binary = %self.binary, ?args, ?policy, "starting qemu");
        let mut command = tokio::process::Command::new(&self.binary);
        command.args(args).kill_on_drop(true);
        match policy {
            ConsolePolicy::Inherit => {}
            ConsolePolicy::Quiet => {
                command.stdin(Stdio::null()).stdout(Stdio::null());
            }
            ConsolePolicy::Silenceable => {
                command.stdin(Stdio::null()).stdout(Stdio::piped());
            }
        }

        let mut child = command
            .spawn()
            .with_context(|| format!("failed to spawn {}", self.binary))?;

        let silenced = Arc::new(AtomicBool::new(false));
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(proxy_console(stdout, Arc::clone(&silenced)));
        }

        Ok(QemuSession {
            child,
            policy,
            silenced,
            terminate_grace: self.terminate_grace,
        })
    }
}

async fn proxy_console(mut source: ChildStdout, silenced: Arc<AtomicBool>) {
    let mut sink = tokio::io::stdout();
    let mut pending: Vec<u8> = Vec::new();
    let mut booted = false;
    let mut buf = [0u8; 4096];

    loop {
        let n = match source.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        if silenced.load(Ordering::Relaxed) {
            continue;
        }
        let chunk = if booted {
            &buf[..n]
        } else {
            pending.extend_from_slice(&buf[..n]);
            match boot_output_start(&pending) {
                Some(start) => {
                    booted = true;
                    pending.drain(..start);
                    &pending[..]
                }
                None => {
                    if pending.len() > PENDING_TAIL {
                        pending.drain(..pending.len() - PENDING_TAIL);
                    }
                    continue;
                }
            }
        };
        if sink.write_all(chunk).await.is_err() || sink.flush().await.is_err() {
            break;
        }
        if booted {
            pending.clear();
        }
    }
    tracing::debug!("console proxy finished");
}

/// A running `qemu-system-*` process.
pub struct QemuSession {
    child: Child,
    policy: ConsolePolicy,
    silenced: Arc<AtomicBool>,
    terminate_grace: Duration,
}

impl QemuSession {
    /// SIGTERM, then SIGKILL once the grace period has passed.
    async fn stop(&mut self) -> Result<ExitStatus> {
        if let Some(status) = self.child.try_wait().context("polling qemu")? {
            return Ok(status);
        }
        request_exit(&mut self.child);
        if let Ok(status) = tokio::time::timeout(self.terminate_grace, self.child.wait()).await {
            return status.context("waiting for qemu");
        }
        tracing::warn!(
            secs = self.terminate_grace.as_secs(),
            "qemu ignored SIGTERM; killing"
        );
        self.child.kill().await.context("failed to kill qemu")?;
        self.child.wait().await.context("waiting for qemu")
    }
}

#[cfg(unix)]
fn request_exit(child: &mut Child) {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let Some(pid) = child.id().and_then(|id| i32::try_from(id).ok()) else {
        return;
    };
    if let Err(e) = kill(Pid::from_raw(pid), Signal::SIGTERM)
        && e != Errno::ESRCH
    {
        tracing::warn!(pid, error = %e, "SIGTERM to qemu failed");
    }
}

#[cfg(not(unix))]
fn request_exit(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        tracing::warn!(error = %e, "failed to stop qemu");
    }
}

impl VmHandle for QemuSession {
    fn silence(&self) -> Result<()> {
        match self.policy {
            ConsolePolicy::Quiet => Ok(()),
            ConsolePolicy::Silenceable => {
                self.silenced.store(true, Ordering::Relaxed);
                tracing::debug!("console silenced");
                Ok(())
            }
            ConsolePolicy::Inherit => {
                anyhow::bail!("cannot silence a virtual machine that owns the terminal")
            }
        }
    }

    async fn wait(&mut self, timeout: Option<Duration>) -> Result<i32> {
        tracing::info!(?timeout, "waiting for qemu to exit");
        let status = match timeout {
            None => self.child.wait().await.context("waiting for qemu")?,
            Some(limit) => {
                if let Ok(status) = tokio::time::timeout(limit, self.child.wait()).await {
                    status.context("waiting for qemu")?
                } else {
                    tracing::warn!(secs = limit.as_secs(), "qemu did not exit in time; terminating");
                    self.stop().await?
                }
            }
        };
        Ok(exit_code(status))
    }

    async fn terminate(&mut self) -> Result<()> {
        let status = self.stop().await?;
        tracing::info!(code = exit_code(status), "qemu terminated");
        Ok(())
    }
}
