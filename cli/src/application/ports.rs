//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` and the shared types crate —
//! never from `crate::infra`, `crate::commands`, or `crate::output`.

use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use transient_common::{SshConfig, VmImage};

use crate::domain::ConsolePolicy;

// ── Value Types ───────────────────────────────────────────────────────────────

/// A session-local image found in the image store.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FrontendImage {
    /// Session the image was created for.
    pub session: String,
    /// Position of the image within that session.
    pub index: usize,
    /// Image name the file was created from.
    pub image: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// Selects frontend images by session name and/or image names.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageFilter<'a> {
    pub session: Option<&'a str>,
    /// Empty matches every image.
    pub images: &'a [String],
}

impl ImageFilter<'_> {
    #[must_use]
    pub fn matches(&self, image: &FrontendImage) -> bool {
        self.session.is_none_or(|s| s == image.session)
            && (self.images.is_empty() || self.images.iter().any(|i| *i == image.image))
    }
}

// ── Image Store Port ──────────────────────────────────────────────────────────

/// Materializes and manages disk images.
#[allow(async_fn_in_trait)]
pub trait ImageStore {
    /// Create a session-local copy of `image` tagged with `session` and
    /// `index`.
    async fn create_vm_image(&self, image: &str, session: &str, index: usize) -> Result<VmImage>;
    /// List session-local images matching `filter`.
    async fn list_vm_images(&self, filter: &ImageFilter<'_>) -> Result<Vec<FrontendImage>>;
    /// Remove a session-local image.
    async fn delete_vm_image(&self, image: &FrontendImage) -> Result<()>;
}

// ── Hypervisor Process Port ───────────────────────────────────────────────────

/// Starts the hypervisor process.
#[allow(async_fn_in_trait)]
pub trait VmLauncher {
    type Handle: VmHandle;

    /// Start the hypervisor with `args` under the given console policy.
    async fn start(&self, args: &[String], policy: ConsolePolicy) -> Result<Self::Handle>;
}

/// A running hypervisor process.
#[allow(async_fn_in_trait)]
pub trait VmHandle {
    /// Stop forwarding the hypervisor's console output.
    ///
    /// # Errors
    ///
    /// Returns an error when the process was started under
    /// [`ConsolePolicy::Inherit`], which cannot be silenced.
    fn silence(&self) -> Result<()>;
    /// Wait for the process to exit. When `timeout` expires the process is
    /// terminated and its final status returned.
    async fn wait(&mut self, timeout: Option<Duration>) -> Result<i32>;
    /// Ask the process to exit, killing it if it is still running after a
    /// grace period.
    async fn terminate(&mut self) -> Result<()>;
}

// ── Remote Shell Port ─────────────────────────────────────────────────────────

/// SSH client for the guest.
#[allow(async_fn_in_trait)]
pub trait RemoteShell {
    type Interactive: InteractiveConnection;
    type Piped: PipedConnection;

    /// Connect with the user's terminal attached. Runs `command` instead of a
    /// login shell when given. Fails once `timeout` passes without the guest
    /// becoming reachable.
    async fn connect_interactive(
        &self,
        config: &SshConfig,
        command: Option<&str>,
        timeout: Duration,
    ) -> Result<Self::Interactive>;

    /// Connect with stdin/stdout/stderr piped to the caller.
    async fn connect_piped(
        &self,
        config: &SshConfig,
        command: Option<&str>,
        timeout: Duration,
    ) -> Result<Self::Piped>;
}

/// An SSH connection attached to the user's terminal.
#[allow(async_fn_in_trait)]
pub trait InteractiveConnection {
    /// Block until the connection closes; returns its exit status.
    async fn wait(&mut self) -> Result<i32>;
}

/// An SSH connection with piped standard streams.
#[allow(async_fn_in_trait)]
pub trait PipedConnection {
    /// Send `input`, close stdin, and collect `(stdout, stderr)`.
    async fn communicate(&mut self, input: &[u8], timeout: Duration) -> Result<(Vec<u8>, Vec<u8>)>;
    /// Exit status if the connection has finished.
    fn poll(&mut self) -> Result<Option<i32>>;
}

// ── Filesystem Bridge Port ────────────────────────────────────────────────────

/// Mounts host directories inside the guest.
#[allow(async_fn_in_trait)]
pub trait FolderMounter {
    /// Mount `local_dir` (absolute) at `remote_dir` in the guest, connecting
    /// as described by `ssh` within `connect_timeout`.
    async fn mount(
        &self,
        ssh: &SshConfig,
        local_dir: &Path,
        remote_dir: &str,
        local_user: &str,
        connect_timeout: Duration,
    ) -> Result<()>;
}

// ── Host Resource Ports ───────────────────────────────────────────────────────

/// Hands out a host TCP port for the SSH forward.
pub trait PortAllocator {
    /// A port that was free at the time of the call.
    ///
    /// The port is not held; another process may claim it before the
    /// hypervisor binds it.
    fn allocate(&self) -> Result<u16>;
}

/// Identity of the user running the launcher.
pub trait LocalIdentity {
    fn current_user(&self) -> Result<String>;
}

/// Composite trait — everything a session needs from the host.
pub trait SessionBackend:
    ImageStore + VmLauncher + RemoteShell + FolderMounter + PortAllocator + LocalIdentity
{
}

/// Blanket implementation: any type implementing all sub-traits is a `SessionBackend`.
impl<T> SessionBackend for T where
    T: ImageStore + VmLauncher + RemoteShell + FolderMounter + PortAllocator + LocalIdentity
{
}

// ── Configuration File Port ───────────────────────────────────────────────────

/// Reads the raw text of a configuration file.
pub trait ConfigFileReader {
    fn read_to_string(&self, path: &Path) -> std::io::Result<String>;
}

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts process execution so infrastructure can be swapped or mocked.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program and capture its output.
    ///
    /// Implementations should delegate to `run_with_timeout` using the
    /// instance's configured default timeout.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output>;
    /// Run a program with a custom timeout override.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds `timeout`.
    /// On timeout, the child process must be killed (not left orphaned).
    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: std::time::Duration,
    ) -> Result<Output>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait — no async needed.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}
