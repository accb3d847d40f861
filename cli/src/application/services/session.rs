//! Application service — VM session use-case.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.
//! All I/O is routed through injected port traits.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::Instrument;
use transient_common::{SessionStage, SshConfig, VmImage};

use crate::application::ports::{
    FolderMounter, ImageStore, InteractiveConnection, LocalIdentity, PipedConnection,
    PortAllocator, ProgressReporter, RemoteShell, SessionBackend, VmHandle,
};
use crate::domain::config::RunConfig;
use crate::domain::error::SessionError;
use crate::domain::session::{GUEST_SHUTDOWN_COMMAND, compose_qemu_args};

/// Timeout for the in-guest shutdown request, connect and command alike.
pub const SHUTDOWN_COMMAND_TIMEOUT: Duration = Duration::from_secs(15);

/// Session name used when none was configured.
#[must_use]
pub fn generate_session_name() -> String {
    format!("transient-{}-{}", Utc::now().timestamp(), std::process::id())
}

/// Tracks the lifecycle stage and reports each transition.
struct StageTracker<'a, R: ProgressReporter> {
    stage: SessionStage,
    reporter: &'a R,
}

impl<'a, R: ProgressReporter> StageTracker<'a, R> {
    fn new(reporter: &'a R) -> Self {
        Self {
            stage: SessionStage::Init,
            reporter,
        }
    }

    fn enter(&mut self, stage: SessionStage) {
        debug_assert!(
            std::iter::successors(self.stage.next(), |s| s.next()).any(|s| s == stage),
            "{stage} cannot follow {}",
            self.stage
        );
        tracing::debug!(from = %self.stage, to = %stage, "session stage");
        self.stage = stage;
        // The guest owns the terminal from launch until teardown.
        match stage {
            SessionStage::Provisioning | SessionStage::Launching | SessionStage::Teardown => {
                self.reporter.step(stage.description());
            }
            _ => self.reporter.success(stage.description()),
        }
    }
}

/// Run one session end to end and return its exit code.
///
/// With interactive bridging the code is the remote shell's exit status;
/// otherwise it is the hypervisor's. After the shell exits the hypervisor is
/// given `config.shutdown_timeout` (20s unless configured) to power off
/// before it is terminated, rather than a fixed grace period.
///
/// # Errors
///
/// Provisioning, port allocation, launch, shared-folder mounts and the
/// initial SSH connection are fatal. Failures after launch terminate the
/// hypervisor before returning. Failures during the post-shell shutdown
/// sequence are logged and do not affect the result.
pub async fn run_session(
    config: &RunConfig,
    backend: &impl SessionBackend,
    reporter: &impl ProgressReporter,
) -> Result<i32> {
    let session = config
        .name
        .clone()
        .unwrap_or_else(generate_session_name);
    let span = tracing::info_span!("session", name = %session);
    drive_session(config, &session, backend, reporter)
        .instrument(span)
        .await
}

async fn drive_session(
    config: &RunConfig,
    session: &str,
    backend: &impl SessionBackend,
    reporter: &impl ProgressReporter,
) -> Result<i32> {
    let mut stages = StageTracker::new(reporter);

    stages.enter(SessionStage::Provisioning);
    let images = provision_images(backend, &config.image, session).await?;
    stages.enter(SessionStage::Prepared);
    if config.prepare_only {
        tracing::info!(images = images.len(), "prepare only; not launching");
        return Ok(0);
    }

    stages.enter(SessionStage::Launching);
    let ssh = if config.needs_ssh() {
        Some(config.ssh_config(resolve_ssh_port(config, backend)?))
    } else {
        None
    };
    let args = compose_qemu_args(config, &images, ssh.as_ref().map(|s| s.port));
    tracing::info!(args = ?args, "starting virtual machine");
    let mut vm = backend
        .start(&args, config.console_policy())
        .await
        .context(SessionError::Launch)?;
    stages.enter(SessionStage::Running);

    let outcome = match &ssh {
        Some(ssh) => attach(config, ssh, backend, &mut vm, &mut stages).await,
        None => vm.wait(None).await,
    };
    let code = match outcome {
        Ok(code) => code,
        Err(err) => {
            if let Err(kill_err) = vm.terminate().await {
                tracing::warn!(error = %kill_err, "failed to terminate virtual machine");
            }
            return Err(err);
        }
    };

    stages.enter(SessionStage::Done);
    tracing::info!(code, "session finished");
    Ok(code)
}

/// Provision every requested image in order. The first failure aborts.
///
/// # Errors
///
/// Returns [`SessionError::Provisioning`] (as context) for the failing image.
pub async fn provision_images(
    store: &impl ImageStore,
    names: &[String],
    session: &str,
) -> Result<Vec<VmImage>> {
    let mut images = Vec::with_capacity(names.len());
    for (index, name) in names.iter().enumerate() {
        let image = store
            .create_vm_image(name, session, index)
            .await
            .with_context(|| SessionError::Provisioning {
                image: name.clone(),
                index,
            })?;
        tracing::info!(image = %name, index, path = %image.path.display(), "image ready");
        images.push(image);
    }
    Ok(images)
}

fn resolve_ssh_port(config: &RunConfig, ports: &impl PortAllocator) -> Result<u16> {
    if let Some(port) = config.ssh_port {
        return Ok(port);
    }
    let port = ports.allocate().context("failed to allocate a host port for SSH")?;
    tracing::debug!(port, "allocated SSH forward port");
    Ok(port)
}

/// Mount shared folders, then bridge or wait, then shut the guest down.
async fn attach<B, H, R>(
    config: &RunConfig,
    ssh: &SshConfig,
    backend: &B,
    vm: &mut H,
    stages: &mut StageTracker<'_, R>,
) -> Result<i32>
where
    B: SessionBackend,
    H: VmHandle,
    R: ProgressReporter,
{
    mount_shared_folders(config, ssh, backend).await?;

    if !config.needs_bridging() {
        return vm.wait(None).await;
    }

    stages.enter(SessionStage::Bridging);
    let code = bridge(config, ssh, backend, vm).await?;

    stages.enter(SessionStage::Teardown);
    if let Err(err) = shutdown_guest(ssh, backend).await {
        tracing::warn!(error = %err, "guest shutdown request failed");
    }
    match vm.wait(Some(config.shutdown_timeout)).await {
        Ok(vm_code) => tracing::debug!(vm_code, "virtual machine exited"),
        Err(err) => tracing::warn!(error = %err, "virtual machine did not exit cleanly"),
    }
    Ok(code)
}

/// Mount each `local:remote` pair in configuration order. The first failure
/// aborts.
///
/// # Errors
///
/// Returns [`SessionError::Mount`] (as context) for the failing pair.
pub async fn mount_shared_folders(
    config: &RunConfig,
    ssh: &SshConfig,
    backend: &(impl FolderMounter + LocalIdentity),
) -> Result<()> {
    if config.shared_folder.is_empty() {
        return Ok(());
    }
    let user = backend.current_user()?;
    for pair in &config.shared_folder {
        let local = std::path::absolute(Path::new(&pair.local))
            .with_context(|| format!("cannot resolve local path '{}'", pair.local))?;
        backend
            .mount(ssh, &local, &pair.remote, &user, config.ssh_timeout)
            .await
            .with_context(|| SessionError::Mount {
                local: local.display().to_string(),
                remote: pair.remote.clone(),
            })?;
        tracing::info!(local = %local.display(), remote = %pair.remote, "shared folder mounted");
    }
    Ok(())
}

async fn bridge<B, H>(config: &RunConfig, ssh: &SshConfig, shell: &B, vm: &H) -> Result<i32>
where
    B: RemoteShell,
    H: VmHandle,
{
    let mut connection = shell
        .connect_interactive(ssh, config.ssh_command.as_deref(), config.ssh_timeout)
        .await
        .context(SessionError::Connect)?;
    vm.silence()?;
    let code = connection.wait().await?;
    tracing::info!(code, "ssh session closed");
    Ok(code)
}

async fn shutdown_guest(ssh: &SshConfig, shell: &impl RemoteShell) -> Result<()> {
    let mut connection = shell
        .connect_piped(ssh, None, SHUTDOWN_COMMAND_TIMEOUT)
        .await?;
    let (stdout, stderr) = connection
        .communicate(GUEST_SHUTDOWN_COMMAND.as_bytes(), SHUTDOWN_COMMAND_TIMEOUT)
        .await?;
    tracing::debug!(
        status = ?connection.poll()?,
        stdout = %String::from_utf8_lossy(&stdout).trim(),
        stderr = %String::from_utf8_lossy(&stderr).trim(),
        "shutdown request sent"
    );
    Ok(())
}
