//! Host backend — bundles the production port implementations into one
//! `SessionBackend`.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use transient_common::{SshConfig, VmImage};

use crate::application::ports::{
    FolderMounter, FrontendImage, ImageFilter, ImageStore, LocalIdentity, PortAllocator,
    RemoteShell, VmLauncher,
};
use crate::domain::ConsolePolicy;
use crate::domain::config::StorePaths;
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::identity::SystemIdentity;
use crate::infra::image::QcowImageStore;
use crate::infra::network::EphemeralPortAllocator;
use crate::infra::qemu::{QemuRunner, QemuSession};
use crate::infra::ssh::{PipedSshConnection, SshClient, SshConnection};
use crate::infra::sshfs::SshfsMounter;

/// Everything a session needs from this host.
pub struct HostBackend {
    images: QcowImageStore<TokioCommandRunner>,
    qemu: QemuRunner,
    ssh: SshClient<TokioCommandRunner>,
    sshfs: SshfsMounter<TokioCommandRunner>,
    ports: EphemeralPortAllocator,
    identity: SystemIdentity,
}

impl HostBackend {
    /// # Errors
    ///
    /// Returns an error if the image store directories cannot be resolved.
    pub fn new(store: &StorePaths) -> Result<Self> {
        let runner = TokioCommandRunner::default();
        Ok(Self {
            images: QcowImageStore::new(store, runner)?,
            qemu: QemuRunner::default(),
            ssh: SshClient::new(runner),
            sshfs: SshfsMounter::new(runner),
            ports: EphemeralPortAllocator,
            identity: SystemIdentity,
        })
    }
}

impl ImageStore for HostBackend {
    async fn create_vm_image(&self, image: &str, session: &str, index: usize) -> Result<VmImage> {
        self.images.create_vm_image(image, session, index).await
    }

    async fn list_vm_images(&self, filter: &ImageFilter<'_>) -> Result<Vec<FrontendImage>> {
        self.images.list_vm_images(filter).await
    }

    async fn delete_vm_image(&self, image: &FrontendImage) -> Result<()> {
        self.images.delete_vm_image(image).await
    }
}

impl VmLauncher for HostBackend {
    type Handle = QemuSession;

    async fn start(&self, args: &[String], policy: ConsolePolicy) -> Result<QemuSession> {
        self.qemu.start(args, policy).await
    }
}

impl RemoteShell for HostBackend {
    type Interactive = SshConnection;
    type Piped = PipedSshConnection;

    async fn connect_interactive(
        &self,
        config: &SshConfig,
        command: Option<&str>,
        timeout: Duration,
    ) -> Result<SshConnection> {
        self.ssh.connect_interactive(config, command, timeout).await
    }

    async fn connect_piped(
        &self,
        config: &SshConfig,
        command: Option<&str>,
        timeout: Duration,
    ) -> Result<PipedSshConnection> {
        self.ssh.connect_piped(config, command, timeout).await
    }
}

impl FolderMounter for HostBackend {
    async fn mount(
        &self,
        ssh: &SshConfig,
        local_dir: &Path,
        remote_dir: &str,
        local_user: &str,
        connect_timeout: Duration,
    ) -> Result<()> {
        self.sshfs
            .mount(ssh, local_dir, remote_dir, local_user, connect_timeout)
            .await
    }
}

impl PortAllocator for HostBackend {
    fn allocate(&self) -> Result<u16> {
        self.ports.allocate()
    }
}

impl LocalIdentity for HostBackend {
    fn current_user(&self) -> Result<String> {
        self.identity.current_user()
    }
}
