//! Shared mock infrastructure for unit tests.
//!
//! [`RecordingBackend`] implements every session port and writes one entry
//! per call to a shared log, so tests can assert on both what happened and in
//! which order.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use transient_cli::application::ports::{
    FolderMounter, FrontendImage, ImageFilter, ImageStore, InteractiveConnection, LocalIdentity,
    PipedConnection, PortAllocator, ProgressReporter, RemoteShell, VmHandle, VmLauncher,
};
use transient_cli::domain::ConsolePolicy;
use transient_common::{SshConfig, VmImage};

pub type CallLog = Arc<Mutex<Vec<String>>>;

fn record(log: &CallLog, entry: impl Into<String>) {
    log.lock().unwrap().push(entry.into());
}

// ── Mock: session backend ─────────────────────────────────────────────────────

pub struct RecordingBackend {
    pub log: CallLog,
    /// Image name whose provisioning fails.
    pub fail_image: Option<String>,
    pub fail_start: bool,
    pub fail_mount: bool,
    pub fail_connect: bool,
    pub fail_shutdown: bool,
    pub allocated_port: u16,
    pub vm_code: i32,
    pub ssh_code: i32,
    /// Arguments and console policy of the last `start` call.
    pub started: Mutex<Option<(Vec<String>, ConsolePolicy)>>,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self {
            log: Arc::new(Mutex::new(Vec::new())),
            fail_image: None,
            fail_start: false,
            fail_mount: false,
            fail_connect: false,
            fail_shutdown: false,
            allocated_port: 40123,
            vm_code: 0,
            ssh_code: 0,
            started: Mutex::new(None),
        }
    }
}

impl RecordingBackend {
    pub fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// Position of the first call starting with `prefix`.
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.calls().iter().position(|c| c.starts_with(prefix))
    }

    pub fn called(&self, prefix: &str) -> bool {
        self.position(prefix).is_some()
    }

    pub fn started_args(&self) -> Vec<String> {
        self.started
            .lock()
            .unwrap()
            .as_ref()
            .map(|(args, _)| args.clone())
            .expect("vm was not started")
    }

    pub fn started_policy(&self) -> ConsolePolicy {
        self.started
            .lock()
            .unwrap()
            .as_ref()
            .map(|(_, policy)| *policy)
            .expect("vm was not started")
    }
}

impl ImageStore for RecordingBackend {
    async fn create_vm_image(&self, image: &str, session: &str, index: usize) -> Result<VmImage> {
        record(&self.log, format!("create:{image}:{index}"));
        if self.fail_image.as_deref() == Some(image) {
            anyhow::bail!("image '{image}' not found");
        }
        Ok(VmImage {
            name: image.to_string(),
            index,
            path: PathBuf::from(format!("/front/{session}/{index}-{image}.qcow2")),
        })
    }

    async fn list_vm_images(&self, _: &ImageFilter<'_>) -> Result<Vec<FrontendImage>> {
        anyhow::bail!("list not expected in this test")
    }

    async fn delete_vm_image(&self, _: &FrontendImage) -> Result<()> {
        anyhow::bail!("delete not expected in this test")
    }
}

impl VmLauncher for RecordingBackend {
    type Handle = MockVm;

    async fn start(&self, args: &[String], policy: ConsolePolicy) -> Result<MockVm> {
        record(&self.log, "start");
        if self.fail_start {
            anyhow::bail!("qemu-system-x86_64: not found");
        }
        *self.started.lock().unwrap() = Some((args.to_vec(), policy));
        Ok(MockVm {
            log: Arc::clone(&self.log),
            code: self.vm_code,
            policy,
        })
    }
}

impl RemoteShell for RecordingBackend {
    type Interactive = MockShell;
    type Piped = MockPiped;

    async fn connect_interactive(
        &self,
        config: &SshConfig,
        command: Option<&str>,
        _: Duration,
    ) -> Result<MockShell> {
        record(
            &self.log,
            format!("connect:{}:{}", config.port, command.unwrap_or("<shell>")),
        );
        if self.fail_connect {
            anyhow::bail!("guest not reachable");
        }
        Ok(MockShell {
            log: Arc::clone(&self.log),
            code: self.ssh_code,
        })
    }

    async fn connect_piped(&self, _: &SshConfig, _: Option<&str>, _: Duration) -> Result<MockPiped> {
        record(&self.log, "connect_piped");
        if self.fail_shutdown {
            anyhow::bail!("guest not reachable");
        }
        Ok(MockPiped {
            log: Arc::clone(&self.log),
        })
    }
}

impl FolderMounter for RecordingBackend {
    async fn mount(
        &self,
        _: &SshConfig,
        local_dir: &Path,
        remote_dir: &str,
        local_user: &str,
        _: Duration,
    ) -> Result<()> {
        record(
            &self.log,
            format!("mount:{}:{remote_dir}:{local_user}", local_dir.display()),
        );
        if self.fail_mount {
            anyhow::bail!("sshfs exited before the mount appeared");
        }
        Ok(())
    }
}

impl PortAllocator for RecordingBackend {
    fn allocate(&self) -> Result<u16> {
        record(&self.log, "allocate");
        Ok(self.allocated_port)
    }
}

impl LocalIdentity for RecordingBackend {
    fn current_user(&self) -> Result<String> {
        Ok("alice".to_string())
    }
}

// ── Mock: handles ─────────────────────────────────────────────────────────────

pub struct MockVm {
    log: CallLog,
    code: i32,
    policy: ConsolePolicy,
}

impl VmHandle for MockVm {
    fn silence(&self) -> Result<()> {
        record(&self.log, "silence");
        if self.policy == ConsolePolicy::Inherit {
            anyhow::bail!("cannot silence an inherited console");
        }
        Ok(())
    }

    async fn wait(&mut self, timeout: Option<Duration>) -> Result<i32> {
        match timeout {
            Some(t) => record(&self.log, format!("vm.wait:{}", t.as_secs())),
            None => record(&self.log, "vm.wait:none"),
        }
        Ok(self.code)
    }

    async fn terminate(&mut self) -> Result<()> {
        record(&self.log, "terminate");
        Ok(())
    }
}

pub struct MockShell {
    log: CallLog,
    code: i32,
}

impl InteractiveConnection for MockShell {
    async fn wait(&mut self) -> Result<i32> {
        record(&self.log, "ssh.wait");
        Ok(self.code)
    }
}

pub struct MockPiped {
    log: CallLog,
}

impl PipedConnection for MockPiped {
    async fn communicate(&mut self, input: &[u8], _: Duration) -> Result<(Vec<u8>, Vec<u8>)> {
        record(
            &self.log,
            format!("communicate:{}", String::from_utf8_lossy(input)),
        );
        Ok((Vec::new(), Vec::new()))
    }

    fn poll(&mut self) -> Result<Option<i32>> {
        Ok(Some(0))
    }
}

// ── Mock: progress reporter ──────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingReporter {
    pub steps: Mutex<Vec<String>>,
    pub successes: Mutex<Vec<String>>,
    pub warnings: Mutex<Vec<String>>,
}

impl ProgressReporter for RecordingReporter {
    fn step(&self, message: &str) {
        self.steps.lock().unwrap().push(message.to_string());
    }
    fn success(&self, message: &str) {
        self.successes.lock().unwrap().push(message.to_string());
    }
    fn warn(&self, message: &str) {
        self.warnings.lock().unwrap().push(message.to_string());
    }
}
