//! `transient run` — provision images and run a VM session.

use anyhow::Result;
use clap::Args;

use crate::application::services::config_resolver::resolve_run_config;
use crate::application::services::session::run_session;
use crate::commands::ImageArgs;
use crate::domain::config::{CliOptions, RunConfig, Switch};
use crate::infra::backend::HostBackend;
use crate::infra::config::FsConfigReader;
use crate::output::OutputContext;
use crate::output::reporter::TerminalReporter;

/// Arguments for the run command.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    #[command(flatten)]
    pub images: ImageArgs,

    /// TOML configuration file; command-line options take precedence
    #[arg(short, long, env = "TRANSIENT_CONFIG", value_name = "FILE")]
    pub config: Option<String>,

    /// Copy a host path into the image before starting (LOCAL:REMOTE)
    #[arg(long, value_name = "LOCAL:REMOTE")]
    pub copy_in_before: Vec<String>,

    /// Copy a guest path out of the image after stopping (REMOTE:LOCAL)
    #[arg(long, value_name = "REMOTE:LOCAL")]
    pub copy_out_after: Vec<String>,

    /// Timeout for each copy, in seconds
    #[arg(long, value_name = "SECONDS")]
    pub copy_timeout: Option<i64>,

    /// Only provision the images; do not start the VM
    #[arg(long)]
    pub prepare_only: bool,

    /// Timeout for QEMU monitor operations, in seconds
    #[arg(long, value_name = "SECONDS")]
    pub qmp_timeout: Option<i64>,

    /// Grace period for the VM to exit after the guest is shut down, in seconds
    #[arg(long, value_name = "SECONDS")]
    pub shutdown_timeout: Option<i64>,

    /// Run this command over SSH instead of an interactive shell
    #[arg(long, value_name = "COMMAND")]
    pub ssh_command: Option<String>,

    /// SSH client binary
    #[arg(long, value_name = "BIN")]
    pub ssh_bin_name: Option<String>,

    /// Host port forwarded to the guest's SSH port (default: any free port)
    #[arg(long, value_name = "PORT")]
    pub ssh_port: Option<i64>,

    /// How long to wait for the guest's SSH server, in seconds
    #[arg(long, value_name = "SECONDS")]
    pub ssh_timeout: Option<i64>,

    /// Guest user to log in as
    #[arg(long, value_name = "USER")]
    pub ssh_user: Option<String>,

    /// Use an SSH session as the console
    #[arg(long)]
    pub ssh_console: bool,

    /// Show the serial console until the SSH session is up
    #[arg(long)]
    pub ssh_with_serial: bool,

    /// Mount a host directory in the guest (LOCAL:REMOTE, repeatable)
    #[arg(long, value_name = "LOCAL:REMOTE")]
    pub shared_folder: Vec<String>,

    /// Extra arguments passed to QEMU verbatim (after `--`)
    #[arg(last = true, value_name = "QEMU_ARGS")]
    pub qemu_args: Vec<String>,
}

impl RunArgs {
    /// Every run option as supplied, unset ones included.
    #[must_use]
    pub fn to_cli_options(&self) -> CliOptions {
        self.images
            .apply(CliOptions::new())
            .with_str("config", self.config.clone())
            .with_list("copy_in_before", self.copy_in_before.clone())
            .with_list("copy_out_after", self.copy_out_after.clone())
            .with_int("copy_timeout", self.copy_timeout)
            .with_switch("prepare_only", Switch::from_flag(self.prepare_only))
            .with_list("qemu_args", self.qemu_args.clone())
            .with_int("qmp_timeout", self.qmp_timeout)
            .with_int("shutdown_timeout", self.shutdown_timeout)
            .with_str("ssh_command", self.ssh_command.clone())
            .with_str("ssh_bin_name", self.ssh_bin_name.clone())
            .with_int("ssh_port", self.ssh_port)
            .with_int("ssh_timeout", self.ssh_timeout)
            .with_str("ssh_user", self.ssh_user.clone())
            .with_switch("ssh_console", Switch::from_flag(self.ssh_console))
            .with_switch("ssh_with_serial", Switch::from_flag(self.ssh_with_serial))
            .with_list("shared_folder", self.shared_folder.clone())
    }
}

/// Run `transient run`. Returns the session's exit code.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the session fails.
pub async fn run(args: &RunArgs, ctx: &OutputContext) -> Result<i32> {
    let resolved = resolve_run_config(&args.to_cli_options(), &FsConfigReader)?;
    let config = RunConfig::from_config(&resolved);

    if !config.copy_in_before.is_empty() || !config.copy_out_after.is_empty() {
        tracing::warn!(
            copy_in = config.copy_in_before.len(),
            copy_out = config.copy_out_after.len(),
            "copy specs are validated but file staging is left to the image tooling"
        );
    }
    if config.image.is_empty() {
        ctx.warn("no images given; the VM starts without disks");
    }

    let backend = HostBackend::new(&config.store)?;
    let reporter = TerminalReporter::new(ctx);
    run_session(&config, &backend, &reporter).await
}
