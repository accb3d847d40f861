//! CLI argument parsing with clap derive

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use crate::commands;
use crate::output::OutputContext;

/// Run throwaway QEMU virtual machines with SSH consoles and shared folders
#[derive(Parser)]
#[command(
    name = "transient",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(
        long,
        global = true,
        env = "NO_COLOR",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Provision images and run a virtual machine
    Run(commands::run::RunArgs),

    /// List session-local images
    List(commands::list::ListArgs),

    /// Delete session-local images
    Delete(commands::delete::DeleteArgs),
}

impl Cli {
    /// Default log filter when `RUST_LOG` is not set.
    #[must_use]
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    /// Execute the CLI command and return the process exit code.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn run(self) -> Result<i32> {
        let ctx = OutputContext::new(self.no_color, self.quiet);
        match self.command {
            Command::Run(args) => commands::run::run(&args, &ctx).await,
            Command::List(args) => commands::list::run(&args, &ctx).await,
            Command::Delete(args) => commands::delete::run(&args, &ctx).await,
        }
    }
}
