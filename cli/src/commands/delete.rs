//! `transient delete` — remove session-local images.

use std::io::IsTerminal;

use anyhow::{Context, Result};
use clap::Args;

use crate::application::ports::ImageFilter;
use crate::application::services::config_resolver::resolve_delete_config;
use crate::application::services::images::{delete_images, find_images};
use crate::commands::ImageArgs;
use crate::domain::config::{CliOptions, DeleteConfig, Switch};
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::image::QcowImageStore;
use crate::output::OutputContext;
use crate::output::images::format_image_row;
use crate::output::reporter::TerminalReporter;

/// Arguments for the delete command.
#[derive(Args, Debug, Default)]
pub struct DeleteArgs {
    #[command(flatten)]
    pub images: ImageArgs,

    /// Delete without asking for confirmation
    #[arg(short, long)]
    pub force: bool,
}

/// Run `transient delete`.
///
/// # Errors
///
/// Returns an error if the options are invalid or an image cannot be removed.
pub async fn run(args: &DeleteArgs, ctx: &OutputContext) -> Result<i32> {
    let options = args
        .images
        .apply(CliOptions::new())
        .with_switch("force", Switch::from_flag(args.force));
    let config = DeleteConfig::from_config(&resolve_delete_config(&options)?);
    let store = QcowImageStore::new(&config.store, TokioCommandRunner::default())?;

    let filter = ImageFilter {
        session: config.name.as_deref(),
        images: &config.image,
    };
    let found = find_images(&store, &filter).await?;
    if found.is_empty() {
        ctx.info("No matching frontend images.");
        return Ok(0);
    }

    if !config.force && needs_confirmation() {
        println!();
        println!("This will permanently remove:");
        for image in &found {
            println!("  {}", format_image_row(image));
        }
        println!();
        let confirmed = dialoguer::Confirm::new()
            .with_prompt("Continue?")
            .default(false)
            .interact()
            .context("reading confirmation")?;
        if !confirmed {
            println!("Cancelled.");
            return Ok(0);
        }
    }

    let reporter = TerminalReporter::new(ctx);
    let deleted = delete_images(&store, &found, &reporter).await?;
    ctx.success(&format!("removed {deleted} image(s)"));
    Ok(0)
}

/// Prompt only when a person can answer.
fn needs_confirmation() -> bool {
    std::io::stdin().is_terminal() && std::env::var_os("CI").is_none()
}
