//! `transient list` — show session-local images.

use anyhow::Result;
use clap::Args;

use crate::application::ports::ImageFilter;
use crate::application::services::config_resolver::resolve_list_config;
use crate::application::services::images::find_images;
use crate::commands::ImageArgs;
use crate::domain::config::{CliOptions, ListConfig};
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::image::QcowImageStore;
use crate::output::{OutputContext, images, json};

/// Arguments for the list command.
#[derive(Args, Debug, Default)]
pub struct ListArgs {
    #[command(flatten)]
    pub images: ImageArgs,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

/// Run `transient list`.
///
/// # Errors
///
/// Returns an error if the options are invalid or the store cannot be read.
pub async fn run(args: &ListArgs, ctx: &OutputContext) -> Result<i32> {
    let resolved = resolve_list_config(&args.images.apply(CliOptions::new()))?;
    let config = ListConfig::from_config(&resolved);
    let store = QcowImageStore::new(&config.store, TokioCommandRunner::default())?;

    let filter = ImageFilter {
        session: config.name.as_deref(),
        images: &config.image,
    };
    let found = match find_images(&store, &filter).await {
        Ok(found) => found,
        Err(e) if args.json => {
            println!("{}", json::format_error(&format!("{e:#}"))?);
            return Ok(1);
        }
        Err(e) => return Err(e),
    };

    if args.json {
        println!("{}", json::format_images(&found)?);
    } else {
        images::render_images(ctx, &found);
    }
    Ok(0)
}
