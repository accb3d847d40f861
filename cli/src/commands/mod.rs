//! Command implementations

pub mod delete;
pub mod list;
pub mod run;

use clap::Args;

use crate::domain::config::CliOptions;

/// Image and session selection shared by every subcommand.
#[derive(Args, Debug, Default, Clone)]
pub struct ImageArgs {
    /// Disk image to use, in attachment order (repeatable)
    #[arg(short, long = "image", value_name = "IMAGE")]
    pub image: Vec<String>,

    /// Directory holding base images
    #[arg(long, value_name = "DIR")]
    pub image_backend: Option<String>,

    /// Directory holding session-local images
    #[arg(long, value_name = "DIR")]
    pub image_frontend: Option<String>,

    /// Session name; reusing a name reuses its disks
    #[arg(short, long)]
    pub name: Option<String>,
}

impl ImageArgs {
    /// Add these options to `options`.
    #[must_use]
    pub fn apply(&self, options: CliOptions) -> CliOptions {
        options
            .with_list("image", self.image.clone())
            .with_str("image_backend", self.image_backend.clone())
            .with_str("image_frontend", self.image_frontend.clone())
            .with_str("name", self.name.clone())
    }
}
