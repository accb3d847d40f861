//! Human-readable rendering of frontend image listings.

use crate::application::ports::FrontendImage;
use crate::output::OutputContext;

/// Render `bytes` with a binary unit, e.g. `1.5 GiB`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

/// One table row: session, index, image, size, modified.
#[must_use]
pub fn format_image_row(image: &FrontendImage) -> String {
    let modified = image
        .modified
        .map_or_else(|| "-".to_string(), |m| m.format("%Y-%m-%d %H:%M").to_string());
    format!(
        "{:<24} {:>3}  {:<32} {:>10}  {modified}",
        image.session,
        image.index,
        image.image,
        format_size(image.size_bytes)
    )
}

/// Print the image table, or a hint when there is nothing to show.
pub fn render_images(ctx: &OutputContext, images: &[FrontendImage]) {
    if images.is_empty() {
        ctx.info("No frontend images found.");
        return;
    }
    let header = format!(
        "{:<24} {:>3}  {:<32} {:>10}  {}",
        "SESSION", "IDX", "IMAGE", "SIZE", "MODIFIED"
    );
    ctx.table_header(&header);
    for image in images {
        println!("{}", format_image_row(image));
    }
}
