//! Application service — frontend image listing and deletion.

use anyhow::{Context, Result};

use crate::application::ports::{FrontendImage, ImageFilter, ImageStore, ProgressReporter};

/// Frontend images matching `filter`, ordered by session then index.
///
/// # Errors
///
/// Returns an error if the store cannot be read.
pub async fn find_images(
    store: &impl ImageStore,
    filter: &ImageFilter<'_>,
) -> Result<Vec<FrontendImage>> {
    let mut images = store.list_vm_images(filter).await?;
    images.sort_by(|a, b| a.session.cmp(&b.session).then(a.index.cmp(&b.index)));
    Ok(images)
}

/// Delete each image in order, stopping at the first failure.
///
/// # Errors
///
/// Returns the failing image's error; images before it stay deleted.
pub async fn delete_images(
    store: &impl ImageStore,
    images: &[FrontendImage],
    reporter: &impl ProgressReporter,
) -> Result<usize> {
    for image in images {
        store
            .delete_vm_image(image)
            .await
            .with_context(|| format!("failed to delete {}", image.path.display()))?;
        tracing::info!(path = %image.path.display(), "deleted frontend image");
        reporter.step(&format!("deleted {}", image.path.display()));
    }
    Ok(images.len())
}
