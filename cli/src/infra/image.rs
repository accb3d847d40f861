//! Image infrastructure — qcow2 overlay store driven by `qemu-img`.
//!
//! Layout:
//!
//! ```text
//! <backend>/<image>                      base images, `/` in names mapped to `__`
//! <frontend>/<session>/<index>-<image>.qcow2
//! ```
//!
//! Each frontend image is a copy-on-write overlay backed by its base image,
//! so sessions never modify the backend.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use transient_common::VmImage;

use crate::application::ports::{CommandRunner, FrontendImage, ImageFilter, ImageStore};
use crate::domain::config::StorePaths;
use crate::infra::command_runner::stderr_text;

/// Image tool binary.
pub const QEMU_IMG: &str = "qemu-img";
const FRONTEND_EXTENSION: &str = ".qcow2";

/// Escape an image or session name for use as a single path component.
#[must_use]
pub fn encode_name(name: &str) -> String {
    name.replace('/', "__")
}

#[must_use]
pub fn decode_name(encoded: &str) -> String {
    encoded.replace("__", "/")
}

/// File name of the overlay for `image` at position `index`.
#[must_use]
pub fn frontend_file_name(index: usize, image: &str) -> String {
    format!("{index}-{}{FRONTEND_EXTENSION}", encode_name(image))
}

/// Inverse of [`frontend_file_name`]; `None` for foreign files.
#[must_use]
pub fn parse_frontend_file_name(file_name: &str) -> Option<(usize, String)> {
    let stem = file_name.strip_suffix(FRONTEND_EXTENSION)?;
    let (index, image) = stem.split_once('-')?;
    if image.is_empty() {
        return None;
    }
    Some((index.parse().ok()?, decode_name(image)))
}

/// Default store root: `<data_dir>/transient`.
///
/// # Errors
///
/// Returns an error if the platform data directory cannot be determined.
pub fn default_store_root() -> Result<PathBuf> {
    let data = dirs::data_dir().context("cannot determine data directory")?;
    Ok(data.join("transient"))
}

/// Production `ImageStore` backed by two directories and `qemu-img`.
pub struct QcowImageStore<R: CommandRunner> {
    backend: PathBuf,
    frontend: PathBuf,
    runner: R,
}

impl<R: CommandRunner> QcowImageStore<R> {
    /// Store rooted at the configured directories, or the defaults for any
    /// left unset.
    ///
    /// # Errors
    ///
    /// Returns an error if a default is needed and the data directory is
    /// unknown.
    pub fn new(paths: &StorePaths, runner: R) -> Result<Self> {
        let (backend, frontend) = match (&paths.backend, &paths.frontend) {
            (Some(b), Some(f)) => (b.clone(), f.clone()),
            (b, f) => {
                let root = default_store_root()?;
                (
                    b.clone().unwrap_or_else(|| root.join("backend")),
                    f.clone().unwrap_or_else(|| root.join("frontend")),
                )
            }
        };
        Ok(Self::with_dirs(backend, frontend, runner))
    }

    pub fn with_dirs(backend: PathBuf, frontend: PathBuf, runner: R) -> Self {
        Self {
            backend,
            frontend,
            runner,
        }
    }

    #[must_use]
    pub fn backend_dir(&self) -> &Path {
        &self.backend
    }

    #[must_use]
    pub fn frontend_dir(&self) -> &Path {
        &self.frontend
    }

    async fn backend_image(&self, image: &str) -> Result<PathBuf> {
        let plain = self.backend.join(encode_name(image));
        let with_ext = self
            .backend
            .join(format!("{}{FRONTEND_EXTENSION}", encode_name(image)));
        for candidate in [plain, with_ext] {
            if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
                return Ok(candidate);
            }
        }
        anyhow::bail!(
            "image '{image}' not found in {}; place the base image there first",
            self.backend.display()
        )
    }
}

impl<R: CommandRunner> ImageStore for QcowImageStore<R> {
    async fn create_vm_image(&self, image: &str, session: &str, index: usize) -> Result<VmImage> {
        let backing = self.backend_image(image).await?;
        let dir = self.frontend.join(encode_name(session));
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("cannot create {}", dir.display()))?;
        let path = dir.join(frontend_file_name(index, image));

        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::info!(path = %path.display(), "reusing existing frontend image");
        } else {
            let backing_arg = backing.to_string_lossy();
            let path_arg = path.to_string_lossy();
            let output = self
                .runner
                .run(
                    QEMU_IMG,
                    &["create", "-f", "qcow2", "-F", "qcow2", "-b", &backing_arg, &path_arg],
                )
                .await?;
            if !output.status.success() {
                anyhow::bail!("qemu-img create failed: {}", stderr_text(&output));
            }
            tracing::info!(path = %path.display(), backing = %backing.display(), "created frontend image");
        }

        Ok(VmImage {
            name: image.to_string(),
            index,
            path,
        })
    }

    async fn list_vm_images(&self, filter: &ImageFilter<'_>) -> Result<Vec<FrontendImage>> {
        let mut found = Vec::new();
        let mut sessions = match tokio::fs::read_dir(&self.frontend).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(found),
            Err(e) => {
                return Err(e).with_context(|| format!("cannot read {}", self.frontend.display()));
            }
        };

        while let Some(entry) = sessions.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let session = decode_name(&entry.file_name().to_string_lossy());
            let mut files = tokio::fs::read_dir(entry.path())
                .await
                .with_context(|| format!("cannot read {}", entry.path().display()))?;
            while let Some(file) = files.next_entry().await? {
                let Some((index, image)) =
                    parse_frontend_file_name(&file.file_name().to_string_lossy())
                else {
                    continue;
                };
                let meta = file.metadata().await?;
                let candidate = FrontendImage {
                    session: session.clone(),
                    index,
                    image,
                    path: file.path(),
                    size_bytes: meta.len(),
                    modified: meta.modified().ok().map(DateTime::<Utc>::from),
                };
                if filter.matches(&candidate) {
                    found.push(candidate);
                }
            }
        }
        Ok(found)
    }

    async fn delete_vm_image(&self, image: &FrontendImage) -> Result<()> {
        tokio::fs::remove_file(&image.path)
            .await
            .with_context(|| format!("cannot remove {}", image.path.display()))?;
        if let Some(dir) = image.path.parent()
            && tokio::fs::remove_dir(dir).await.is_ok()
        {
            tracing::debug!(dir = %dir.display(), "removed empty session directory");
        }
        Ok(())
    }
}
