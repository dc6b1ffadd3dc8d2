//! Download directory lifecycle.

use eyre::{Context, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Where workbook downloads land.
///
/// A user-supplied directory is created when missing and always kept. A
/// managed directory is a fresh temporary directory removed on drop, and
/// files inside it are removed eagerly once a migration is done with them.
pub struct DownloadDir {
    inner: Inner,
}

enum Inner {
    Managed(TempDir),
    User(PathBuf),
}

impl DownloadDir {
    /// Use `user_dir` when given, otherwise create a managed temp directory.
    pub fn new(user_dir: Option<PathBuf>) -> Result<Self> {
        match user_dir {
            Some(dir) => Self::user(dir),
            None => Self::managed(),
        }
    }

    /// Wrap a user-supplied directory, creating it when missing.
    pub fn user(dir: PathBuf) -> Result<Self> {
        if dir.exists() {
            log::info!("Using existing download directory: {}", dir.display());
        } else {
            std::fs::create_dir_all(&dir).with_context(|| {
                format!("Failed to create download directory: {}", dir.display())
            })?;
            log::info!("Created download directory: {}", dir.display());
        }
        Ok(Self {
            inner: Inner::User(dir),
        })
    }

    /// Create a managed temporary directory, removed when dropped.
    pub fn managed() -> Result<Self> {
        let dir = TempDir::new().with_context(|| "Failed to create temporary directory")?;
        log::info!("Created temporary directory: {}", dir.path().display());
        Ok(Self {
            inner: Inner::Managed(dir),
        })
    }

    pub fn path(&self) -> &Path {
        match &self.inner {
            Inner::Managed(dir) => dir.path(),
            Inner::User(dir) => dir.as_path(),
        }
    }

    pub fn is_managed(&self) -> bool {
        matches!(self.inner, Inner::Managed(_))
    }

    /// Remove a downloaded file when this directory is managed.
    ///
    /// Files in a user-supplied directory are kept. Removal failure is
    /// log-and-continue.
    pub fn remove_file_if_managed(&self, file: &Path) {
        if !self.is_managed() || !file.exists() {
            return;
        }
        match std::fs::remove_file(file) {
            Ok(()) => log::info!("Removed temporary file: {}", file.display()),
            Err(error) => log::warn!(
                "Failed to remove temporary file {}: {}",
                file.display(),
                error
            ),
        }
    }
}

impl Drop for DownloadDir {
    fn drop(&mut self) {
        if let Inner::User(dir) = &self.inner {
            log::info!("Keeping download directory: {}", dir.display());
        }
    }
}
