// src/workspace.rs

//! Single-use workspace directories for conversion runs
//!
//! Each run owns exactly one uniquely named directory under the system
//! temporary root. Teardown happens exactly once, on every exit path:
//! explicitly through [`Workspace::release`], or through `Drop` for error
//! and cancellation paths. A cleanup failure is logged and never masks the
//! run's primary outcome.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// A uniquely named, exclusively owned extraction directory
pub struct Workspace {
    dir: Option<TempDir>,
    root: PathBuf,
}

impl Workspace {
    /// Create a workspace under the system temporary root
    pub fn acquire() -> Result<Self> {
        Self::acquire_in(&std::env::temp_dir())
    }

    /// Create a workspace under a specific temporary root
    pub fn acquire_in(temp_root: &Path) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("debark-")
            .tempdir_in(temp_root)
            .map_err(|e| {
                Error::WorkspaceUnavailable(format!(
                    "cannot create workspace under {}: {}",
                    temp_root.display(),
                    e
                ))
            })?;
        let root = dir.path().to_path_buf();
        debug!("acquired workspace {}", root.display());
        Ok(Self {
            dir: Some(dir),
            root,
        })
    }

    /// Root directory of this workspace
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Create (if needed) and return a subdirectory of the workspace
    pub fn subdir(&self, name: &str) -> Result<PathBuf> {
        let dir = self.root.join(name);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Tear the workspace down now
    ///
    /// Dropping the workspace has the same effect; this form just makes
    /// the teardown point explicit at the end of a successful run.
    pub fn release(mut self) {
        self.cleanup();
    }

    fn cleanup(&mut self) {
        if let Some(dir) = self.dir.take() {
            debug!("releasing workspace {}", self.root.display());
            if let Err(e) = dir.close() {
                warn!("failed to remove workspace {}: {}", self.root.display(), e);
            }
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_creates_unique_directories() {
        let first = Workspace::acquire().unwrap();
        let second = Workspace::acquire().unwrap();
        assert!(first.path().exists());
        assert!(second.path().exists());
        assert_ne!(first.path(), second.path());
        assert!(
            first
                .path()
                .file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("debark-")
        );
    }

    #[test]
    fn release_removes_the_tree() {
        let workspace = Workspace::acquire().unwrap();
        let root = workspace.path().to_path_buf();
        std::fs::write(root.join("payload.bin"), b"data").unwrap();
        workspace.release();
        assert!(!root.exists());
    }

    #[test]
    fn drop_removes_the_tree_on_error_paths() {
        let root;
        {
            let workspace = Workspace::acquire().unwrap();
            root = workspace.path().to_path_buf();
            workspace.subdir("pkgroot/usr/bin").unwrap();
        }
        assert!(!root.exists());
    }

    #[test]
    fn unwritable_root_is_unavailable() {
        let missing = PathBuf::from("/nonexistent/debark-temp-root");
        assert!(matches!(
            Workspace::acquire_in(&missing),
            Err(Error::WorkspaceUnavailable(_))
        ));
    }
}
