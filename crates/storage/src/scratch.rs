//! Scratch space for extracted and staged archive content.
//!
//! The scratch root is wiped when it is opened: anything left in it belongs
//! to a previous process and is garbage by definition.

use crate::error::{ErrorKind, Result};
use crate::remove::delete_directory_recursive;
use std::path::{Path, PathBuf};
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug)]
pub struct ScratchRoot {
    root: PathBuf,
}
impl ScratchRoot {
    /// Remove everything under `root` and recreate it empty.
    #[instrument(skip_all, fields(root = %root.as_ref().display()))]
    pub fn create(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        delete_directory_recursive(&root)?;
        std::fs::create_dir_all(&root).map_err(|e| ErrorKind::io(e, &root))?;
        tracing::debug!("scratch root ready");
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// A fresh, unused path directly under the scratch root. Nothing is created.
    ///
    /// The extension (without its leading dot) is preserved so that anything
    /// sniffing file types by name still recognises the file.
    #[must_use]
    pub fn unique_path(&self, extension: Option<&str>) -> PathBuf {
        let mut name = Uuid::new_v4().to_string();
        if let Some(extension) = extension.filter(|e| !e.is_empty()) {
            name.push('.');
            name.push_str(extension);
        }
        self.root.join(name)
    }

    /// Create a new, empty, exclusively-owned directory under the scratch root.
    pub fn dir(&self) -> Result<ScratchDir> {
        let path = self.unique_path(None);
        std::fs::create_dir(&path).map_err(|e| ErrorKind::io(e, &path))?;
        Ok(ScratchDir { path })
    }
}

/// A scratch directory that is deleted (with everything in it) when dropped.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
}
impl ScratchDir {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the directory now, reporting failure instead of just logging it.
    pub fn close(self) -> Result<()> {
        delete_directory_recursive(&self.path)
    }
}
impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(err) = delete_directory_recursive(&self.path) {
            tracing::warn!(path = %self.path.display(), error = ?err, "failed to remove scratch directory");
        }
    }
}
