use crate::file::VirtualFile;
use hoard_storage::ScratchDir;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

/// Owns the scratch directories created by one staging call.
///
/// Dropping it forgets the staged path of every file it staged and deletes
/// the directories, so nothing it produced outlives it.
#[derive(Debug, Default)]
pub struct StagingHandle {
    dirs: Vec<ScratchDir>,
    staged: Vec<Arc<VirtualFile>>,
}

impl StagingHandle {
    pub(super) fn push_dir(&mut self, dir: ScratchDir) {
        self.dirs.push(dir);
    }

    pub(super) fn push_file(&mut self, file: Arc<VirtualFile>) {
        self.staged.push(file);
    }

    /// Number of scratch directories held.
    pub fn dirs(&self) -> usize {
        self.dirs.len()
    }

    /// Number of files this handle staged.
    pub fn files(&self) -> usize {
        self.staged.len()
    }

    pub fn dir_paths(&self) -> impl Iterator<Item = &Path> {
        self.dirs.iter().map(ScratchDir::path)
    }
}

impl Drop for StagingHandle {
    fn drop(&mut self) {
        for file in self.staged.drain(..) {
            file.forget_staged();
        }
        // Each ScratchDir deletes itself, logging on failure.
        self.dirs.clear();
    }
}

/// A batch of files together with the staging that made them readable.
///
/// Dropping it unstages every member, then releases the staging handle.
#[derive(Debug)]
pub struct StagedFiles {
    files: Vec<Arc<VirtualFile>>,
    handle: StagingHandle,
}

impl StagedFiles {
    pub(super) fn new(files: Vec<Arc<VirtualFile>>, handle: StagingHandle) -> Self {
        Self { files, handle }
    }

    pub fn handle(&self) -> &StagingHandle {
        &self.handle
    }
}

impl Deref for StagedFiles {
    type Target = [Arc<VirtualFile>];

    fn deref(&self) -> &Self::Target {
        &self.files
    }
}

impl Drop for StagedFiles {
    fn drop(&mut self) {
        for file in &self.files {
            if let Err(err) = file.unstage() {
                tracing::warn!(key = file.key(), error = ?err, "failed to unstage file");
            }
        }
    }
}
