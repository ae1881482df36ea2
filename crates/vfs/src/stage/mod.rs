//! Staging: materializing nested files as real files, only for as long as
//! someone needs them.
//!
//! A nested file's bytes only exist inside its archive. To read them, every
//! archive on the way down has to be extracted, outermost first. [`Stager`]
//! works out the smallest set of extractions for a batch of files, does them
//! into scratch directories, and hands back a guard that deletes those
//! directories when dropped.

mod handle;

pub use self::handle::{StagedFiles, StagingHandle};
use crate::error::{ErrorKind, Result};
use crate::file::VirtualFile;
use crate::index::IndexStore;
use exn::{OptionExt, ResultExt};
use hoard_extract::Extractor;
use hoard_storage::ScratchRoot;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::instrument;

pub struct Stager<'a> {
    store: &'a IndexStore,
    extractor: &'a (dyn Extractor + Send + Sync),
    scratch: &'a ScratchRoot,
}

impl<'a> Stager<'a> {
    pub fn new(store: &'a IndexStore, extractor: &'a (dyn Extractor + Send + Sync), scratch: &'a ScratchRoot) -> Self {
        Self { store, extractor, scratch }
    }

    /// Make the bytes of every file in `targets` available on disk.
    ///
    /// Each archive that has to be opened is extracted once, shallowest
    /// first, into its own scratch directory. Files that are already staged
    /// are left where they are and are not owned by the returned handle. If
    /// any extraction fails, everything staged so far is released before the
    /// error is returned.
    #[instrument(skip_all, fields(targets = targets.len()))]
    pub fn stage(&self, targets: &[Arc<VirtualFile>]) -> Result<StagingHandle> {
        let mut needed: BTreeMap<String, Arc<VirtualFile>> = BTreeMap::new();
        for target in targets {
            for file in self.store.files_in_path(target)? {
                if !file.is_concrete() {
                    needed.entry(file.key().to_string()).or_insert(file);
                }
            }
        }

        // Keyed by (container depth, container key) so outer archives come first.
        let mut groups: BTreeMap<(usize, String), Vec<Arc<VirtualFile>>> = BTreeMap::new();
        for file in needed.into_values() {
            if let Some(parent) = file.parent_key() {
                groups.entry((file.depth() - 1, parent.to_string())).or_default().push(file);
            }
        }

        let mut handle = StagingHandle::default();
        for ((_, container_key), members) in groups {
            let pending: Vec<Arc<VirtualFile>> = members.into_iter().filter(|file| !file.is_staged()).collect();
            if pending.is_empty() {
                continue;
            }
            let container = self
                .store
                .lookup(&container_key)
                .ok_or_raise(|| ErrorKind::BrokenChain(container_key.clone()))?;
            let source = container.staged_path().ok_or_raise(|| ErrorKind::Unstaged(container_key.clone()))?;

            let dir = self.scratch.dir().or_raise(|| ErrorKind::Storage)?;
            let destination = dir.path().to_path_buf();
            handle.push_dir(dir);
            self.extractor
                .extract_all(&source, &destination)
                .or_raise(|| ErrorKind::Extraction(container_key.clone()))?;

            for file in pending {
                let extracted = destination.join(file.name());
                if !extracted.is_file() {
                    exn::bail!(ErrorKind::NotFound(file.key().to_string()));
                }
                file.set_staged_path(extracted)?;
                handle.push_file(file);
            }
        }
        tracing::debug!(dirs = handle.dirs(), files = handle.files(), "staged");
        Ok(handle)
    }

    /// Stage `targets` and keep them together with the staging guard.
    ///
    /// Dropping the result unstages every target and then releases the
    /// scratch directories.
    pub fn stage_with(&self, targets: Vec<Arc<VirtualFile>>) -> Result<StagedFiles> {
        let handle = self.stage(&targets)?;
        Ok(StagedFiles::new(targets, handle))
    }
}
