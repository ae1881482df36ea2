use crate::error::{ErrorKind, Result};
use crate::file::VirtualFile;
use crate::index::IndexStore;
use crate::pool::WorkerPool;
use crate::scan::{IndexReport, Indexer};
use crate::stage::{StagedFiles, Stager, StagingHandle};
use exn::{OptionExt, ResultExt};
use hoard_cache::CacheFile;
use hoard_config::Config;
use hoard_extract::ExtractorHandle;
use hoard_storage::ScratchRoot;
use std::path::Path;
use std::sync::Arc;
use tracing::instrument;

/// An open virtual file system: the index plus everything needed to keep
/// it up to date and to read from it.
///
/// Opening wipes the scratch directory and loads the cache; closing (or
/// dropping) saves any unsaved changes.
pub struct Vfs {
    store: IndexStore,
    extractor: ExtractorHandle,
    scratch: ScratchRoot,
    pool: WorkerPool,
}

impl Vfs {
    #[instrument(skip_all, fields(cache = %config.cache_file.display(), staging = %config.staging_dir.display()))]
    pub fn open(config: &Config, extractor: ExtractorHandle) -> Result<Self> {
        let scratch = ScratchRoot::create(&config.staging_dir).or_raise(|| ErrorKind::Storage)?;
        let pool = WorkerPool::new(config.worker_count())?;
        let store = match config.persist {
            true => IndexStore::open(CacheFile::new(&config.cache_file), Arc::clone(&extractor)),
            false => IndexStore::in_memory(Arc::clone(&extractor)),
        };
        tracing::info!(files = store.len(), workers = pool.workers(), "virtual file system open");
        Ok(Self { store, extractor, scratch, pool })
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    pub fn scratch(&self) -> &ScratchRoot {
        &self.scratch
    }

    pub fn indexer(&self) -> Indexer<'_> {
        Indexer::new(&self.store, self.extractor.as_ref(), &self.scratch, &self.pool)
    }

    pub fn stager(&self) -> Stager<'_> {
        Stager::new(&self.store, self.extractor.as_ref(), &self.scratch)
    }

    pub fn index_root(&self, root: impl AsRef<Path>) -> Result<IndexReport> {
        self.indexer().index_root(root)
    }

    pub fn index_roots<P: AsRef<Path>>(&self, roots: &[P]) -> Result<IndexReport> {
        self.indexer().index_roots(roots)
    }

    pub fn lookup(&self, key: &str) -> Option<Arc<VirtualFile>> {
        self.store.lookup(key)
    }

    pub fn stage(&self, files: &[Arc<VirtualFile>]) -> Result<StagingHandle> {
        self.stager().stage(files)
    }

    pub fn stage_with(&self, files: Vec<Arc<VirtualFile>>) -> Result<StagedFiles> {
        self.stager().stage_with(files)
    }

    pub fn files_in_archive(&self, archive: &VirtualFile) -> Vec<Arc<VirtualFile>> {
        self.store.files_in_archive(archive)
    }

    pub fn grouped_by_top_level_archive(&self) -> Vec<(Arc<VirtualFile>, Vec<Arc<VirtualFile>>)> {
        self.store.grouped_by_top_level_archive()
    }

    pub fn file_for_hash_path<S: AsRef<str>>(&self, hash_path: &[S]) -> Result<Arc<VirtualFile>> {
        self.store.file_for_hash_path(hash_path)
    }

    pub fn refresh_hash_index(&self) {
        self.store.refresh_hash_index();
    }

    /// Entry names inside an archive, read without extracting anything.
    /// The archive has to be staged.
    pub fn entry_names(&self, archive: &VirtualFile) -> Result<Vec<String>> {
        let path = archive.staged_path().ok_or_raise(|| ErrorKind::Unstaged(archive.key().to_string()))?;
        self.extractor.list_entry_names(&path).or_raise(|| ErrorKind::Extraction(archive.key().to_string()))
    }

    /// Save any unsaved changes and shut down.
    pub fn close(self) -> Result<()> {
        self.store.save()
    }
}

impl Drop for Vfs {
    fn drop(&mut self) {
        if let Err(err) = self.store.save() {
            tracing::warn!(error = ?err, "failed to save index on drop");
        }
    }
}
