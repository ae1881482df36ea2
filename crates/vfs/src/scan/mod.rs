//! Discovery: walking roots, hashing what changed and recursing into archives.

mod expand;

use crate::error::{Error, ErrorKind, Result};
use crate::file::VirtualFile;
use crate::index::IndexStore;
use crate::pool::WorkerPool;
use exn::ResultExt;
use hoard_extract::Extractor;
use hoard_storage::ScratchRoot;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::instrument;

/// How many times a file may be found outdated straight after being indexed
/// before giving up on it.
const MAX_DISCOVERY_ATTEMPTS: usize = 3;

/// A file that could not be indexed.
#[derive(Debug)]
pub struct IndexFailure {
    pub path: PathBuf,
    pub error: Error,
}

/// Outcome of indexing one or more roots.
#[derive(Debug, Default)]
pub struct IndexReport {
    /// Real files found under the roots.
    pub files: usize,
    pub failures: Vec<IndexFailure>,
}

impl IndexReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Walks real directories and keeps the index in step with them.
pub struct Indexer<'a> {
    store: &'a IndexStore,
    extractor: &'a (dyn Extractor + Send + Sync),
    scratch: &'a ScratchRoot,
    pool: &'a WorkerPool,
}

impl<'a> Indexer<'a> {
    pub fn new(
        store: &'a IndexStore,
        extractor: &'a (dyn Extractor + Send + Sync),
        scratch: &'a ScratchRoot,
        pool: &'a WorkerPool,
    ) -> Self {
        Self { store, extractor, scratch, pool }
    }

    /// Index every file under `root`.
    pub fn index_root(&self, root: impl AsRef<Path>) -> Result<IndexReport> {
        self.index_roots(&[root.as_ref()])
    }

    /// Index every file under each root in one pass.
    ///
    /// Files are updated in parallel. A file that fails (a corrupt archive,
    /// say) is logged and reported, and the rest carry on. The cache is saved
    /// and the hash index rebuilt once at the end.
    #[instrument(skip_all, fields(roots = roots.len()))]
    pub fn index_roots<P: AsRef<Path>>(&self, roots: &[P]) -> Result<IndexReport> {
        let mut found = BTreeSet::new();
        for root in roots {
            let root = root.as_ref();
            let root = std::path::absolute(root).or_raise(|| ErrorKind::InvalidPath(root.to_path_buf()))?;
            found.extend(hoard_storage::files(&root).or_raise(|| ErrorKind::Storage)?);
        }
        let files: Vec<PathBuf> = found.into_iter().collect();
        tracing::info!(files = files.len(), "updating index");

        let outcomes = self.pool.parallel_map(&files, |path| self.update_file(path).map(|_| ()));
        let mut report = IndexReport { files: files.len(), failures: Vec::new() };
        for (path, outcome) in files.into_iter().zip(outcomes) {
            if let Err(error) = outcome {
                tracing::warn!(path = %path.display(), error = ?error, "failed to index file");
                report.failures.push(IndexFailure { path, error });
            }
        }

        self.store.save()?;
        self.store.refresh_hash_index();
        tracing::info!(files = report.files, failed = report.failures.len(), indexed = self.store.len(), "index updated");
        Ok(report)
    }

    /// Bring one real file up to date: index it if it's new, re-index it if
    /// it changed or its archive contents were never finished.
    #[instrument(level = "debug", skip(self), fields(path = %path.display()))]
    pub fn update_file(&self, path: &Path) -> Result<Arc<VirtualFile>> {
        let key = VirtualFile::concrete(path, self.extractor)?.key().to_string();
        for attempt in 1..=MAX_DISCOVERY_ATTEMPTS {
            let file = match self.store.lookup(&key) {
                Some(existing) => existing,
                None => self.discover(path)?,
            };
            if !file.is_outdated() {
                return Ok(file);
            }
            tracing::debug!(key, attempt, "file is outdated, purging");
            self.store.purge(&file);
        }
        exn::bail!(ErrorKind::Unstable(key))
    }

    fn discover(&self, path: &Path) -> Result<Arc<VirtualFile>> {
        let file = Arc::new(VirtualFile::concrete(path, self.extractor)?);
        tracing::debug!(key = file.key(), "analyzing");
        // Concrete files stage in place.
        file.generate_staged_name(self.scratch);
        file.analyze()?;
        self.store.add(Arc::clone(&file));
        if file.is_archive() {
            self.expand_archive(&file)?;
        }
        Ok(file)
    }
}
