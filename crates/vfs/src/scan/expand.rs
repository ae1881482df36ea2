use super::Indexer;
use crate::error::{ErrorKind, Result};
use crate::file::VirtualFile;
use exn::{OptionExt, ResultExt};
use hoard_storage::{ScratchDir, entry_segment};
use std::sync::Arc;
use tracing::instrument;

impl Indexer<'_> {
    /// Discover everything inside a staged archive, recursing into nested
    /// archives.
    ///
    /// Entries are extracted to a scratch directory, added to the index,
    /// hashed in parallel, and expanded in turn if they are archives
    /// themselves. Only when all of that succeeds is the archive marked
    /// finished and the cache saved. The scratch directory is removed either
    /// way, and the entries are left unstaged; staging brings them back on
    /// demand.
    #[instrument(level = "debug", skip(self), fields(key = %archive.key()))]
    pub fn expand_archive(&self, archive: &Arc<VirtualFile>) -> Result<()> {
        let staged = archive.staged_path().ok_or_raise(|| ErrorKind::Unstaged(archive.key().to_string()))?;
        let dir = self.scratch.dir().or_raise(|| ErrorKind::Storage)?;
        self.extractor
            .extract_all(&staged, dir.path())
            .or_raise(|| ErrorKind::Extraction(archive.key().to_string()))?;

        let mut children = Vec::new();
        let outcome = self.register_entries(archive, &dir, &mut children).and_then(|()| {
            self.pool.try_for_each(&children, |child| child.analyze())?;
            let nested: Vec<Arc<VirtualFile>> = children.iter().filter(|child| child.is_archive()).cloned().collect();
            self.pool.try_for_each(&nested, |child| self.expand_archive(child))?;
            self.store.mark_finished(archive);
            self.store.save()
        });

        for child in &children {
            child.forget_staged();
        }
        if let Err(err) = dir.close() {
            tracing::warn!(key = archive.key(), error = ?err, "failed to remove expansion directory");
        }
        if outcome.is_ok() {
            tracing::debug!(entries = children.len(), "archive expanded");
        }
        outcome
    }

    fn register_entries(
        &self,
        archive: &VirtualFile,
        dir: &ScratchDir,
        children: &mut Vec<Arc<VirtualFile>>,
    ) -> Result<()> {
        let extracted = hoard_storage::files(dir.path()).or_raise(|| ErrorKind::Storage)?;
        for path in extracted {
            let relative = path.strip_prefix(dir.path()).or_raise(|| ErrorKind::InvalidPath(path.clone()))?;
            let segment = entry_segment(relative).or_raise(|| ErrorKind::InvalidPath(path.clone()))?;
            let child = Arc::new(VirtualFile::nested(archive, segment, self.extractor)?);
            child.set_staged_path(&path)?;
            self.store.add(Arc::clone(&child));
            children.push(child);
        }
        Ok(())
    }
}
