use super::IndexStore;
use crate::error::{ErrorKind, Result};
use crate::file::VirtualFile;
use exn::ResultExt;
use hoard_cache::Record;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::instrument;

impl IndexStore {
    /// Replace the contents of the store with the cache file.
    ///
    /// A corrupt cache is logged, deleted and replaced by an empty, dirty
    /// store. After a good load, orphans are cleaned and the hash index is
    /// rebuilt.
    #[instrument(skip(self))]
    pub(super) fn load(&self) {
        let Some(cache) = &self.cache else { return };
        let loaded = match cache.load() {
            Ok(None) => {
                tracing::info!(path = %cache.path().display(), "no cache file, starting empty");
                return;
            },
            Ok(Some(records)) => self.restore(&records),
            Err(err) => Err(err).or_raise(|| ErrorKind::Cache),
        };
        match loaded {
            Ok(count) => {
                tracing::info!(path = %cache.path().display(), files = count, "loaded cache");
                let removed = self.clean_orphans();
                if removed > 0 {
                    tracing::info!(removed, "dropped stale entries from cache");
                }
                self.refresh_hash_index();
            },
            Err(err) => {
                tracing::warn!(path = %cache.path().display(), error = ?err, "purging corrupt cache");
                let mut inner = self.inner.lock();
                inner.files.clear();
                inner.by_hash.clear();
                inner.dirty = true;
                drop(inner);
                cache.remove_best_effort();
            },
        }
    }

    fn restore(&self, records: &[Record]) -> Result<usize> {
        let mut files = BTreeMap::new();
        for record in records {
            let file = VirtualFile::from_record(record, self.extractor.as_ref())?;
            if files.insert(record.key.clone(), Arc::new(file)).is_some() {
                exn::bail!(ErrorKind::InvalidPath(record.key.clone().into()));
            }
        }
        let count = files.len();
        let mut inner = self.inner.lock();
        inner.files = files;
        inner.by_hash.clear();
        inner.dirty = false;
        Ok(count)
    }

    /// Write every file to the cache file, if anything changed.
    ///
    /// Does nothing for in-memory stores or once
    /// [`add_known`](Self::add_known) has been used. The file is replaced
    /// atomically, so a crash mid-write leaves the previous cache intact.
    #[instrument(skip(self))]
    pub fn save(&self) -> Result<()> {
        let Some(cache) = &self.cache else { return Ok(()) };
        let _writer = self.save_lock.lock();
        let records: Vec<Record> = {
            let mut inner = self.inner.lock();
            if !inner.dirty || inner.persistence_disabled {
                return Ok(());
            }
            inner.dirty = false;
            inner.files.values().map(|file| file.to_record()).collect()
        };
        if let Err(err) = cache.store(&records) {
            self.inner.lock().dirty = true;
            return Err(err).or_raise(|| ErrorKind::Cache);
        }
        tracing::debug!(files = records.len(), "saved cache");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::analyzed;
    use super::*;
    use crate::file::Analysis;
    use hoard_cache::CacheFile;
    use hoard_extract::Formats;
    use hoard_storage::ContentHash;
    use rstest::rstest;
    use std::path::Path;

    fn tuples(store: &IndexStore) -> Vec<Record> {
        store.entities().iter().map(|file| file.to_record()).collect()
    }

    /// Concrete files on disk plus nested entries under the archive.
    fn seed(dir: &Path, store: &IndexStore) {
        let archive = dir.join("pack.zip");
        let doc = dir.join("doc.txt");
        std::fs::write(&archive, b"zip bytes").unwrap();
        std::fs::write(&doc, b"doc bytes").unwrap();
        let archive = archive.to_str().unwrap();
        store.add(analyzed(store, archive, b"zip bytes", 1));
        store.add(analyzed(store, doc.to_str().unwrap(), b"doc bytes", 2));
        store.add(analyzed(store, &format!("{archive}|a.txt"), b"a", 3));
        store.add(analyzed(store, &format!("{archive}|inner.zip"), b"inner", 4));
        store.add(analyzed(store, &format!("{archive}|inner.zip|b.txt"), b"b", 5));
    }

    #[test]
    fn test_save_then_open_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheFile::new(dir.path().join("vfs_cache.bin"));
        let store = IndexStore::open(cache.clone(), Formats::handle());
        assert!(store.is_empty());
        assert!(store.persistence_enabled());
        seed(dir.path(), &store);
        store.save().unwrap();
        assert!(!store.is_dirty());

        let reopened = IndexStore::open(cache, Formats::handle());
        assert_eq!(tuples(&reopened), tuples(&store));
        assert!(!reopened.is_dirty());
        // The hash index is ready straight after opening.
        assert_eq!(reopened.files_with_hash(&ContentHash::of(b"b")).len(), 1);
    }

    #[test]
    fn test_save_is_noop_when_clean() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vfs_cache.bin");
        let store = IndexStore::open(CacheFile::new(&path), Formats::handle());
        store.save().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_add_known_stops_saving() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vfs_cache.bin");
        let store = IndexStore::open(CacheFile::new(&path), Formats::handle());
        seed(dir.path(), &store);
        store.add_known(Arc::new(
            VirtualFile::from_key("/placeholder.zip", Analysis::default(), &Formats::default()).unwrap(),
        ));
        assert!(!store.persistence_enabled());
        store.save().unwrap();
        assert!(!path.exists());
        assert!(store.is_dirty());
    }

    #[test]
    fn test_open_drops_orphans() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheFile::new(dir.path().join("vfs_cache.bin"));
        let store = IndexStore::open(cache.clone(), Formats::handle());
        seed(dir.path(), &store);
        store.save().unwrap();

        std::fs::remove_file(dir.path().join("pack.zip")).unwrap();
        let reopened = IndexStore::open(cache, Formats::handle());
        let keys: Vec<String> = reopened.entities().iter().map(|file| file.key().to_string()).collect();
        assert_eq!(keys, vec![dir.path().join("doc.txt").to_str().unwrap().to_string()]);
    }

    #[rstest]
    #[case::garbage(b"this is not a cache file".to_vec())]
    #[case::empty(Vec::new())]
    #[case::header_only(b"HOARDVFS".to_vec())]
    fn test_corrupt_cache_yields_empty_dirty_store(#[case] contents: Vec<u8>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vfs_cache.bin");
        std::fs::write(&path, contents).unwrap();
        let store = IndexStore::open(CacheFile::new(&path), Formats::handle());
        assert!(store.is_empty());
        assert!(store.is_dirty());
        assert!(!path.exists());
    }

    #[test]
    fn test_truncated_cache_yields_empty_dirty_store() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheFile::new(dir.path().join("vfs_cache.bin"));
        let store = IndexStore::open(cache.clone(), Formats::handle());
        seed(dir.path(), &store);
        store.save().unwrap();

        let bytes = std::fs::read(cache.path()).unwrap();
        std::fs::write(cache.path(), &bytes[..bytes.len() - 3]).unwrap();
        let reopened = IndexStore::open(cache, Formats::handle());
        assert!(reopened.is_empty());
        assert!(reopened.is_dirty());
    }

    #[test]
    fn test_duplicate_keys_are_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheFile::new(dir.path().join("vfs_cache.bin"));
        let doc = dir.path().join("doc.txt");
        std::fs::write(&doc, b"doc").unwrap();
        let record = Record {
            key: doc.to_str().unwrap().to_string(),
            hash: None,
            size: 3,
            last_modified: 0,
            finished_indexing: false,
        };
        cache.store(&[record.clone(), record]).unwrap();
        let store = IndexStore::open(cache, Formats::handle());
        assert!(store.is_empty());
        assert!(store.is_dirty());
    }
}
