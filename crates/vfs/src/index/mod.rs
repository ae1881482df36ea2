//! The in-memory index of every known virtual file.
//!
//! Two views are kept: a forward index from key to file, and a reverse index
//! from content hash to every file with those bytes. The reverse index is a
//! fold of the forward one and is rebuilt with
//! [`refresh_hash_index`](IndexStore::refresh_hash_index) after bulk changes;
//! purges drop entries from it so it never points at removed files.
//!
//! All state sits behind one lock. Indexing workers hash and extract in
//! parallel, but every insert, purge and multi-step read goes through that
//! lock, so nobody sees a half-applied change.

mod persist;
mod repair;

use crate::error::{ErrorKind, Result};
use crate::file::VirtualFile;
use exn::{OptionExt, ResultExt};
use hoard_cache::CacheFile;
use hoard_extract::ExtractorHandle;
use hoard_storage::{ContentHash, KEY_SEPARATOR};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

#[derive(Default)]
struct Inner {
    files: BTreeMap<String, Arc<VirtualFile>>,
    by_hash: HashMap<ContentHash, Vec<Arc<VirtualFile>>>,
    dirty: bool,
    persistence_disabled: bool,
}

impl Inner {
    /// Every key equal to `key` or nested under it.
    fn subtree_keys(&self, key: &str) -> Vec<String> {
        let prefix = descendant_prefix(key);
        let mut keys: Vec<String> = self
            .files
            .range(prefix.clone()..)
            .take_while(|(candidate, _)| candidate.starts_with(&prefix))
            .map(|(candidate, _)| candidate.clone())
            .collect();
        if self.files.contains_key(key) {
            keys.push(key.to_string());
        }
        keys
    }

    fn remove_keys(&mut self, keys: &[String]) -> usize {
        let mut removed = 0;
        for key in keys {
            let Some(file) = self.files.remove(key) else { continue };
            removed += 1;
            if let Some(hash) = file.hash()
                && let Some(bucket) = self.by_hash.get_mut(&hash)
            {
                bucket.retain(|other| other.key() != key);
                if bucket.is_empty() {
                    self.by_hash.remove(&hash);
                }
            }
        }
        if removed > 0 {
            self.dirty = true;
        }
        removed
    }

    fn purge(&mut self, key: &str) -> usize {
        let keys = self.subtree_keys(key);
        self.remove_keys(&keys)
    }

    fn rebuild_hash_index(&mut self) {
        let mut by_hash: HashMap<ContentHash, Vec<Arc<VirtualFile>>> = HashMap::new();
        for file in self.files.values() {
            if let Some(hash) = file.hash() {
                by_hash.entry(hash).or_default().push(Arc::clone(file));
            }
        }
        self.by_hash = by_hash;
    }
}

fn descendant_prefix(key: &str) -> String {
    let mut prefix = String::with_capacity(key.len() + 1);
    prefix.push_str(key);
    prefix.push(KEY_SEPARATOR);
    prefix
}

/// The index of virtual files, optionally backed by a cache file.
pub struct IndexStore {
    inner: Mutex<Inner>,
    // Serializes writers of the cache file without holding `inner` during I/O.
    save_lock: Mutex<()>,
    cache: Option<CacheFile>,
    extractor: ExtractorHandle,
}

impl IndexStore {
    /// A store that never touches the disk.
    pub fn in_memory(extractor: ExtractorHandle) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            save_lock: Mutex::new(()),
            cache: None,
            extractor,
        }
    }

    /// A store backed by `cache`, loaded from it immediately.
    ///
    /// A missing cache file means an empty store. A corrupt one is deleted and
    /// also means an empty store; it never fails.
    pub fn open(cache: CacheFile, extractor: ExtractorHandle) -> Self {
        let store = Self {
            inner: Mutex::new(Inner::default()),
            save_lock: Mutex::new(()),
            cache: Some(cache),
            extractor,
        };
        store.load();
        store
    }

    #[cfg(test)]
    pub(crate) fn extractor(&self) -> &ExtractorHandle {
        &self.extractor
    }

    /// The file with exactly this key.
    pub fn lookup(&self, key: &str) -> Option<Arc<VirtualFile>> {
        self.inner.lock().files.get(key).cloned()
    }

    /// Insert a file, first purging any file with the same key and
    /// everything nested under it.
    pub fn add(&self, file: Arc<VirtualFile>) {
        let mut inner = self.inner.lock();
        if inner.files.contains_key(file.key()) {
            let purged = inner.purge(file.key());
            tracing::debug!(key = file.key(), purged, "replacing indexed file");
        }
        inner.files.insert(file.key().to_string(), file);
        inner.dirty = true;
    }

    /// Remove a file and everything nested under it. Returns how many files
    /// were removed; a file that isn't indexed removes nothing.
    pub fn purge(&self, file: &VirtualFile) -> usize {
        self.inner.lock().purge(file.key())
    }

    /// Insert a file that was not derived from its bytes (an ancestor
    /// placeholder, say), replacing any file with the same key but leaving
    /// its descendants alone.
    ///
    /// The cache can no longer be trusted as a rebuildable record after this,
    /// so persistence is turned off for the life of the store. Call
    /// [`refresh_hash_index`](Self::refresh_hash_index) once done.
    pub fn add_known(&self, file: Arc<VirtualFile>) {
        let mut inner = self.inner.lock();
        if !inner.persistence_disabled {
            tracing::warn!(key = file.key(), "fabricated entry added, cache persistence disabled");
            inner.persistence_disabled = true;
        }
        inner.files.insert(file.key().to_string(), file);
        inner.dirty = true;
    }

    /// Mark an archive's contents as fully discovered.
    pub fn mark_finished(&self, file: &VirtualFile) {
        let mut inner = self.inner.lock();
        file.set_finished_indexing(true);
        inner.dirty = true;
    }

    /// Rebuild the hash index from the current files.
    pub fn refresh_hash_index(&self) {
        let mut inner = self.inner.lock();
        inner.rebuild_hash_index();
        tracing::debug!(hashes = inner.by_hash.len(), files = inner.files.len(), "rebuilt hash index");
    }

    /// Every file nested under `archive`, at any depth, in key order.
    pub fn files_in_archive(&self, archive: &VirtualFile) -> Vec<Arc<VirtualFile>> {
        let inner = self.inner.lock();
        let prefix = descendant_prefix(archive.key());
        inner
            .files
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .map(|(_, file)| Arc::clone(file))
            .collect()
    }

    /// The chain of files from the concrete root down to `file` itself.
    pub fn files_in_path(&self, file: &Arc<VirtualFile>) -> Result<Vec<Arc<VirtualFile>>> {
        let inner = self.inner.lock();
        let chain = file.chain();
        let separator = KEY_SEPARATOR.to_string();
        let mut path = Vec::with_capacity(chain.len());
        for depth in 1..chain.len() {
            let key = chain[..depth].join(&separator);
            let ancestor = inner.files.get(&key).ok_or_raise(|| ErrorKind::BrokenChain(key.clone()))?;
            path.push(Arc::clone(ancestor));
        }
        path.push(Arc::clone(file));
        Ok(path)
    }

    /// The archive `file` lives in.
    pub fn parent(&self, file: &VirtualFile) -> Option<Arc<VirtualFile>> {
        file.parent_key().and_then(|key| self.lookup(key))
    }

    /// The concrete file at the top of `file`'s chain.
    pub fn root(&self, file: &VirtualFile) -> Option<Arc<VirtualFile>> {
        self.lookup(file.root_key())
    }

    /// Every nested file, grouped by the concrete file it ultimately lives
    /// in. Groups are in key order; nested files whose root isn't indexed
    /// are left out.
    pub fn grouped_by_top_level_archive(&self) -> Vec<(Arc<VirtualFile>, Vec<Arc<VirtualFile>>)> {
        let inner = self.inner.lock();
        let mut groups: BTreeMap<&str, Vec<Arc<VirtualFile>>> = BTreeMap::new();
        for file in inner.files.values().filter(|file| !file.is_concrete()) {
            groups.entry(file.root_key()).or_default().push(Arc::clone(file));
        }
        groups
            .into_iter()
            .filter_map(|(root, members)| inner.files.get(root).map(|root| (Arc::clone(root), members)))
            .collect()
    }

    /// Every indexed file with these bytes, as of the last hash index rebuild.
    pub fn files_with_hash(&self, hash: &ContentHash) -> Vec<Arc<VirtualFile>> {
        self.inner.lock().by_hash.get(hash).cloned().unwrap_or_default()
    }

    /// Resolve a path whose first segment is a content hash instead of a
    /// real path: `[hash]` or `[archive hash, entry, nested entry, ...]`.
    ///
    /// With a single segment the first file with that hash (by key) wins.
    /// With more, the hash must belong to an archive. If several archives
    /// share it, the most recently modified one is used, ties going to the
    /// smallest key. That choice is a best guess when different archives
    /// hold the same bytes.
    pub fn file_for_hash_path<S: AsRef<str>>(&self, hash_path: &[S]) -> Result<Arc<VirtualFile>> {
        let (first, rest) = hash_path.split_first().ok_or_raise(|| ErrorKind::InvalidHash(String::new()))?;
        let first = first.as_ref();
        let hash = first.parse::<ContentHash>().or_raise(|| ErrorKind::InvalidHash(first.to_string()))?;
        let inner = self.inner.lock();
        let bucket = inner.by_hash.get(&hash).ok_or_raise(|| ErrorKind::UnknownHash(first.to_string()))?;
        if rest.is_empty() {
            return bucket.first().cloned().ok_or_raise(|| ErrorKind::UnknownHash(first.to_string()));
        }
        let archive = bucket
            .iter()
            .filter(|file| file.is_archive())
            .max_by(|a, b| a.last_modified().cmp(&b.last_modified()).then_with(|| b.key().cmp(a.key())))
            .ok_or_raise(|| ErrorKind::UnknownHash(first.to_string()))?;
        let mut key = archive.key().to_string();
        for segment in rest {
            key.push(KEY_SEPARATOR);
            key.push_str(segment.as_ref());
        }
        inner.files.get(&key).cloned().ok_or_raise(|| ErrorKind::NotFound(key.clone()))
    }

    /// The inverse of [`file_for_hash_path`](Self::file_for_hash_path): the
    /// root's content hash followed by the rest of the chain.
    pub fn hash_path(&self, file: &VirtualFile) -> Result<Vec<String>> {
        let root = self.root(file).ok_or_raise(|| ErrorKind::BrokenChain(file.root_key().to_string()))?;
        let hash = root.hash().ok_or_raise(|| ErrorKind::BrokenChain(root.key().to_string()))?;
        let mut path = Vec::with_capacity(file.chain().len());
        path.push(hash.to_string());
        path.extend(file.chain()[1..].iter().cloned());
        Ok(path)
    }

    /// Snapshot of every file, in key order.
    pub fn entities(&self) -> Vec<Arc<VirtualFile>> {
        self.inner.lock().files.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().files.is_empty()
    }

    /// Whether there are changes the cache file doesn't have yet.
    pub fn is_dirty(&self) -> bool {
        self.inner.lock().dirty
    }

    /// Whether [`save`](Self::save) will write anything at all.
    pub fn persistence_enabled(&self) -> bool {
        self.cache.is_some() && !self.inner.lock().persistence_disabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::Analysis;
    use hoard_extract::Formats;

    pub(super) fn analyzed(store: &IndexStore, key: &str, bytes: &[u8], last_modified: u64) -> Arc<VirtualFile> {
        let analysis = Analysis {
            hash: Some(ContentHash::of(bytes)),
            size: bytes.len() as u64,
            last_modified,
            finished_indexing: true,
        };
        Arc::new(VirtualFile::from_key(key, analysis, store.extractor().as_ref()).unwrap())
    }

    fn populated() -> IndexStore {
        let store = IndexStore::in_memory(Formats::handle());
        for key in [
            "/mods/pack.zip",
            "/mods/pack.zip|a.txt",
            "/mods/pack.zip|inner.zip",
            "/mods/pack.zip|inner.zip|b.txt",
            "/mods/pack.zip.bak",
            "/mods/readme.txt",
        ] {
            store.add(analyzed(&store, key, key.as_bytes(), 0));
        }
        store
    }

    fn keys(files: &[Arc<VirtualFile>]) -> Vec<&str> {
        files.iter().map(|file| file.key()).collect()
    }

    #[test]
    fn test_lookup() {
        let store = populated();
        assert_eq!(store.lookup("/mods/pack.zip|a.txt").unwrap().key(), "/mods/pack.zip|a.txt");
        assert!(store.lookup("/mods/pack.zip|missing.txt").is_none());
        assert_eq!(store.len(), 6);
        assert!(store.is_dirty());
    }

    #[test]
    fn test_purge_cascades_to_descendants_only() {
        let store = populated();
        let pack = store.lookup("/mods/pack.zip").unwrap();
        assert_eq!(store.purge(&pack), 4);
        assert_eq!(keys(&store.entities()), vec!["/mods/pack.zip.bak", "/mods/readme.txt"]);
        // Purging again is a no-op.
        assert_eq!(store.purge(&pack), 0);
    }

    #[test]
    fn test_add_replaces_subtree() {
        let store = populated();
        store.add(analyzed(&store, "/mods/pack.zip", b"new bytes", 5));
        assert!(store.lookup("/mods/pack.zip|a.txt").is_none());
        assert!(store.lookup("/mods/pack.zip|inner.zip|b.txt").is_none());
        assert_eq!(store.lookup("/mods/pack.zip").unwrap().last_modified(), 5);
    }

    #[test]
    fn test_add_known_keeps_descendants_and_disables_persistence() {
        let store = populated();
        assert!(!store.persistence_enabled());
        let placeholder = Arc::new(VirtualFile::from_key("/mods/pack.zip", Analysis::default(), &Formats::default()).unwrap());
        store.add_known(placeholder);
        assert!(store.lookup("/mods/pack.zip|inner.zip|b.txt").is_some());
        assert_eq!(store.lookup("/mods/pack.zip").unwrap().hash(), None);
    }

    #[test]
    fn test_files_in_archive() {
        let store = populated();
        let pack = store.lookup("/mods/pack.zip").unwrap();
        assert_eq!(
            keys(&store.files_in_archive(&pack)),
            vec!["/mods/pack.zip|a.txt", "/mods/pack.zip|inner.zip", "/mods/pack.zip|inner.zip|b.txt"]
        );
        let inner = store.lookup("/mods/pack.zip|inner.zip").unwrap();
        assert_eq!(keys(&store.files_in_archive(&inner)), vec!["/mods/pack.zip|inner.zip|b.txt"]);
    }

    #[test]
    fn test_files_in_path() {
        let store = populated();
        let b = store.lookup("/mods/pack.zip|inner.zip|b.txt").unwrap();
        assert_eq!(
            keys(&store.files_in_path(&b).unwrap()),
            vec!["/mods/pack.zip", "/mods/pack.zip|inner.zip", "/mods/pack.zip|inner.zip|b.txt"]
        );
        store.purge(&store.lookup("/mods/pack.zip|inner.zip").unwrap());
        let err = store.files_in_path(&b).unwrap_err();
        assert!(matches!(&*err, ErrorKind::BrokenChain(key) if key == "/mods/pack.zip|inner.zip"));
    }

    #[test]
    fn test_parent_and_root() {
        let store = populated();
        let b = store.lookup("/mods/pack.zip|inner.zip|b.txt").unwrap();
        assert_eq!(store.parent(&b).unwrap().key(), "/mods/pack.zip|inner.zip");
        assert_eq!(store.root(&b).unwrap().key(), "/mods/pack.zip");
        let pack = store.lookup("/mods/pack.zip").unwrap();
        assert!(store.parent(&pack).is_none());
        assert_eq!(store.root(&pack).unwrap().key(), "/mods/pack.zip");
    }

    #[test]
    fn test_grouped_by_top_level_archive() {
        let store = populated();
        let groups = store.grouped_by_top_level_archive();
        assert_eq!(groups.len(), 1);
        let (root, members) = &groups[0];
        assert_eq!(root.key(), "/mods/pack.zip");
        assert_eq!(members.len(), 3);
    }

    #[test]
    fn test_hash_index_consistency() {
        let store = populated();
        store.add(analyzed(&store, "/mods/copy.txt", b"/mods/readme.txt", 0));
        store.refresh_hash_index();
        for file in store.entities() {
            let hash = file.hash().unwrap();
            let bucket = store.files_with_hash(&hash);
            assert!(bucket.contains(&file));
            assert!(bucket.iter().all(|other| other.hash() == Some(hash)));
        }
        let shared = store.files_with_hash(&ContentHash::of(b"/mods/readme.txt"));
        assert_eq!(keys(&shared), vec!["/mods/copy.txt", "/mods/readme.txt"]);

        // Purged files leave the hash index straight away.
        store.purge(&store.lookup("/mods/copy.txt").unwrap());
        assert_eq!(keys(&store.files_with_hash(&ContentHash::of(b"/mods/readme.txt"))), vec!["/mods/readme.txt"]);
    }

    #[test]
    fn test_file_for_hash_path() {
        let store = populated();
        store.refresh_hash_index();
        let b_hash = ContentHash::of(b"/mods/pack.zip|inner.zip|b.txt").to_string();
        assert_eq!(store.file_for_hash_path(&[b_hash.as_str()]).unwrap().key(), "/mods/pack.zip|inner.zip|b.txt");

        let pack_hash = ContentHash::of(b"/mods/pack.zip").to_string();
        let found = store.file_for_hash_path(&[pack_hash.as_str(), "inner.zip", "b.txt"]).unwrap();
        assert_eq!(found.key(), "/mods/pack.zip|inner.zip|b.txt");

        let pack = store.lookup("/mods/pack.zip|inner.zip|b.txt").unwrap();
        assert_eq!(store.hash_path(&pack).unwrap(), vec![pack_hash.clone(), "inner.zip".to_string(), "b.txt".to_string()]);

        let err = store.file_for_hash_path(&[pack_hash.as_str(), "nope.txt"]).unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
        let unknown = ContentHash::of(b"nobody").to_string();
        let err = store.file_for_hash_path(&[unknown.as_str()]).unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnknownHash(_)));
        let err = store.file_for_hash_path(&["not-a-hash"]).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidHash(_)));
        let err = store.file_for_hash_path::<&str>(&[]).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidHash(_)));
    }

    #[test]
    fn test_file_for_hash_path_prefers_newest_archive() {
        let store = IndexStore::in_memory(Formats::handle());
        for (root, modified) in [("/a/old.zip", 10), ("/b/new.zip", 20), ("/c/same.zip", 20)] {
            store.add(analyzed(&store, root, b"identical archive", modified));
            store.add(analyzed(&store, &format!("{root}|x.txt"), root.as_bytes(), 0));
        }
        store.refresh_hash_index();
        let hash = ContentHash::of(b"identical archive").to_string();
        let found = store.file_for_hash_path(&[hash.as_str(), "x.txt"]).unwrap();
        assert_eq!(found.key(), "/b/new.zip|x.txt");
    }

    #[test]
    fn test_concurrent_adds_and_purges() {
        let store = Arc::new(IndexStore::in_memory(Formats::handle()));
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let root = format!("/w{worker}/{i}.zip");
                        store.add(analyzed(&store, &root, root.as_bytes(), 0));
                        store.add(analyzed(&store, &format!("{root}|entry.txt"), b"entry", 0));
                        if i % 2 == 0 {
                            store.purge(&store.lookup(&root).unwrap());
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 8 * 25 * 2);
        for file in store.entities().iter().filter(|file| !file.is_concrete()) {
            assert!(store.parent(file).is_some());
        }
    }
}
