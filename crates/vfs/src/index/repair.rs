use super::IndexStore;
use crate::file::{Analysis, VirtualFile};
use hoard_storage::KEY_SEPARATOR;
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::sync::Arc;

impl IndexStore {
    /// Remove files that can no longer be reached.
    ///
    /// That is concrete files that are gone from disk, nested files that were
    /// never hashed, and nested files with an ancestor that is missing, was
    /// never hashed, or is itself a concrete file gone from disk. Returns how
    /// many files were removed.
    pub fn clean_orphans(&self) -> usize {
        let mut inner = self.inner.lock();
        let missing_roots: HashSet<String> = inner
            .files
            .values()
            .filter(|file| file.is_concrete() && !Path::new(file.key()).is_file())
            .map(|file| file.key().to_string())
            .collect();
        let orphaned = |file: &VirtualFile| -> bool {
            if file.is_concrete() {
                return missing_roots.contains(file.key());
            }
            if file.hash().is_none() {
                return true;
            }
            let mut current = file.parent_key();
            while let Some(key) = current {
                let Some(ancestor) = inner.files.get(key) else {
                    return true;
                };
                if ancestor.hash().is_none() || missing_roots.contains(ancestor.key()) {
                    return true;
                }
                current = ancestor.parent_key();
            }
            false
        };
        let doomed: Vec<String> = inner
            .files
            .values()
            .filter(|file| orphaned(file))
            .map(|file| file.key().to_string())
            .collect();
        let removed = inner.remove_keys(&doomed);
        if removed > 0 {
            tracing::debug!(removed, "cleaned orphaned files");
        }
        removed
    }

    /// Add a placeholder for every ancestor missing from the index, so broken
    /// chains can be inspected and repaired. Placeholders have no hash.
    ///
    /// Goes through [`add_known`](Self::add_known), so persistence is off
    /// afterwards if anything was added. Call
    /// [`refresh_hash_index`](Self::refresh_hash_index) when done.
    pub fn backfill_missing(&self) -> usize {
        let missing: BTreeSet<String> = {
            let inner = self.inner.lock();
            let separator = KEY_SEPARATOR.to_string();
            let mut missing = BTreeSet::new();
            for file in inner.files.values() {
                let chain = file.chain();
                for depth in 1..chain.len() {
                    let key = chain[..depth].join(&separator);
                    if !inner.files.contains_key(&key) {
                        missing.insert(key);
                    }
                }
            }
            missing
        };
        let mut added = 0;
        for key in missing {
            match VirtualFile::from_key(&key, Analysis::default(), self.extractor.as_ref()) {
                Ok(placeholder) => {
                    self.add_known(Arc::new(placeholder));
                    added += 1;
                },
                Err(err) => tracing::warn!(key, error = ?err, "cannot build placeholder"),
            }
        }
        added
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::analyzed;
    use super::*;
    use hoard_extract::Formats;

    fn keys(store: &IndexStore) -> Vec<String> {
        store.entities().iter().map(|file| file.key().to_string()).collect()
    }

    #[test]
    fn test_clean_orphans() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("present.zip");
        std::fs::write(&present, b"zip").unwrap();
        let present = present.to_str().unwrap().to_string();
        let gone = dir.path().join("gone.zip").to_str().unwrap().to_string();

        let store = IndexStore::in_memory(Formats::handle());
        store.add(analyzed(&store, &present, b"zip", 0));
        store.add(analyzed(&store, &format!("{present}|kept.txt"), b"kept", 0));
        // Parent missing from the index.
        store.add(analyzed(&store, &format!("{present}|lost.zip|child.txt"), b"child", 0));
        // Never hashed.
        let unhashed = VirtualFile::from_key(&format!("{present}|unhashed.txt"), Analysis::default(), &Formats::default());
        store.add(Arc::new(unhashed.unwrap()));
        // Root deleted from disk, along with what was inside it.
        store.add(analyzed(&store, &gone, b"gone", 0));
        store.add(analyzed(&store, &format!("{gone}|inside.txt"), b"inside", 0));

        assert_eq!(store.clean_orphans(), 4);
        assert_eq!(keys(&store), vec![present.clone(), format!("{present}|kept.txt")]);
        assert_eq!(store.clean_orphans(), 0);
    }

    #[test]
    fn test_unhashed_ancestor_orphans_descendants() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root.zip");
        std::fs::write(&root, b"zip").unwrap();
        let root = root.to_str().unwrap().to_string();

        let store = IndexStore::in_memory(Formats::handle());
        store.add(analyzed(&store, &root, b"zip", 0));
        let middle = VirtualFile::from_key(&format!("{root}|middle.zip"), Analysis::default(), &Formats::default());
        store.add(Arc::new(middle.unwrap()));
        store.add(analyzed(&store, &format!("{root}|middle.zip|leaf.txt"), b"leaf", 0));

        assert_eq!(store.clean_orphans(), 2);
        assert_eq!(keys(&store), vec![root]);
    }

    #[test]
    fn test_backfill_missing_fills_every_level() {
        let store = IndexStore::in_memory(Formats::handle());
        store.add(analyzed(&store, "/mods/a.zip|b.zip|c.zip|d.txt", b"d", 0));
        assert_eq!(store.backfill_missing(), 3);
        assert_eq!(
            keys(&store),
            vec!["/mods/a.zip", "/mods/a.zip|b.zip", "/mods/a.zip|b.zip|c.zip", "/mods/a.zip|b.zip|c.zip|d.txt"]
        );
        assert!(store.lookup("/mods/a.zip|b.zip").unwrap().hash().is_none());
        assert!(!store.persistence_enabled());
        assert_eq!(store.backfill_missing(), 0);
    }
}
