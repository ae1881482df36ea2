use crate::codec;
use crate::error::{ErrorKind, Result};
use crate::record::Record;
use exn::ResultExt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::instrument;

/// The cache file on disk.
#[derive(Debug, Clone)]
pub struct CacheFile {
    path: PathBuf,
}

impl CacheFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record. A missing file is `Ok(None)`, not an error.
    #[instrument(level = "debug", skip(self), fields(path = %self.path.display()))]
    pub fn load(&self) -> Result<Option<Vec<Record>>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err).or_raise(|| ErrorKind::Io(self.path.clone())),
        };
        let records = codec::decode(&bytes)?;
        tracing::debug!(records = records.len(), bytes = bytes.len(), "loaded cache file");
        Ok(Some(records))
    }

    /// Replace the file with `records`.
    ///
    /// The bytes go to a temporary file in the same directory which is then
    /// renamed over the old one, so readers only ever see a whole file.
    #[instrument(level = "debug", skip(self, records), fields(path = %self.path.display(), records = records.len()))]
    pub fn store(&self, records: &[Record]) -> Result<()> {
        let bytes = codec::encode(records)?;
        let io_error = || ErrorKind::Io(self.path.clone());
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).or_raise(io_error)?;
        let mut temp = tempfile::NamedTempFile::new_in(parent).or_raise(io_error)?;
        temp.write_all(&bytes).or_raise(io_error)?;
        temp.as_file().sync_all().or_raise(io_error)?;
        temp.persist(&self.path).or_raise(io_error)?;
        Ok(())
    }

    /// Delete the file, ignoring failures. Used after a corrupt load.
    pub fn remove_best_effort(&self) {
        match fs::remove_file(&self.path) {
            Ok(()) => {},
            Err(err) if err.kind() == io::ErrorKind::NotFound => {},
            Err(err) => tracing::warn!(path = %self.path.display(), error = %err, "failed to remove cache file"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoard_storage::ContentHash;

    fn record(key: &str) -> Record {
        Record {
            key: key.to_string(),
            hash: Some(ContentHash::of(key.as_bytes())),
            size: 12,
            last_modified: 1_000,
            finished_indexing: true,
        }
    }

    #[test]
    fn test_missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheFile::new(dir.path().join("vfs_cache.bin"));
        assert!(cache.load().unwrap().is_none());
    }

    #[test]
    fn test_store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheFile::new(dir.path().join("nested/vfs_cache.bin"));
        cache.store(&[record("/a.txt"), record("/b.zip")]).unwrap();
        assert_eq!(cache.load().unwrap().unwrap(), vec![record("/a.txt"), record("/b.zip")]);

        // Overwrite leaves only the new contents and no temporary files behind.
        cache.store(&[record("/c.txt")]).unwrap();
        assert_eq!(cache.load().unwrap().unwrap(), vec![record("/c.txt")]);
        assert_eq!(fs::read_dir(dir.path().join("nested")).unwrap().count(), 1);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vfs_cache.bin");
        fs::write(&path, b"garbage").unwrap();
        let err = CacheFile::new(&path).load().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Corrupt));
    }

    #[test]
    fn test_remove_best_effort() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheFile::new(dir.path().join("vfs_cache.bin"));
        cache.remove_best_effort();
        cache.store(&[]).unwrap();
        cache.remove_best_effort();
        assert!(!cache.path().exists());
    }
}
