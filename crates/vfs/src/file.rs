use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use hoard_cache::Record;
use hoard_extract::{Extractor, extension_of};
use hoard_storage::{ContentHash, FileStat, KEY_SEPARATOR, ScratchRoot, hash_file};
use parking_lot::{Mutex, RwLock};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::fs::File;
use std::hash::{Hash, Hasher};
use std::io;
use std::path::{Path, PathBuf};
use tracing::instrument;

/// What was learned about a file the last time its bytes were read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Analysis {
    pub hash: Option<ContentHash>,
    pub size: u64,
    /// Unix milliseconds.
    pub last_modified: u64,
    /// For archives: every entry inside was discovered without interruption.
    pub finished_indexing: bool,
}

/// One file, either on disk or nested inside one or more archives.
///
/// The path chain starts with the absolute path of a real file. Every further
/// segment is an entry path inside the archive named by the segments before
/// it, so `/mods/pack.zip|inner.zip|readme.txt` is `readme.txt` inside
/// `inner.zip` inside `/mods/pack.zip`.
///
/// Identity (equality, hashing, ordering) is the key alone.
#[derive(Debug)]
pub struct VirtualFile {
    chain: Vec<String>,
    key: String,
    parent_key: Option<String>,
    extension: Option<String>,
    is_archive: bool,
    analysis: RwLock<Analysis>,
    staged: Mutex<Option<PathBuf>>,
}

impl VirtualFile {
    /// A real file on disk.
    pub fn concrete(path: impl AsRef<Path>, extractor: &dyn Extractor) -> Result<Self> {
        let path = path.as_ref();
        let segment = path.to_str().ok_or_raise(|| ErrorKind::InvalidPath(path.to_path_buf()))?;
        if !is_valid_segment(segment) {
            exn::bail!(ErrorKind::InvalidPath(path.to_path_buf()));
        }
        Ok(Self::from_chain(vec![segment.to_string()], extractor))
    }

    /// An entry inside the archive `parent`.
    pub fn nested(parent: &VirtualFile, segment: impl Into<String>, extractor: &dyn Extractor) -> Result<Self> {
        let segment = segment.into();
        if !is_valid_segment(&segment) {
            exn::bail!(ErrorKind::InvalidPath(PathBuf::from(segment)));
        }
        let mut chain = parent.chain.clone();
        chain.push(segment);
        Ok(Self::from_chain(chain, extractor))
    }

    /// Rebuild a file from its key, for example when reading the cache.
    pub fn from_key(key: &str, analysis: Analysis, extractor: &dyn Extractor) -> Result<Self> {
        let chain: Vec<String> = key.split(KEY_SEPARATOR).map(str::to_string).collect();
        if !chain.iter().all(|segment| is_valid_segment(segment)) {
            exn::bail!(ErrorKind::InvalidPath(PathBuf::from(key)));
        }
        let file = Self::from_chain(chain, extractor);
        *file.analysis.write() = analysis;
        Ok(file)
    }

    pub(crate) fn from_record(record: &Record, extractor: &dyn Extractor) -> Result<Self> {
        let analysis = Analysis {
            hash: record.hash,
            size: record.size,
            last_modified: record.last_modified,
            finished_indexing: record.finished_indexing,
        };
        Self::from_key(&record.key, analysis, extractor)
    }

    pub(crate) fn to_record(&self) -> Record {
        let analysis = self.analysis();
        Record {
            key: self.key.clone(),
            hash: analysis.hash,
            size: analysis.size,
            last_modified: analysis.last_modified,
            finished_indexing: self.is_archive && analysis.finished_indexing,
        }
    }

    fn from_chain(chain: Vec<String>, extractor: &dyn Extractor) -> Self {
        let separator = KEY_SEPARATOR.to_string();
        let key = chain.join(&separator);
        let parent_key = (chain.len() > 1).then(|| chain[..chain.len() - 1].join(&separator));
        let extension = chain.last().and_then(|name| extension_of(name));
        let is_archive = extension.as_deref().is_some_and(|extension| extractor.can_extract(extension));
        Self {
            chain,
            key,
            parent_key,
            extension,
            is_archive,
            analysis: RwLock::new(Analysis::default()),
            staged: Mutex::new(None),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn chain(&self) -> &[String] {
        &self.chain
    }

    /// Key of the archive this file lives in. `None` for concrete files.
    pub fn parent_key(&self) -> Option<&str> {
        self.parent_key.as_deref()
    }

    /// Key of the real file at the top of the chain.
    pub fn root_key(&self) -> &str {
        &self.chain[0]
    }

    /// The last segment: a real path for concrete files, an entry path otherwise.
    pub fn name(&self) -> &str {
        self.chain.last().map_or("", String::as_str)
    }

    /// Lower-cased extension without the dot.
    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    /// How many archives deep this file is; `0` for concrete files.
    pub fn depth(&self) -> usize {
        self.chain.len() - 1
    }

    pub fn is_concrete(&self) -> bool {
        self.chain.len() == 1
    }

    /// Whether the extension is one the extractor can open.
    pub fn is_archive(&self) -> bool {
        self.is_archive
    }

    pub fn analysis(&self) -> Analysis {
        *self.analysis.read()
    }

    pub fn hash(&self) -> Option<ContentHash> {
        self.analysis.read().hash
    }

    pub fn size(&self) -> u64 {
        self.analysis.read().size
    }

    pub fn last_modified(&self) -> u64 {
        self.analysis.read().last_modified
    }

    /// Always `false` for files that aren't archives.
    pub fn finished_indexing(&self) -> bool {
        self.is_archive && self.analysis.read().finished_indexing
    }

    pub(crate) fn set_finished_indexing(&self, finished: bool) {
        if self.is_archive {
            self.analysis.write().finished_indexing = finished;
        }
    }

    /// Where this file's bytes currently are on disk. Concrete files are
    /// always staged at their real path.
    pub fn staged_path(&self) -> Option<PathBuf> {
        match self.is_concrete() {
            true => Some(PathBuf::from(&self.chain[0])),
            false => self.staged.lock().clone(),
        }
    }

    pub fn is_staged(&self) -> bool {
        self.is_concrete() || self.staged.lock().is_some()
    }

    /// Point this file at a materialized copy of its bytes.
    ///
    /// Setting the same path twice is fine; moving a staged file is not.
    pub fn set_staged_path(&self, path: impl Into<PathBuf>) -> Result<()> {
        if self.is_concrete() {
            exn::bail!(ErrorKind::CannotStageConcrete(self.key.clone()));
        }
        let path = path.into();
        let mut staged = self.staged.lock();
        match staged.as_ref() {
            Some(existing) if *existing != path => exn::bail!(ErrorKind::AlreadyStaged(self.key.clone())),
            _ => *staged = Some(path),
        }
        Ok(())
    }

    /// The staged path, allocating a fresh one under `scratch` if there isn't one.
    ///
    /// The new path is `<unique dir>/<file name>`, so the file keeps the exact
    /// name it has inside its archive (single-stream containers derive their
    /// entry name from it). Nothing is created; the caller makes the parent
    /// directory and fills the file in.
    pub fn generate_staged_name(&self, scratch: &ScratchRoot) -> PathBuf {
        if self.is_concrete() {
            return PathBuf::from(&self.chain[0]);
        }
        self.staged
            .lock()
            .get_or_insert_with(|| match Path::new(self.name()).file_name() {
                Some(file_name) => scratch.unique_path(None).join(file_name),
                None => scratch.unique_path(self.extension.as_deref()),
            })
            .clone()
    }

    /// Delete the staged copy of a nested file. No-op for concrete files.
    pub fn unstage(&self) -> Result<()> {
        if self.is_concrete() {
            return Ok(());
        }
        let Some(path) = self.staged.lock().take() else {
            return Ok(());
        };
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).or_raise(|| ErrorKind::Storage),
        }
    }

    /// Drop the staged path without touching the disk, for when whoever
    /// owns the scratch directory deletes it wholesale.
    pub(crate) fn forget_staged(&self) {
        if !self.is_concrete() {
            self.staged.lock().take();
        }
    }

    /// Hash and stat the staged bytes.
    ///
    /// Resets `finished_indexing`: new bytes mean the contents have to be
    /// discovered again.
    #[instrument(level = "debug", skip(self), fields(key = %self.key))]
    pub fn analyze(&self) -> Result<()> {
        let path = self.staged_path().ok_or_raise(|| ErrorKind::Unstaged(self.key.clone()))?;
        // Stat before hashing: a write that lands mid-hash then shows up as outdated.
        let stat = FileStat::of(&path).or_raise(|| ErrorKind::Storage)?;
        let hash = hash_file(&path).or_raise(|| ErrorKind::Storage)?;
        *self.analysis.write() = Analysis {
            hash: Some(hash),
            size: stat.size,
            last_modified: stat.last_modified,
            finished_indexing: false,
        };
        Ok(())
    }

    /// Whether the staged bytes differ from what was analyzed, or an archive's
    /// contents were never fully discovered.
    ///
    /// Unstaged files are never outdated: there is nothing to compare against.
    pub fn is_outdated(&self) -> bool {
        let Some(path) = self.staged_path() else {
            return false;
        };
        let analysis = self.analysis();
        match FileStat::of(&path) {
            Ok(current) => {
                current.size != analysis.size
                    || current.last_modified != analysis.last_modified
                    || (self.is_archive && !analysis.finished_indexing)
            },
            Err(_) => true,
        }
    }

    /// Open the staged bytes for reading.
    pub fn open_read(&self) -> Result<File> {
        let path = self.staged_path().ok_or_raise(|| ErrorKind::Unstaged(self.key.clone()))?;
        File::open(&path).or_raise(|| ErrorKind::Storage)
    }
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty() && !segment.contains(KEY_SEPARATOR)
}

impl PartialEq for VirtualFile {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}
impl Eq for VirtualFile {}
impl Hash for VirtualFile {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}
impl PartialOrd for VirtualFile {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for VirtualFile {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key.cmp(&other.key)
    }
}
impl Display for VirtualFile {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.key)
    }
}
