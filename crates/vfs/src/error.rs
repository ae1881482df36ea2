//! VFS Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A virtual file system error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for virtual file system operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The file's bytes are not on disk. Stage it first.
    #[display("file is not staged: {_0}")]
    Unstaged(#[error(not(source))] String),
    /// Concrete files are always at their real path and can't be moved.
    #[display("cannot stage a concrete file: {_0}")]
    CannotStageConcrete(#[error(not(source))] String),
    /// The file is already staged somewhere else. Unstage it first.
    #[display("file is already staged elsewhere: {_0}")]
    AlreadyStaged(#[error(not(source))] String),
    /// Hashing, stat-ing, walking or scratch space failed.
    #[display("storage error")]
    Storage,
    /// The archive could not be extracted. It stays unfinished and is retried next run.
    #[display("failed to extract archive: {_0}")]
    Extraction(#[error(not(source))] String),
    /// The cache file could not be written.
    #[display("cache error")]
    Cache,
    /// Nothing in the index has this content hash.
    #[display("no file with hash: {_0}")]
    UnknownHash(#[error(not(source))] String),
    /// A hash path segment is not a content hash.
    #[display("invalid hash: {_0}")]
    InvalidHash(#[error(not(source))] String),
    /// No file with this key is indexed.
    #[display("not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// An ancestor of this file is missing from the index or was never analyzed.
    #[display("broken ancestor chain: {_0}")]
    BrokenChain(#[error(not(source))] String),
    /// The path can't be represented as a virtual file key.
    #[display("invalid path: {}", _0.display())]
    InvalidPath(#[error(not(source))] PathBuf),
    /// The file kept changing while it was being indexed.
    #[display("file changed repeatedly while indexing: {_0}")]
    Unstable(#[error(not(source))] String),
    /// The worker pool could not be started.
    #[display("worker pool error")]
    Pool,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Storage | ErrorKind::Cache | ErrorKind::Unstable(_))
    }
}
