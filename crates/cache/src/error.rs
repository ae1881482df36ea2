//! Cache Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A cache error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Reading or writing the cache file failed.
    #[display("cache I/O error: {}", _0.display())]
    Io(#[error(not(source))] PathBuf),
    /// The file is not a cache file, or is truncated. Discard and rebuild.
    #[display("corrupt cache data")]
    Corrupt,
    /// Written by a different format version. Discard and rebuild.
    #[display("unsupported cache format version: {_0}")]
    UnsupportedVersion(#[error(not(source))] u64),
    /// A record holds a value that cannot be represented.
    #[display("invalid cache data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Io(_))
    }
}
