//! Extraction Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// An extraction error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// No extractor handles this kind of file.
    #[display("unsupported archive format: {_0}")]
    UnsupportedFormat(#[error(not(source))] String),
    /// The archive is corrupt or truncated. Don't retry with the same input.
    #[display("invalid or corrupted archive: {}", _0.display())]
    InvalidArchive(#[error(not(source))] PathBuf),
    /// An entry name would escape the destination directory.
    #[display("unsafe archive entry: {_0}")]
    UnsafeEntry(#[error(not(source))] String),
    /// Reading the archive or writing an entry failed.
    #[display("I/O error: {}", _0.display())]
    Io(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Io(_))
    }
}
