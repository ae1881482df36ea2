//! Storage Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::{Path, PathBuf};

/// A storage error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// File does not exist
    #[display("file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// Access denied by the operating system
    #[display("permission denied: {}", _0.display())]
    PermissionDenied(#[error(not(source))] PathBuf),
    /// Path contains invalid characters or escapes its root
    #[display("invalid path: {}", _0.display())]
    InvalidPath(#[error(not(source))] PathBuf),
    /// String is not a hex-encoded content hash
    #[display("invalid content hash: {_0}")]
    InvalidHash(#[error(not(source))] String),
    /// Recursive directory listing failed part-way through
    #[display("failed to walk directory: {}", _0.display())]
    Walk(#[error(not(source))] PathBuf),
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}
impl ErrorKind {
    /// Classify an I/O error against the path it happened on.
    pub(crate) fn io(err: IoError, path: &Path) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io(err),
        }
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::PermissionDenied(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_are_classified_by_kind() {
        let path = Path::new("/somewhere/file.bin");
        let missing = ErrorKind::io(IoError::new(std::io::ErrorKind::NotFound, "gone"), path);
        assert!(matches!(missing, ErrorKind::NotFound(ref p) if p == path));
        let denied = ErrorKind::io(IoError::new(std::io::ErrorKind::PermissionDenied, "no"), path);
        assert!(matches!(denied, ErrorKind::PermissionDenied(_)));
        let other = ErrorKind::io(IoError::other("boom"), path);
        assert!(matches!(other, ErrorKind::Io(_)));
    }

    #[test]
    fn retryable_kinds() {
        assert!(ErrorKind::Io(IoError::other("boom")).is_retryable());
        assert!(!ErrorKind::NotFound(PathBuf::from("x")).is_retryable());
        assert!(!ErrorKind::InvalidHash("zz".to_string()).is_retryable());
    }
}
