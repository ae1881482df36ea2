//! Size and modification time, the two things checked to decide whether a
//! file needs hashing again.

use crate::error::{ErrorKind, Result};
use std::fs::Metadata;
use std::path::Path;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    /// File size in bytes
    pub size: u64,
    /// Last modified, in milliseconds since the Unix epoch
    pub last_modified: u64,
}
impl FileStat {
    pub fn of(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path).map_err(|e| ErrorKind::io(e, path))?;
        Self::from_metadata(path, &metadata)
    }

    pub fn from_metadata(path: &Path, metadata: &Metadata) -> Result<Self> {
        let modified: OffsetDateTime = metadata.modified().map_err(|e| ErrorKind::io(e, path))?.into();
        Ok(Self { size: metadata.len(), last_modified: unix_millis(modified) })
    }
}

/// Milliseconds since the Unix epoch; timestamps before 1970 clamp to zero.
#[must_use]
pub fn unix_millis(at: OffsetDateTime) -> u64 {
    u64::try_from(at.unix_timestamp_nanos() / 1_000_000).unwrap_or(0)
}
