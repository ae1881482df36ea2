//! Binary cache file for the virtual file index.
//!
//! The cache is not the source of truth; the files on disk are. It exists so
//! that a restart does not have to re-hash and re-extract every archive. If
//! the file is deleted or corrupted it is simply rebuilt by re-indexing.
//!
//! # Format
//! All integers are little-endian.
//! - 8 bytes magic `HOARDVFS`
//! - `u64` format version (currently `1`)
//! - `u64` record count, followed by that many [`Record`]s:
//!   - `u32` length + UTF-8 key
//!   - `u32` length + hex content hash (length `0` when not yet hashed)
//!   - `i64` size in bytes
//!   - `u64` last modified, unix milliseconds
//!   - `u8` finished-indexing flag (`0` or `1`)
//!
//! Anything else, including trailing bytes after the last record, is corrupt.

mod codec;
pub mod error;
mod file;
mod record;

pub use crate::codec::{FORMAT_VERSION, MAGIC, decode, encode};
pub use crate::file::CacheFile;
pub use crate::record::Record;
