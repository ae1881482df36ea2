//! Filesystem primitives shared by the indexer, the cache and the extractors.
//!
//! Nothing in here knows about virtual files or archives: it hashes bytes,
//! stats files, walks directories, validates archive entry names and owns the
//! scratch directory tree that staged content is written into.

pub mod error;
mod hash;
mod path;
mod remove;
mod scratch;
mod stat;
mod walk;

pub use crate::hash::{ContentHash, hash_file};
pub use crate::path::{KEY_SEPARATOR, entry_segment, validate as validate_entry};
pub use crate::remove::delete_directory_recursive;
pub use crate::scratch::{ScratchDir, ScratchRoot};
pub use crate::stat::{FileStat, unix_millis};
pub use crate::walk::files;
