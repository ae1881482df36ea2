//! A content-addressable index of every file reachable from a set of roots,
//! including files nested arbitrarily deep inside archives.
//!
//! # Architecture
//! - [`VirtualFile`]: one file, on disk or inside archives, identified by a
//!   `|`-separated key such as `/mods/pack.zip|inner.zip|readme.txt`.
//! - [`IndexStore`]: every known file by key and by content hash, persisted
//!   to a cache file that is replaced atomically and rebuilt if corrupt.
//! - [`Indexer`]: walks roots, hashes new or changed files, and recurses
//!   into archives.
//! - [`Stager`]: extracts nested files to scratch space on demand, cleaned
//!   up when the returned guard is dropped.
//! - [`Vfs`]: owns all of the above plus the scratch root and worker pool.

mod context;
pub mod error;
mod file;
mod index;
mod pool;
mod scan;
mod stage;

pub use crate::context::Vfs;
pub use crate::file::{Analysis, VirtualFile};
pub use crate::index::IndexStore;
pub use crate::pool::WorkerPool;
pub use crate::scan::{IndexFailure, IndexReport, Indexer};
pub use crate::stage::{StagedFiles, Stager, StagingHandle};
pub use hoard_storage::{ContentHash, KEY_SEPARATOR};
