//! Archive extraction, as far as the virtual file index is concerned.
//!
//! The index never looks inside an archive itself. It asks an [`Extractor`]
//! three things: is this extension an archive, what entries does it hold, and
//! please write all of them into a directory. [`Formats`] answers for every
//! container this crate understands:
//!
//! - **Zip** archives (`.zip`), via [`ZipExtractor`].
//! - **Single-stream** compressed files (`.gz`, `.bz2`, and `.xz`/`.zst` behind
//!   the `xz`/`zstd` features), via [`SingleStreamExtractor`]. These hold
//!   exactly one entry named after the file with its suffix removed.

mod codec;
pub mod error;
mod formats;
mod single;
mod zipped;

pub use crate::codec::Codec;
pub use crate::formats::Formats;
pub use crate::single::SingleStreamExtractor;
pub use crate::zipped::ZipExtractor;
use crate::error::Result;
use std::path::Path;
use std::sync::Arc;

/// Shared, thread-safe extractor used by the index, the indexer and the stager.
pub type ExtractorHandle = Arc<dyn Extractor + Send + Sync>;

/// The capability of looking inside archive containers.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use hoard_extract::{Extractor, Formats};
///
/// let formats = Formats::default();
/// assert!(formats.can_extract("zip"));
/// assert!(!formats.can_extract("esp"));
/// formats.extract_all(Path::new("mods/pack.zip"), Path::new("/tmp/pack")).unwrap();
/// ```
pub trait Extractor {
    /// Whether files with this extension (no leading dot, any case) are
    /// containers this extractor can open.
    fn can_extract(&self, extension: &str) -> bool;

    /// Write every entry of `archive` into `destination`, preserving the
    /// entry's relative path.
    fn extract_all(&self, archive: &Path, destination: &Path) -> Result<()>;

    /// Entry names (forward-slash separated) without extracting anything.
    fn list_entry_names(&self, archive: &Path) -> Result<Vec<String>>;
}

/// Lower-cased extension of a path or entry name, without its leading dot.
#[must_use]
pub fn extension_of(name: impl AsRef<Path>) -> Option<String> {
    name.as_ref().extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase)
}
