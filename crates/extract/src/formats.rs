use crate::error::{ErrorKind, Result};
use crate::{Extractor, ExtractorHandle, SingleStreamExtractor, ZipExtractor, extension_of};
use exn::OptionExt;
use std::path::Path;
use std::sync::Arc;

/// Dispatches to whichever extractor handles a file's extension.
pub struct Formats {
    extractors: Vec<Box<dyn Extractor + Send + Sync>>,
}

impl Default for Formats {
    fn default() -> Self {
        Self {
            extractors: vec![Box::new(ZipExtractor), Box::new(SingleStreamExtractor)],
        }
    }
}

impl Formats {
    /// Wraps the default set of formats in a shareable handle.
    #[must_use]
    pub fn handle() -> ExtractorHandle {
        Arc::new(Self::default())
    }

    fn for_archive(&self, archive: &Path) -> Result<&(dyn Extractor + Send + Sync)> {
        let extension = extension_of(archive).unwrap_or_default();
        self.extractors
            .iter()
            .find(|extractor| extractor.can_extract(&extension))
            .map(|extractor| extractor.as_ref())
            .ok_or_raise(|| ErrorKind::UnsupportedFormat(extension))
    }
}

impl Extractor for Formats {
    fn can_extract(&self, extension: &str) -> bool {
        self.extractors.iter().any(|extractor| extractor.can_extract(extension))
    }

    fn extract_all(&self, archive: &Path, destination: &Path) -> Result<()> {
        self.for_archive(archive)?.extract_all(archive, destination)
    }

    fn list_entry_names(&self, archive: &Path) -> Result<Vec<String>> {
        self.for_archive(archive)?.list_entry_names(archive)
    }
}
