use crate::Extractor;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::instrument;
use zip::ZipArchive;

/// Extracts `.zip` archives.
///
/// Entry names are validated before anything is written, so an archive can
/// never place a file outside the destination directory. Entries with names
/// that can't be used (escaping paths, key separators) are skipped with a
/// warning, as are later entries that land on an already extracted path.
/// Directory entries are skipped; their files create them as needed.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipExtractor;

impl ZipExtractor {
    fn open(archive: &Path) -> Result<ZipArchive<BufReader<File>>> {
        let file = File::open(archive).or_raise(|| ErrorKind::Io(archive.to_path_buf()))?;
        ZipArchive::new(BufReader::new(file)).or_raise(|| ErrorKind::InvalidArchive(archive.to_path_buf()))
    }
}

impl Extractor for ZipExtractor {
    fn can_extract(&self, extension: &str) -> bool {
        extension.strip_prefix('.').unwrap_or(extension).eq_ignore_ascii_case("zip")
    }

    #[instrument(level = "debug", skip(self), fields(archive = %archive.display()))]
    fn extract_all(&self, archive: &Path, destination: &Path) -> Result<()> {
        let mut zip = Self::open(archive)?;
        let invalid = || ErrorKind::InvalidArchive(archive.to_path_buf());
        let mut written = 0usize;
        let mut skipped = 0usize;
        for index in 0..zip.len() {
            let mut entry = zip.by_index(index).or_raise(invalid)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            let relative = match hoard_storage::validate_entry(&name) {
                Ok(relative) => relative,
                Err(err) => {
                    tracing::warn!(entry = %name, error = ?err, "skipping unusable archive entry");
                    skipped += 1;
                    continue;
                },
            };
            let target = destination.join(relative);
            if target.exists() {
                tracing::warn!(entry = %name, path = %target.display(), "skipping entry that duplicates an earlier one");
                skipped += 1;
                continue;
            }
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).or_raise(|| ErrorKind::Io(parent.to_path_buf()))?;
            }
            let mut output = BufWriter::new(File::create(&target).or_raise(|| ErrorKind::Io(target.clone()))?);
            io::copy(&mut entry, &mut output).or_raise(invalid)?;
            output.flush().or_raise(|| ErrorKind::Io(target.clone()))?;
            written += 1;
        }
        tracing::debug!(entries = written, skipped, "extracted zip archive");
        Ok(())
    }

    fn list_entry_names(&self, archive: &Path) -> Result<Vec<String>> {
        let mut zip = Self::open(archive)?;
        let mut names = Vec::with_capacity(zip.len());
        for index in 0..zip.len() {
            let entry = zip.by_index(index).or_raise(|| ErrorKind::InvalidArchive(archive.to_path_buf()))?;
            if !entry.is_dir() {
                names.push(entry.name().replace('\\', "/"));
            }
        }
        Ok(names)
    }
}
