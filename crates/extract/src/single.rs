use crate::codec::Codec;
use crate::error::{ErrorKind, Result};
use crate::{Extractor, extension_of};
use exn::{OptionExt, ResultExt};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::instrument;

/// Extracts single-stream compressed files (`save.ess.gz`, `notes.txt.bz2`).
///
/// The only entry is the archive's own file name with the compression suffix
/// stripped, so `save.ess.gz` holds `save.ess`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SingleStreamExtractor;

impl SingleStreamExtractor {
    fn codec_for(archive: &Path) -> Result<Codec> {
        let extension = extension_of(archive).unwrap_or_default();
        Codec::from_extension(&extension).ok_or_raise(|| ErrorKind::UnsupportedFormat(extension))
    }

    fn entry_name(archive: &Path) -> Result<String> {
        archive
            .file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| !stem.is_empty())
            .map(str::to_string)
            .ok_or_raise(|| ErrorKind::InvalidArchive(archive.to_path_buf()))
    }
}

impl Extractor for SingleStreamExtractor {
    fn can_extract(&self, extension: &str) -> bool {
        Codec::from_extension(extension).is_some()
    }

    #[instrument(level = "debug", skip(self), fields(archive = %archive.display()))]
    fn extract_all(&self, archive: &Path, destination: &Path) -> Result<()> {
        let codec = Self::codec_for(archive)?;
        let name = Self::entry_name(archive)?;
        let relative = hoard_storage::validate_entry(&name).or_raise(|| ErrorKind::UnsafeEntry(name.clone()))?;
        let target = destination.join(relative);

        let io_error = || ErrorKind::Io(archive.to_path_buf());
        let input = File::open(archive).or_raise(io_error)?;
        let mut decoder = codec.decoder(BufReader::new(input)).or_raise(|| ErrorKind::InvalidArchive(archive.to_path_buf()))?;

        fs::create_dir_all(destination).or_raise(|| ErrorKind::Io(destination.to_path_buf()))?;
        let mut output = BufWriter::new(File::create(&target).or_raise(|| ErrorKind::Io(target.clone()))?);
        // Decoder failures surface as read errors; the input is bad, not the disk.
        io::copy(&mut decoder, &mut output).or_raise(|| ErrorKind::InvalidArchive(archive.to_path_buf()))?;
        output.flush().or_raise(|| ErrorKind::Io(target.clone()))?;
        tracing::debug!(%codec, entry = %name, "decompressed single-stream archive");
        Ok(())
    }

    fn list_entry_names(&self, archive: &Path) -> Result<Vec<String>> {
        Self::codec_for(archive)?;
        Ok(vec![Self::entry_name(archive)?])
    }
}
