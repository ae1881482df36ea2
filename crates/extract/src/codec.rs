use std::fmt;
use std::io::{self, Read};

/// Single-stream compression formats.
///
/// Each one wraps exactly one file, so the "archive" has exactly one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    Gzip,
    Bzip2,
    #[cfg(feature = "xz")]
    Xz,
    #[cfg(feature = "zstd")]
    Zstd,
}

impl Codec {
    /// Every codec compiled into this build.
    pub const ALL: &[Codec] = &[
        Codec::Gzip,
        Codec::Bzip2,
        #[cfg(feature = "xz")]
        Codec::Xz,
        #[cfg(feature = "zstd")]
        Codec::Zstd,
    ];

    /// Lower-case file extension (without dot) for this codec.
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            Codec::Gzip => "gz",
            Codec::Bzip2 => "bz2",
            #[cfg(feature = "xz")]
            Codec::Xz => "xz",
            #[cfg(feature = "zstd")]
            Codec::Zstd => "zst",
        }
    }

    /// Detect a codec from an extension, case-insensitively and with or
    /// without a leading dot.
    #[must_use]
    pub fn from_extension(extension: &str) -> Option<Self> {
        let extension = extension.strip_prefix('.').unwrap_or(extension);
        Self::ALL.iter().copied().find(|codec| codec.extension().eq_ignore_ascii_case(extension))
    }

    /// Wrap a reader of compressed bytes in the matching decoder.
    pub fn decoder<'r, R: Read + 'r>(&self, reader: R) -> io::Result<Box<dyn Read + 'r>> {
        Ok(match self {
            Codec::Gzip => Box::new(flate2::read::MultiGzDecoder::new(reader)),
            Codec::Bzip2 => Box::new(bzip2::read::MultiBzDecoder::new(reader)),
            #[cfg(feature = "xz")]
            Codec::Xz => Box::new(xz2::read::XzDecoder::new_multi_decoder(reader)),
            #[cfg(feature = "zstd")]
            Codec::Zstd => Box::new(zstd::stream::read::Decoder::new(reader)?),
        })
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Codec::Gzip => "gzip",
            Codec::Bzip2 => "bzip2",
            #[cfg(feature = "xz")]
            Codec::Xz => "xz",
            #[cfg(feature = "zstd")]
            Codec::Zstd => "zstd",
        };
        f.write_str(name)
    }
}
