//! Content hashing.

use crate::error::{Error, ErrorKind, Result};
use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::str::FromStr;
use tracing::instrument;

/// BLAKE3 digest of a file's bytes.
///
/// Displayed (and persisted) as 64 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash([u8; blake3::OUT_LEN]);

impl ContentHash {
    #[must_use]
    pub const fn from_bytes(bytes: [u8; blake3::OUT_LEN]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; blake3::OUT_LEN] {
        &self.0
    }

    /// Hash an in-memory buffer.
    #[must_use]
    pub fn of(bytes: impl AsRef<[u8]>) -> Self {
        Self(*blake3::hash(bytes.as_ref()).as_bytes())
    }
}
impl From<blake3::Hash> for ContentHash {
    fn from(hash: blake3::Hash) -> Self {
        Self(*hash.as_bytes())
    }
}
impl Display for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", blake3::Hash::from(self.0).to_hex())
    }
}
impl Debug for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "ContentHash({self})")
    }
}
impl FromStr for ContentHash {
    type Err = Error;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match blake3::Hash::from_hex(s) {
            Ok(hash) => Ok(hash.into()),
            Err(_) => exn::bail!(ErrorKind::InvalidHash(s.to_string())),
        }
    }
}

/// Stream a file through BLAKE3 without loading it into memory.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn hash_file(path: impl AsRef<Path>) -> Result<ContentHash> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| ErrorKind::io(e, path))?;
    let mut hasher = blake3::Hasher::new();
    std::io::copy(&mut BufReader::new(file), &mut hasher).map_err(|e| ErrorKind::io(e, path))?;
    Ok(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_hash_file_matches_in_memory_hash() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"the quick brown fox").unwrap();
        file.flush().unwrap();
        assert_eq!(hash_file(file.path()).unwrap(), ContentHash::of(b"the quick brown fox"));
    }

    #[test]
    fn test_hash_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = hash_file(dir.path().join("missing.bin")).unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[test]
    fn test_display_and_parse() {
        let hash = ContentHash::of(b"");
        let hex = hash.to_string();
        assert_eq!(hex, "af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262");
        assert_eq!(hex.parse::<ContentHash>().unwrap(), hash);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("not a hash".parse::<ContentHash>().is_err());
        assert!("abcd".parse::<ContentHash>().is_err());
    }
}
