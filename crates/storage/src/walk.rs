use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Every regular file under `root`, recursively, in a stable (file name) order.
///
/// Symlinks are not followed and are not reported.
pub fn files(root: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let root = root.as_ref();
    let mut found = Vec::new();
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry.or_raise(|| ErrorKind::Walk(root.to_path_buf()))?;
        if entry.file_type().is_file() {
            found.push(entry.into_path());
        }
    }
    Ok(found)
}
