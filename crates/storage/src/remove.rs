use crate::error::{ErrorKind, Result};
use std::path::Path;
use std::time::Duration;
use tracing::instrument;
use walkdir::WalkDir;

const MAX_ATTEMPTS: u32 = 5;
const BACKOFF: Duration = Duration::from_millis(25);

/// Forcefully remove a directory tree, retrying when something (an antivirus
/// scanner, a lingering handle from an extractor process) still has a file open.
///
/// Read-only flags are cleared between attempts. A directory that doesn't
/// exist counts as removed.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn delete_directory_recursive(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let mut attempt = 1;
    loop {
        match std::fs::remove_dir_all(path) {
            Ok(()) => return Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) if attempt >= MAX_ATTEMPTS => exn::bail!(ErrorKind::io(err, path)),
            Err(err) => {
                tracing::debug!(error = %err, attempt, "directory removal failed, retrying");
                clear_readonly(path);
                std::thread::sleep(BACKOFF * attempt);
                attempt += 1;
            },
        }
    }
}

fn clear_readonly(root: &Path) {
    for entry in WalkDir::new(root).into_iter().filter_map(|entry| entry.ok()) {
        let Ok(metadata) = entry.metadata() else { continue };
        let mut permissions = metadata.permissions();
        if permissions.readonly() {
            #[allow(clippy::permissions_set_readonly_false)]
            permissions.set_readonly(false);
            _ = std::fs::set_permissions(entry.path(), permissions);
        }
    }
}
