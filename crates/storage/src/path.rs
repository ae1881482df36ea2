//! Archive entry name validation.
//!
//! Entry names come from inside archives, which means they come from whoever
//! built the archive. Before anything gets written to disk under an entry's
//! name it has to be proven to stay inside the destination directory, and it
//! must not contain the `|` separator used to build virtual file keys.

use crate::error::{ErrorKind, Result};
use exn::OptionExt;
use std::path::{Component, Path, PathBuf};

/// Separator between the segments of a virtual file key.
pub const KEY_SEPARATOR: char = '|';

/// Validates an archive entry name, returning the normalized relative path
/// it should be extracted to.
///
/// Backslashes are treated as separators (archives built on Windows use them),
/// leading slashes are dropped, and `..` is allowed only while it stays inside
/// the destination.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use hoard_storage::validate_entry;
/// assert_eq!(validate_entry("textures/sky.dds").unwrap(), Path::new("textures/sky.dds"));
/// assert_eq!(validate_entry("meshes\\armor.nif").unwrap(), Path::new("meshes/armor.nif"));
/// assert_eq!(validate_entry("/abs/file.esp").unwrap(), Path::new("abs/file.esp"));
/// assert!(validate_entry("../escape.txt").is_err());
/// assert!(validate_entry("a|b.txt").is_err());
/// ```
pub fn validate(name: impl AsRef<str>) -> Result<PathBuf> {
    let original = name.as_ref();
    let invalid = || ErrorKind::InvalidPath(PathBuf::from(original));
    if original.contains(KEY_SEPARATOR) || original.contains('\0') {
        exn::bail!(invalid());
    }
    let normalized = original.replace('\\', "/");
    let mut components = Vec::new();
    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(s) => components.push(s),
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(invalid()),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(invalid());
                }
            },
        }
    }
    match components.is_empty() {
        true => exn::bail!(invalid()),
        false => Ok(components.into_iter().collect()),
    }
}

/// Turns a path relative to an extraction directory into a single key segment,
/// always joined with forward slashes regardless of platform.
pub fn entry_segment(relative: impl AsRef<Path>) -> Result<String> {
    let relative = relative.as_ref();
    let invalid = || ErrorKind::InvalidPath(relative.to_path_buf());
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(s) => parts.push(s.to_str().ok_or_raise(invalid)?),
            Component::CurDir => {},
            _ => exn::bail!(invalid()),
        }
    }
    let segment = parts.join("/");
    if segment.is_empty() || segment.contains(KEY_SEPARATOR) {
        exn::bail!(invalid());
    }
    Ok(segment)
}
