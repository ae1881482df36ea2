//! Configuration for the virtual file index.
//!
//! Values are merged from, lowest priority first:
//! 1. Built-in defaults
//! 2. `hoard.toml` in the platform config directory, if present
//! 3. An explicitly passed file (must exist)
//! 4. `HOARD_*` environment variables (`HOARD_CACHE_FILE`, `HOARD_WORKERS`, ...)

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "hoard.toml";
pub const ENV_PREFIX: &str = "HOARD_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the index is persisted between runs.
    pub cache_file: PathBuf,
    /// Scratch space for extracted archives. Wiped on every start.
    pub staging_dir: PathBuf,
    /// Worker threads for hashing and extraction. Defaults to one per core.
    pub workers: Option<NonZeroUsize>,
    /// Whether changes are written back to `cache_file`.
    pub persist: bool,
    /// Roots indexed when none are given on the command line.
    pub roots: Vec<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_file: PathBuf::from("vfs_cache.bin"),
            staging_dir: PathBuf::from("vfs_staging"),
            workers: None,
            persist: true,
            roots: Vec::new(),
        }
    }
}

impl Config {
    /// Load the merged configuration.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(discovered) = Self::discover().filter(|path| path.is_file()) {
            tracing::debug!(path = %discovered.display(), "using discovered config file");
            figment = figment.merge(Toml::file(discovered));
        }
        if let Some(path) = explicit {
            if !path.is_file() {
                exn::bail!(ErrorKind::MissingFile(path.to_path_buf()));
            }
            figment = figment.merge(Toml::file(path));
        }
        Self::extract(figment.merge(Env::prefixed(ENV_PREFIX)))
    }

    /// Load from a single TOML file on top of the defaults, ignoring the
    /// environment and platform config directory.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            exn::bail!(ErrorKind::MissingFile(path.to_path_buf()));
        }
        Self::extract(Figment::from(Serialized::defaults(Config::default())).merge(Toml::file(path)))
    }

    /// Path of `hoard.toml` in the platform config directory.
    pub fn discover() -> Option<PathBuf> {
        ProjectDirs::from("", "", "hoard").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    fn extract(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.cache_file.as_os_str().is_empty() {
            exn::bail!(ErrorKind::Invalid("cache_file must not be empty"));
        }
        if self.staging_dir.as_os_str().is_empty() {
            exn::bail!(ErrorKind::Invalid("staging_dir must not be empty"));
        }
        Ok(())
    }

    /// Worker count to use, falling back to the available parallelism.
    pub fn worker_count(&self) -> NonZeroUsize {
        self.workers
            .or_else(|| std::thread::available_parallelism().ok())
            .unwrap_or(NonZeroUsize::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.cache_file, Path::new("vfs_cache.bin"));
        assert_eq!(config.staging_dir, Path::new("vfs_staging"));
        assert!(config.persist);
        assert!(config.worker_count().get() >= 1);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "cache_file = \"/var/cache/hoard.bin\"\nworkers = 3\nroots = [\"/games/mods\"]\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.cache_file, Path::new("/var/cache/hoard.bin"));
        assert_eq!(config.staging_dir, Path::new("vfs_staging"));
        assert_eq!(config.workers, NonZeroUsize::new(3));
        assert_eq!(config.worker_count().get(), 3);
        assert_eq!(config.roots, vec![PathBuf::from("/games/mods")]);
    }

    #[test]
    fn test_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::from_file(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(&*err, ErrorKind::MissingFile(_)));
    }

    #[rstest]
    #[case("workers = 0\n")]
    #[case("workers = \"many\"\n")]
    #[case("persist = \"yes please\"\n")]
    fn test_bad_values_fail_to_load(#[case] contents: &str) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, contents).unwrap();
        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Load));
    }

    #[test]
    fn test_empty_staging_dir_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "staging_dir = \"\"\n").unwrap();
        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(_)));
    }
}
