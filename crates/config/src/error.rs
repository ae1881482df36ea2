//! Config Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration loading.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The merged configuration could not be read or does not fit the schema.
    #[display("failed to load configuration")]
    Load,
    /// An explicitly requested config file does not exist.
    #[display("config file not found: {}", _0.display())]
    MissingFile(#[error(not(source))] PathBuf),
    /// A value is present but unusable.
    #[display("invalid configuration: {_0}")]
    Invalid(#[error(not(source))] &'static str),
}
