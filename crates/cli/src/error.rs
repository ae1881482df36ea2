//! CLI Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("could not open the index")]
    Open,
    /// Pass a root or set `roots` in the configuration.
    #[display("no roots given and none configured")]
    NoRoots,
    #[display("no indexed file with key: {_0}")]
    UnknownKey(#[error(not(source))] String),
    #[display("not an archive: {_0}")]
    NotAnArchive(#[error(not(source))] String),
    #[display("command failed")]
    Command,
    /// Some files were skipped. Everything else was indexed and saved.
    #[display("{_0} file(s) could not be indexed, first was {}", _1.display())]
    Incomplete(#[error(not(source))] usize, #[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Process exit code for this kind of failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            ErrorKind::Config | ErrorKind::NoRoots => 2,
            ErrorKind::Incomplete(..) => 3,
            _ => 1,
        }
    }
}
