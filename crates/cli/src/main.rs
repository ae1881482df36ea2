//! `hoard`: index directories of archives and find files inside them by
//! content hash.
//!
//! ```bash
//! hoard index ~/mods           # discover everything, nested archives included
//! hoard lookup ~/mods/pack.zip # one indexed file
//! hoard resolve <HASH> inner.zip b.txt
//! hoard list ~/mods/pack.zip   # everything indexed inside an archive
//! hoard entries ~/mods/pack.zip
//! hoard clean                  # drop stale entries and save
//! hoard stats
//! ```
//!
//! Logging goes to stderr and honours `RUST_LOG` (default `info`).

mod commands;
mod error;

use crate::error::{ErrorKind, Result};
use clap::{Parser, Subcommand};
use exn::ResultExt;
use hoard_config::Config;
use hoard_extract::Formats;
use hoard_vfs::Vfs;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(name = "hoard", version, about = "Content-addressable index of files and nested archives")]
struct Cli {
    /// Configuration file, layered over `hoard.toml` and under `HOARD_*` variables
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Bring the index up to date with one or more directories
    Index {
        /// Directories to index; the configured roots when omitted
        roots: Vec<PathBuf>,
    },
    /// Show one indexed file
    Lookup { key: String },
    /// Find a file by the content hash of its outermost archive and the
    /// entry names leading down to it
    Resolve {
        hash: String,
        segments: Vec<String>,
    },
    /// List everything indexed inside an archive
    List { archive: String },
    /// List the entry names an archive holds, read straight from the archive
    Entries { archive: String },
    /// Remove stale entries and save the index
    Clean,
    /// Summarize the index
    Stats,
}

fn main() -> ExitCode {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(err.exit_code())
        },
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    let vfs = Vfs::open(&config, Formats::handle()).or_raise(|| ErrorKind::Open)?;
    let mut out = std::io::stdout().lock();

    match cli.command {
        Command::Index { roots } => {
            let roots = if roots.is_empty() { config.roots.clone() } else { roots };
            commands::index(&vfs, &roots, &mut out)?;
        },
        Command::Lookup { key } => commands::lookup(&vfs, &key, &mut out)?,
        Command::Resolve { hash, segments } => commands::resolve(&vfs, hash, segments, &mut out)?,
        Command::List { archive } => commands::list(&vfs, &archive, &mut out)?,
        Command::Entries { archive } => commands::entries(&vfs, &archive, &mut out)?,
        Command::Clean => commands::clean(&vfs, &mut out)?,
        Command::Stats => commands::stats(&vfs, &mut out)?,
    }

    vfs.close().or_raise(|| ErrorKind::Command)
}
