use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use hoard_vfs::{VirtualFile, Vfs};
use std::collections::HashSet;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

pub fn index(vfs: &Vfs, roots: &[PathBuf], out: &mut impl Write) -> Result<()> {
    if roots.is_empty() {
        exn::bail!(ErrorKind::NoRoots);
    }
    let report = vfs.index_roots(roots).or_raise(|| ErrorKind::Command)?;
    for failure in &report.failures {
        writeln!(out, "failed\t{}\t{}", failure.path.display(), *failure.error).or_raise(|| ErrorKind::Command)?;
    }
    writeln!(out, "indexed {} file(s), {} entries in total", report.files, vfs.store().len())
        .or_raise(|| ErrorKind::Command)?;
    match report.failures.first() {
        Some(first) => exn::bail!(ErrorKind::Incomplete(report.failures.len(), first.path.clone())),
        None => Ok(()),
    }
}

pub fn lookup(vfs: &Vfs, key: &str, out: &mut impl Write) -> Result<()> {
    let file = find(vfs, key)?;
    describe(vfs, &file, out)
}

pub fn resolve(vfs: &Vfs, hash: String, segments: Vec<String>, out: &mut impl Write) -> Result<()> {
    let mut hash_path = Vec::with_capacity(segments.len() + 1);
    hash_path.push(hash);
    hash_path.extend(segments);
    let file = vfs.file_for_hash_path(&hash_path).or_raise(|| ErrorKind::Command)?;
    describe(vfs, &file, out)
}

pub fn list(vfs: &Vfs, archive: &str, out: &mut impl Write) -> Result<()> {
    let archive = find_archive(vfs, archive)?;
    for file in vfs.files_in_archive(&archive) {
        writeln!(out, "{}\t{}", file.size(), file.key()).or_raise(|| ErrorKind::Command)?;
    }
    Ok(())
}

pub fn entries(vfs: &Vfs, archive: &str, out: &mut impl Write) -> Result<()> {
    let archive = find_archive(vfs, archive)?;
    let staging = vfs.stage(std::slice::from_ref(&archive)).or_raise(|| ErrorKind::Command)?;
    let names = vfs.entry_names(&archive).or_raise(|| ErrorKind::Command)?;
    drop(staging);
    for name in names {
        writeln!(out, "{name}").or_raise(|| ErrorKind::Command)?;
    }
    Ok(())
}

pub fn clean(vfs: &Vfs, out: &mut impl Write) -> Result<()> {
    let removed = vfs.store().clean_orphans();
    vfs.store().save().or_raise(|| ErrorKind::Command)?;
    writeln!(out, "removed {removed} stale entries").or_raise(|| ErrorKind::Command)
}

pub fn stats(vfs: &Vfs, out: &mut impl Write) -> Result<()> {
    let stats = Stats::collect(&vfs.store().entities());
    writeln!(out, "files\t{}", stats.files).or_raise(|| ErrorKind::Command)?;
    writeln!(out, "on disk\t{}", stats.concrete).or_raise(|| ErrorKind::Command)?;
    writeln!(out, "archives\t{}", stats.archives).or_raise(|| ErrorKind::Command)?;
    writeln!(out, "unfinished archives\t{}", stats.unfinished).or_raise(|| ErrorKind::Command)?;
    writeln!(out, "distinct hashes\t{}", stats.distinct_hashes).or_raise(|| ErrorKind::Command)?;
    writeln!(out, "deepest nesting\t{}", stats.max_depth).or_raise(|| ErrorKind::Command)?;
    writeln!(out, "bytes on disk\t{}", stats.concrete_bytes).or_raise(|| ErrorKind::Command)
}

fn find(vfs: &Vfs, key: &str) -> Result<Arc<VirtualFile>> {
    vfs.lookup(key).ok_or_raise(|| ErrorKind::UnknownKey(key.to_string()))
}

fn find_archive(vfs: &Vfs, key: &str) -> Result<Arc<VirtualFile>> {
    let file = find(vfs, key)?;
    if !file.is_archive() {
        exn::bail!(ErrorKind::NotAnArchive(key.to_string()));
    }
    Ok(file)
}

fn describe(vfs: &Vfs, file: &VirtualFile, out: &mut impl Write) -> Result<()> {
    let hash = file.hash().map(|hash| hash.to_string()).unwrap_or_default();
    writeln!(out, "key\t{}", file.key()).or_raise(|| ErrorKind::Command)?;
    writeln!(out, "hash\t{hash}").or_raise(|| ErrorKind::Command)?;
    writeln!(out, "size\t{}", file.size()).or_raise(|| ErrorKind::Command)?;
    writeln!(out, "modified\t{}", file.last_modified()).or_raise(|| ErrorKind::Command)?;
    if file.is_archive() {
        writeln!(out, "finished\t{}", file.finished_indexing()).or_raise(|| ErrorKind::Command)?;
    }
    // Concrete files are addressed by their key alone.
    if !file.is_concrete()
        && let Ok(hash_path) = vfs.store().hash_path(file)
    {
        writeln!(out, "hash path\t{}", hash_path.join(" ")).or_raise(|| ErrorKind::Command)?;
    }
    Ok(())
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Stats {
    files: usize,
    concrete: usize,
    concrete_bytes: u64,
    archives: usize,
    unfinished: usize,
    distinct_hashes: usize,
    max_depth: usize,
}

impl Stats {
    fn collect(files: &[Arc<VirtualFile>]) -> Self {
        let mut stats = Stats { files: files.len(), ..Stats::default() };
        let mut hashes = HashSet::new();
        for file in files {
            if file.is_concrete() {
                stats.concrete += 1;
                stats.concrete_bytes += file.size();
            }
            if file.is_archive() {
                stats.archives += 1;
                if !file.finished_indexing() {
                    stats.unfinished += 1;
                }
            }
            if let Some(hash) = file.hash() {
                hashes.insert(hash);
            }
            stats.max_depth = stats.max_depth.max(file.depth());
        }
        stats.distinct_hashes = hashes.len();
        stats
    }
}
