use hoard_storage::ContentHash;

/// The persisted state of one virtual file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Full virtual file key, segments joined by `|`.
    pub key: String,
    /// Content hash, if the file has been analyzed.
    pub hash: Option<ContentHash>,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time in unix milliseconds.
    pub last_modified: u64,
    /// Whether the file (and, for archives, its whole subtree) was fully indexed.
    pub finished_indexing: bool,
}
