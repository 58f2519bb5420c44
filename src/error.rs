use std::path::PathBuf;
use thiserror::Error;

/// A stored value's bytes did not decode to a valid record.
#[derive(Debug, Error)]
#[error("not a valid record encoding: {0}")]
pub struct DecodeError(#[from] bincode::Error);

/// Errors produced by the store, the bulk loader and the suggestion engine.
///
/// Row- or entry-local failures (a malformed CSV row, an undecodable value
/// met during a scan) are logged and skipped by their callers and never show
/// up here; everything in this enum terminates the operation it came from.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open store at '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: sled::Error,
    },

    /// Read-only open of a path with no store behind it. Read-only handles
    /// never create the store on disk.
    #[error("no store at '{0}'")]
    MissingStore(PathBuf),

    /// The named bucket does not exist. Only reachable in read-only mode;
    /// read-write opens create the bucket.
    #[error("bucket '{0}' not found")]
    BucketNotFound(String),

    /// A write was attempted through a read-only handle.
    #[error("store was opened read-only")]
    ReadOnly,

    /// The handle was closed (explicitly or by compaction) and must be
    /// re-opened before further use.
    #[error("store handle is closed")]
    Closed,

    /// The value stored under the exact requested key is corrupt. During
    /// scans a corrupt entry is skipped instead.
    #[error("failed to decode record for key '{key}': {source}")]
    Decode {
        key: String,
        #[source]
        source: DecodeError,
    },

    #[error("failed to encode record: {0}")]
    Encode(#[source] bincode::Error),

    /// Bulk input is structurally unusable (missing header, zero columns).
    #[error("invalid bulk input: {0}")]
    Format(String),

    /// The engine failed to commit a batch. Nothing from the batch is
    /// visible.
    #[error("batch write failed: {0}")]
    Transaction(#[source] sled::Error),

    /// Compaction failed before the original store was touched. The
    /// original is intact and the temp copy has been cleaned up.
    #[error("compaction failed, original store left untouched: {0}")]
    Compaction(String),

    /// Compaction failed after the original store was removed. The
    /// compacted copy still exists at `temp_path`; renaming it into place
    /// by hand recovers the data.
    #[error(
        "compaction failed after removing the original store; compacted data \
         remains at '{temp_path}', manual recovery needed: {reason}"
    )]
    CompactionRecovery { temp_path: PathBuf, reason: String },

    #[error("storage engine error: {0}")]
    Engine(#[from] sled::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
