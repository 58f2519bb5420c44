use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::codec::{self, Record};
use crate::error::StoreError;

pub const DEFAULT_STORE_NAME: &str = "lexstore.db";
pub const DEFAULT_TEMP_SUFFIX: &str = ".tmp";
pub const DEFAULT_BUCKET: &str = "entries";

/// Lowercase normalization applied to every key on write and on read, so
/// that differently-cased inputs resolve to the same entry.
pub(crate) fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

/// Configuration for opening a [`DbStore`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub bucket: String,
    pub read_only: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_STORE_NAME),
            bucket: DEFAULT_BUCKET.to_string(),
            read_only: false,
        }
    }
}

impl StoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}

/// Writes staged inside one atomic batch. Handed to the closure passed to
/// [`DbStore::run_batch`]; keys are normalized and records encoded as they
/// are staged.
#[derive(Default)]
pub struct StoreBatch {
    inner: sled::Batch,
    staged: usize,
}

impl StoreBatch {
    /// Stage one normalized key/record pair. Fails only if the record does
    /// not encode, which leaves the batch otherwise intact.
    pub fn put(&mut self, key: &str, record: &Record) -> Result<(), StoreError> {
        let bytes = codec::encode(record)?;
        self.inner.insert(normalize_key(key).into_bytes(), bytes);
        self.staged += 1;
        Ok(())
    }

    /// Number of writes staged so far.
    pub fn staged(&self) -> usize {
        self.staged
    }
}

/// Adapter over the embedded key-value engine. One named bucket holds all
/// headword -> encoded-record pairs.
///
/// Read-only handles never create the store or the bucket and refuse every
/// write with [`StoreError::ReadOnly`]; the engine itself is opened the
/// same way in both modes.
#[derive(Debug)]
pub struct DbStore {
    db: Option<sled::Db>,
    tree: Option<sled::Tree>,
    path: PathBuf,
    bucket: String,
    read_only: bool,
}

impl DbStore {
    /// Open or create the backing store.
    ///
    /// In read-write mode the bucket is created if missing. In read-only
    /// mode nothing is ever created: a missing store path fails the open
    /// with [`StoreError::MissingStore`], and a missing bucket is not an
    /// open-time error but fails each operation with
    /// [`StoreError::BucketNotFound`], matching the engine's lazy
    /// semantics.
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        // The engine creates a store at the path unconditionally; a
        // read-only open must never mutate the shared path, so refuse a
        // missing store here instead.
        if config.read_only && !config.path.exists() {
            return Err(StoreError::MissingStore(config.path));
        }

        let db = sled::Config::new()
            .path(&config.path)
            .open()
            .map_err(|source| StoreError::Open {
                path: config.path.clone(),
                source,
            })?;

        let tree = if config.read_only {
            let exists = db
                .tree_names()
                .iter()
                .any(|name| name.as_ref() == config.bucket.as_bytes());
            if exists {
                Some(db.open_tree(config.bucket.as_bytes())?)
            } else {
                None
            }
        } else {
            // Idempotent create.
            Some(db.open_tree(config.bucket.as_bytes())?)
        };

        debug!(
            "store opened: path={} bucket={} read_only={}",
            config.path.display(),
            config.bucket,
            config.read_only
        );

        Ok(Self {
            db: Some(db),
            tree,
            path: config.path,
            bucket: config.bucket,
            read_only: config.read_only,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bucket_name(&self) -> &str {
        &self.bucket
    }

    fn tree(&self) -> Result<&sled::Tree, StoreError> {
        if self.db.is_none() {
            return Err(StoreError::Closed);
        }
        self.tree
            .as_ref()
            .ok_or_else(|| StoreError::BucketNotFound(self.bucket.clone()))
    }

    /// Point lookup. An absent key is `Ok(None)`, not an error; a corrupt
    /// value for the requested key is surfaced as a decode error.
    pub fn get(&self, key: &str) -> Result<Option<Record>, StoreError> {
        let tree = self.tree()?;
        let key = normalize_key(key);
        match tree.get(key.as_bytes())? {
            None => Ok(None),
            Some(bytes) => codec::decode(&bytes)
                .map(Some)
                .map_err(|source| StoreError::Decode { key, source }),
        }
    }

    /// Single-key write, overwriting any existing value.
    pub fn put(&self, key: &str, record: &Record) -> Result<(), StoreError> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        let tree = self.tree()?;
        let bytes = codec::encode(record)?;
        tree.insert(normalize_key(key).into_bytes(), bytes)?;
        tree.flush()?;
        Ok(())
    }

    /// Lazy forward iteration over every stored (key, raw encoded value)
    /// pair in key-byte order. Each call starts a fresh scan.
    pub fn scan_all(
        &self,
    ) -> Result<impl Iterator<Item = Result<(String, sled::IVec), StoreError>> + '_, StoreError>
    {
        let tree = self.tree()?;
        Ok(tree.iter().map(|entry| {
            let (key, value) = entry?;
            Ok((String::from_utf8_lossy(&key).into_owned(), value))
        }))
    }

    /// Number of entries in the bucket.
    pub fn count(&self) -> Result<usize, StoreError> {
        Ok(self.tree()?.len())
    }

    /// Run `f` against a staging batch and commit the batch atomically when
    /// `f` succeeds. When `f` fails, nothing staged is applied; no reader
    /// ever observes a partial batch. One commit for the whole dataset is
    /// what makes bulk loads fast: per-record commits pay per-transaction
    /// flush overhead hundreds of thousands of times.
    pub fn run_batch<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut StoreBatch) -> Result<T, StoreError>,
    {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        let tree = self.tree()?;
        let mut batch = StoreBatch::default();
        let out = f(&mut batch)?;
        tree.apply_batch(batch.inner)
            .map_err(StoreError::Transaction)?;
        tree.flush()?;
        Ok(out)
    }

    /// Write raw bytes under a key, bypassing the codec. Only for tests
    /// that need to plant corrupt values.
    #[cfg(test)]
    pub(crate) fn put_raw_for_tests(&self, key: &str, bytes: Vec<u8>) {
        self.tree()
            .unwrap()
            .insert(key.as_bytes().to_vec(), bytes)
            .unwrap();
    }

    /// Flush and release the engine handle. Idempotent: closing an
    /// already-closed store is a no-op.
    pub fn close(&mut self) -> Result<(), StoreError> {
        self.tree = None;
        if let Some(db) = self.db.take() {
            db.flush()?;
            debug!("store closed: path={}", self.path.display());
        }
        Ok(())
    }

    /// Rewrite the store at a temporary path and atomically swap it into
    /// place, reclaiming free space left behind by bulk writes.
    ///
    /// Consumes the handle: the store must be re-opened afterwards, so no
    /// caller can keep operating on the pre-compaction handle by accident.
    ///
    /// Any failure before the original store is removed leaves it untouched
    /// and cleans up the temp copy. A failure at or after removal is
    /// returned as [`StoreError::CompactionRecovery`]: the compacted data
    /// still lives at `temp_path` and can be renamed into place by hand.
    pub fn compact(mut self, temp_path: &Path) -> Result<(), StoreError> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        if self.db.is_none() {
            return Err(StoreError::Closed);
        }
        if temp_path.exists() {
            return Err(StoreError::Compaction(format!(
                "temp path '{}' already exists",
                temp_path.display()
            )));
        }
        let path = self.path.clone();
        info!(
            "compacting store: path={} temp={}",
            path.display(),
            temp_path.display()
        );

        // The current handle must be released before the file can be
        // copied and replaced.
        self.close()?;

        if let Err(err) = copy_store(&path, temp_path) {
            if temp_path.exists() {
                let _ = fs::remove_dir_all(temp_path);
            }
            return Err(err);
        }

        // Point of no return: from here on the original is gone and only
        // the temp copy holds the data.
        fs::remove_dir_all(&path).map_err(|err| StoreError::CompactionRecovery {
            temp_path: temp_path.to_path_buf(),
            reason: format!("failed to remove original store: {err}"),
        })?;
        fs::rename(temp_path, &path).map_err(|err| StoreError::CompactionRecovery {
            temp_path: temp_path.to_path_buf(),
            reason: format!("failed to rename temp store into place: {err}"),
        })?;

        info!("compaction complete: path={}", path.display());
        Ok(())
    }
}

/// Copy the entire logical content of the store at `path` into a brand-new
/// store at `temp_path`, using the engine's whole-database export/import
/// primitive. Free pages are not carried over, which is what reclaims the
/// space.
fn copy_store(path: &Path, temp_path: &Path) -> Result<(), StoreError> {
    let source = sled::Config::new()
        .path(path)
        .open()
        .map_err(|err| StoreError::Compaction(format!("failed to re-open original: {err}")))?;
    let dest = sled::Config::new()
        .path(temp_path)
        .open()
        .map_err(|err| StoreError::Compaction(format!("failed to open temp store: {err}")))?;

    dest.import(source.export());
    dest.flush()
        .map_err(|err| StoreError::Compaction(format!("failed to flush temp store: {err}")))?;

    drop(dest);
    drop(source);
    Ok(())
}
