//! Log-backed store that ties together the record log and the in-memory index.
use aolog::{LogError, LogFile, LogWriter, ReplayStats, Record};
use index::Index;
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot open log {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: LogError,
    },
    #[error("write failed: {0}")]
    Write(#[source] LogError),
    #[error("close failed: {0}")]
    Close(#[source] LogError),
    #[error("store is not open")]
    NotOpen,
}

/// The sole authority over one append-only log file.
///
/// # Write Path
///
/// 1. Append `SET <key> <value>\n` to the log.
/// 2. Flush and `sync_all` the file.
/// 3. Only then apply the write to the [`Index`].
///
/// If any of steps 1-2 fails the log is truncated back to its previous
/// length and the index is left untouched, so neither disk nor memory
/// holds a write that was reported as failed.
///
/// # Read Path
///
/// [`get`](Store::get) answers from the index alone; it never touches disk.
///
/// # Recovery
///
/// [`Store::open`] replays the whole log into a fresh index. Later records
/// overwrite earlier ones, which gives last-write-wins for free. Malformed
/// lines are skipped.
///
/// # Lifecycle
///
/// `open` (replay) → ready → [`close`](Store::close). After `close` every
/// operation reports [`StoreError::NotOpen`]. Dropping a store that was
/// never closed performs the same flush + sync on a best-effort basis.
pub struct Store<F: LogFile = File> {
    path: PathBuf,
    index: Index,
    writer: Option<LogWriter<F>>,
}

impl Store {
    /// Opens (creating if absent) the log at `path` and replays it.
    ///
    /// `initial_capacity` sizes the index's bucket array; see
    /// [`Index::with_capacity`].
    ///
    /// # Recovery Steps
    ///
    /// 1. Open the file for read + append.
    /// 2. Rewind and replay every valid record into the index, in order.
    /// 3. If the log ends in a torn partial line, terminate it so the next
    ///    append starts on a fresh line.
    pub fn open<P: AsRef<Path>>(path: P, initial_capacity: usize) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let writer = LogWriter::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Store::from_writer(writer, initial_capacity)
    }
}

impl<F: LogFile> Store<F> {
    /// Builds a store on an already opened log, running the same replay as
    /// [`Store::open`].
    pub fn from_writer(
        mut writer: LogWriter<F>,
        initial_capacity: usize,
    ) -> Result<Self, StoreError> {
        let path = writer.path().to_path_buf();
        let open_err = |source: LogError| StoreError::Open {
            path: path.clone(),
            source,
        };

        let mut index = Index::with_capacity(initial_capacity);
        let stats = replay_into(&mut writer, &mut index).map_err(open_err)?;

        writer.ensure_line_boundary().map_err(open_err)?;

        info!(
            path = %path.display(),
            applied = stats.applied,
            skipped = stats.skipped,
            keys = index.len(),
            "log replayed"
        );

        Ok(Self {
            path,
            index,
            writer: Some(writer),
        })
    }

    /// Durably records `key = value`.
    ///
    /// Both arguments must already satisfy [`aolog::valid_token`]; the store
    /// does not re-validate. Returns once the record is on stable storage.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let writer = self.writer.as_mut().ok_or(StoreError::NotOpen)?;
        let record = Record::new(key, value);

        writer.append(&record).map_err(StoreError::Write)?;
        self.index.set(record.key, record.value);
        Ok(())
    }

    /// Looks up `key` in the index. `Ok(None)` means the key was never set.
    pub fn get(&self, key: &str) -> Result<Option<&str>, StoreError> {
        if self.writer.is_none() {
            return Err(StoreError::NotOpen);
        }
        Ok(self.index.get(key))
    }

    /// Final flush + sync, then releases the file handle.
    ///
    /// Acknowledged writes were already durable when `set` returned; a
    /// failure here is worth reporting but does not mean data loss.
    pub fn close(&mut self) -> Result<(), StoreError> {
        let writer = self.writer.take().ok_or(StoreError::NotOpen)?;
        writer.close().map_err(StoreError::Close)?;
        info!(path = %self.path.display(), keys = self.index.len(), "store closed");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of distinct keys in the index.
    pub fn len(&self) -> usize {
        self.index.len()
    }
}

impl<F: LogFile> Drop for Store<F> {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.close() {
                warn!(path = %self.path.display(), error = %e, "failed to close log on drop");
            }
        }
    }
}

/// Replays the log behind `writer` into `index`.
fn replay_into<F: LogFile>(writer: &mut LogWriter<F>, index: &mut Index) -> Result<ReplayStats, LogError> {
    writer.replay_reader()?.replay(|r| {
        index.set(r.key, r.value);
    })
}
