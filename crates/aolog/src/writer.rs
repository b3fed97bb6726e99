use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{LogError, LogReader, Record};

/// Storage handle behind a [`LogWriter`].
///
/// Implemented for [`File`]; other handles let callers put the log on
/// anything that can be read, appended to, truncated and synced.
pub trait LogFile: Read + Write + Seek {
    /// Current length in bytes.
    fn size(&self) -> io::Result<u64>;
    /// Truncates (or extends) to exactly `size` bytes.
    fn set_len(&self, size: u64) -> io::Result<()>;
    /// Forces data and metadata to stable storage.
    fn sync_all(&self) -> io::Result<()>;
}

impl LogFile for File {
    fn size(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn set_len(&self, size: u64) -> io::Result<()> {
        File::set_len(self, size)
    }

    fn sync_all(&self) -> io::Result<()> {
        File::sync_all(self)
    }
}

/// Durable appender for the record log.
///
/// Every [`append`](LogWriter::append) is write → flush → `sync_all`; the
/// call only returns `Ok` once the record is on stable storage. A failed
/// append is rolled back by truncating the file to its last acknowledged
/// length, so the log never holds bytes from a write that reported an
/// error. There is no retry of the record itself.
pub struct LogWriter<F: LogFile = File> {
    file: F,
    path: PathBuf,
    /// Length of the log after the last acknowledged write.
    committed: u64,
    /// A failed append could not be rolled back yet.
    torn: bool,
}

impl LogWriter<File> {
    /// Opens `path` for reading and appending, creating it if absent.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LogError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&path)?;
        LogWriter::from_parts(file, path)
    }
}

impl<F: LogFile> LogWriter<F> {
    /// Wraps an already opened handle. `path` is only used for diagnostics.
    /// Writes must land at the end of `file` (append semantics).
    pub fn from_parts(file: F, path: impl Into<PathBuf>) -> Result<Self, LogError> {
        let committed = file.size()?;
        Ok(Self {
            file,
            path: path.into(),
            committed,
            torn: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewinds the handle and returns a reader over the whole log, so replay
    /// runs on the same descriptor that later appends go through.
    pub fn replay_reader(&mut self) -> Result<LogReader<&mut F>, LogError> {
        self.file.seek(SeekFrom::Start(0))?;
        Ok(LogReader::from_reader(&mut self.file))
    }

    /// Append a record and force it to disk.
    ///
    /// On error the file is truncated back to its length before the call.
    /// If even that fails, the truncation is retried before the next append
    /// and that append fails until it succeeds.
    pub fn append(&mut self, record: &Record) -> Result<(), LogError> {
        if self.torn {
            self.rollback()?;
        }

        // one write_all per record so a crash tears at most this line
        let line = record.encode();
        if let Err(e) = self.write_durable(line.as_bytes()) {
            self.torn = true;
            if let Err(undo) = self.rollback() {
                warn!(
                    path = %self.path.display(),
                    error = %undo,
                    "could not roll back failed append"
                );
            }
            return Err(e.into());
        }

        self.committed += line.len() as u64;
        debug!(key = %record.key, bytes = line.len(), "record appended");
        Ok(())
    }

    /// Flush and `sync_all` without writing anything.
    pub fn sync(&mut self) -> Result<(), LogError> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Makes sure the next append starts on a fresh line.
    ///
    /// A crash mid-append can leave a partial last line without its `\n`.
    /// Replay already skips such a tail, but appending straight after it
    /// would fuse the next record onto the garbage. If the file is
    /// non-empty and does not end in `\n`, a single `\n` is appended and
    /// synced. Returns `true` if the tail was repaired.
    pub fn ensure_line_boundary(&mut self) -> Result<bool, LogError> {
        let len = self.file.size()?;
        if len == 0 {
            return Ok(false);
        }

        let mut last = [0u8; 1];
        self.file.seek(SeekFrom::End(-1))?;
        self.file.read_exact(&mut last)?;
        if last[0] == b'\n' {
            return Ok(false);
        }

        warn!(path = %self.path.display(), "log ends in a partial line, terminating it");
        if let Err(e) = self.write_durable(b"\n") {
            self.torn = true;
            return Err(e.into());
        }
        self.committed = len + 1;
        Ok(true)
    }

    /// Final flush + sync, then release the file handle.
    pub fn close(mut self) -> Result<(), LogError> {
        if self.torn {
            self.rollback()?;
        }
        self.sync()?;
        drop(self.file);
        Ok(())
    }

    fn write_durable(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.file.write_all(bytes)?;
        self.file.flush()?;
        self.file.sync_all()
    }

    /// Drops every byte past the last acknowledged write.
    fn rollback(&mut self) -> Result<(), LogError> {
        self.file.set_len(self.committed)?;
        self.file.sync_all()?;
        self.torn = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::cell::Cell;
    use std::fs;
    use std::rc::Rc;
    use tempfile::tempdir;

    // ---------------------- Helpers ----------------------

    /// Append-mode file that refuses to grow past `limit` bytes. Like a
    /// file-size rlimit, a write that crosses the limit stores what fits
    /// and then fails.
    struct CappedFile {
        inner: File,
        limit: Rc<Cell<u64>>,
        refuse_truncate: Rc<Cell<bool>>,
    }

    impl Read for CappedFile {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.inner.read(buf)
        }
    }

    impl Seek for CappedFile {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    impl Write for CappedFile {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let len = self.inner.metadata()?.len();
            let room = self.limit.get().saturating_sub(len) as usize;
            if room == 0 {
                return Err(io::Error::other("file too large"));
            }
            self.inner.write(&buf[..buf.len().min(room)])
        }

        fn flush(&mut self) -> io::Result<()> {
            self.inner.flush()
        }
    }

    impl LogFile for CappedFile {
        fn size(&self) -> io::Result<u64> {
            self.inner.size()
        }

        fn set_len(&self, size: u64) -> io::Result<()> {
            if self.refuse_truncate.get() {
                return Err(io::Error::other("truncate refused"));
            }
            self.inner.set_len(size)
        }

        fn sync_all(&self) -> io::Result<()> {
            self.inner.sync_all()
        }
    }

    type Knobs = (Rc<Cell<u64>>, Rc<Cell<bool>>);

    fn capped_writer(path: &Path, extra: u64) -> Result<(LogWriter<CappedFile>, Knobs)> {
        let inner = OpenOptions::new().read(true).append(true).open(path)?;
        let limit = Rc::new(Cell::new(inner.metadata()?.len() + extra));
        let refuse = Rc::new(Cell::new(false));
        let file = CappedFile {
            inner,
            limit: Rc::clone(&limit),
            refuse_truncate: Rc::clone(&refuse),
        };
        Ok((LogWriter::from_parts(file, path)?, (limit, refuse)))
    }

    #[test]
    fn open_creates_missing_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("data.db");
        assert!(!path.exists());

        let _w = LogWriter::open(&path)?;
        assert!(path.exists());
        assert_eq!(fs::metadata(&path)?.len(), 0);
        Ok(())
    }

    #[test]
    fn open_fails_for_missing_directory() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("no-such-dir").join("data.db");
        assert!(LogWriter::open(&path).is_err());
        Ok(())
    }

    #[test]
    fn append_writes_text_lines() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("data.db");

        let mut w = LogWriter::open(&path)?;
        w.append(&Record::new("x", "10"))?;
        w.append(&Record::new("x", "20"))?;

        assert_eq!(fs::read_to_string(&path)?, "SET x 10\nSET x 20\n");
        Ok(())
    }

    #[test]
    fn append_never_overwrites_existing_content() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("data.db");
        fs::write(&path, "SET a 1\n")?;

        let mut w = LogWriter::open(&path)?;
        w.append(&Record::new("b", "2"))?;
        w.close()?;

        assert_eq!(fs::read_to_string(&path)?, "SET a 1\nSET b 2\n");
        Ok(())
    }

    #[test]
    fn replay_reader_sees_existing_records() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("data.db");
        fs::write(&path, "SET a 1\nSET a 2\n")?;

        let mut w = LogWriter::open(&path)?;
        let mut recs = Vec::new();
        w.replay_reader()?.replay(|r| recs.push(r))?;
        assert_eq!(recs, vec![Record::new("a", "1"), Record::new("a", "2")]);

        // appends still land at the end after a rewind
        w.append(&Record::new("b", "3"))?;
        assert_eq!(fs::read_to_string(&path)?, "SET a 1\nSET a 2\nSET b 3\n");
        Ok(())
    }

    #[test]
    fn line_boundary_noop_on_empty_and_clean_files() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("data.db");

        let mut w = LogWriter::open(&path)?;
        assert!(!w.ensure_line_boundary()?);
        w.append(&Record::new("a", "1"))?;
        assert!(!w.ensure_line_boundary()?);

        assert_eq!(fs::read_to_string(&path)?, "SET a 1\n");
        Ok(())
    }

    #[test]
    fn line_boundary_repairs_torn_tail() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("data.db");
        fs::write(&path, "SET a 1\nSET b")?;

        let mut w = LogWriter::open(&path)?;
        assert!(w.ensure_line_boundary()?);
        w.append(&Record::new("c", "3"))?;

        assert_eq!(fs::read_to_string(&path)?, "SET a 1\nSET b\nSET c 3\n");
        Ok(())
    }

    // ---------------------- Failed appends ----------------------

    #[test]
    fn failed_append_is_rolled_back() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("data.db");
        fs::write(&path, "SET k old\n")?;

        // room for "SET k va" only
        let (mut w, (limit, _)) = capped_writer(&path, 8)?;
        assert!(w.append(&Record::new("k", "value1")).is_err());
        assert_eq!(fs::read_to_string(&path)?, "SET k old\n");

        // the next record starts cleanly where the failed one began
        limit.set(u64::MAX);
        w.append(&Record::new("k", "new"))?;
        assert_eq!(fs::read_to_string(&path)?, "SET k old\nSET k new\n");
        Ok(())
    }

    #[test]
    fn failed_rollback_is_retried_before_next_append() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("data.db");
        fs::write(&path, "SET a 1\n")?;

        let (mut w, (limit, refuse)) = capped_writer(&path, 4)?;
        refuse.set(true);
        assert!(w.append(&Record::new("b", "2")).is_err());
        assert_eq!(fs::read_to_string(&path)?, "SET a 1\nSET ");

        // still unable to undo: refuse to write on top of the torn bytes
        limit.set(u64::MAX);
        assert!(w.append(&Record::new("c", "3")).is_err());
        assert_eq!(fs::read_to_string(&path)?, "SET a 1\nSET ");

        refuse.set(false);
        w.append(&Record::new("c", "3"))?;
        assert_eq!(fs::read_to_string(&path)?, "SET a 1\nSET c 3\n");
        Ok(())
    }

    #[test]
    fn close_drops_torn_tail() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("data.db");
        fs::write(&path, "SET a 1\n")?;

        let (mut w, (_, refuse)) = capped_writer(&path, 4)?;
        refuse.set(true);
        assert!(w.append(&Record::new("b", "2")).is_err());

        refuse.set(false);
        w.close()?;
        assert_eq!(fs::read_to_string(&path)?, "SET a 1\n");
        Ok(())
    }
}
