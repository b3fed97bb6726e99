use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use tracing::debug;

use crate::{LogError, Record};

/// Outcome of a replay pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Well-formed records handed to the callback.
    pub applied: u64,
    /// Lines that failed validation and were skipped.
    pub skipped: u64,
}

/// Replays a record log front to back.
pub struct LogReader<R: Read> {
    rdr: BufReader<R>,
}

impl LogReader<File> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<LogReader<File>, LogError> {
        let f = File::open(path)?;
        Ok(LogReader::from_reader(f))
    }
}

impl<R: Read> LogReader<R> {
    pub fn from_reader(reader: R) -> Self {
        LogReader {
            rdr: BufReader::new(reader),
        }
    }

    /// Calls `apply` for every valid record, in file order.
    ///
    /// Malformed lines (wrong field count, unknown tag, bad token, invalid
    /// UTF-8, or a torn final line) are counted and skipped. Only an I/O
    /// error from the underlying reader fails the replay.
    pub fn replay<F>(&mut self, mut apply: F) -> Result<ReplayStats, LogError>
    where
        F: FnMut(Record),
    {
        let mut stats = ReplayStats::default();
        let mut buf = Vec::new();
        let mut line_no = 0u64;

        loop {
            buf.clear();
            if self.rdr.read_until(b'\n', &mut buf)? == 0 {
                return Ok(stats);
            }
            line_no += 1;

            let record = std::str::from_utf8(&buf).ok().and_then(Record::parse);
            match record {
                Some(r) => {
                    apply(r);
                    stats.applied += 1;
                }
                None => {
                    debug!(line = line_no, "skipping malformed log line");
                    stats.skipped += 1;
                }
            }
        }
    }
}
