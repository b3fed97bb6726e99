//! # aolog — append-only record log
//!
//! The on-disk half of the kvlog store. The log is a UTF-8 text file holding
//! one record per line and is the store's only source of truth:
//!
//! ```text
//! SET <key> <value>\n
//! SET <key> <value>\n
//! ...
//! ```
//!
//! There is no header, footer, checksum or length prefix. Keys and values are
//! *tokens*: non-empty and free of whitespace (see [`valid_token`]).
//!
//! - [`LogWriter`] appends records and forces each one to stable storage
//!   before returning.
//! - [`LogReader`] replays a log front to back, handing every well-formed
//!   record to a callback and silently skipping anything else (torn tails,
//!   foreign lines, invalid UTF-8).

mod reader;
mod record;
mod writer;

pub use reader::{LogReader, ReplayStats};
pub use record::{valid_token, Record, SET_TAG};
pub use writer::{LogFile, LogWriter};

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}
