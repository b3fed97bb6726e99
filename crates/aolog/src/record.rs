//! Line codec for log records.

use std::fmt;

/// Operation tag that starts every record line.
pub const SET_TAG: &str = "SET";

/// Returns `true` if `tok` is non-empty and contains no whitespace.
pub fn valid_token(tok: &str) -> bool {
    !tok.is_empty() && !tok.chars().any(char::is_whitespace)
}

/// A single `SET key value` entry.
///
/// Callers building a record for [`LogWriter::append`](crate::LogWriter::append)
/// must pass tokens that satisfy [`valid_token`]; the codec does not
/// re-validate on encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: String,
    pub value: String,
}

impl Record {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Encodes the record as a full log line, including the trailing `\n`.
    pub fn encode(&self) -> String {
        format!("{}\n", self)
    }

    /// Parses one log line (with or without its line terminator).
    ///
    /// The line must split on whitespace into exactly three fields, the
    /// first being the literal [`SET_TAG`]. Anything else yields `None`.
    pub fn parse(line: &str) -> Option<Record> {
        let mut fields = line.split_whitespace();
        let (tag, key, value) = (fields.next()?, fields.next()?, fields.next()?);
        if fields.next().is_some() || tag != SET_TAG {
            return None;
        }
        if !valid_token(key) || !valid_token(value) {
            return None;
        }
        Some(Record::new(key, value))
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", SET_TAG, self.key, self.value)
    }
}
