//! Command-line and environment configuration.
//!
//! Flags override the matching `KVLOG_*` environment variables, which
//! override the built-in defaults.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Log file used when neither `--data-file` nor `KVLOG_DATA_FILE` is given.
pub const DEFAULT_DATA_FILE: &str = "data.db";

/// Durable append-only key/value store.
///
/// Reads `SET <key> <value>`, `GET <key>` and `EXIT` commands from stdin,
/// one per line. Diagnostics go to stderr; stdout carries responses only.
#[derive(Debug, Parser)]
#[command(name = "kvlog", version)]
pub struct Cli {
    /// Path of the append-only log file (created if missing).
    #[arg(long, env = "KVLOG_DATA_FILE", default_value = DEFAULT_DATA_FILE)]
    pub data_file: PathBuf,

    /// Initial bucket count of the in-memory index, rounded up to a power of two.
    #[arg(long, env = "KVLOG_INITIAL_CAPACITY", default_value_t = index::DEFAULT_CAPACITY)]
    pub initial_capacity: usize,

    /// Diagnostic log format. Verbosity is controlled by `RUST_LOG`.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per event.
    Json,
}
