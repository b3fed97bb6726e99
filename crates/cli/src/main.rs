//! `kvlog`: a durable key/value store driven over stdin/stdout.
//!
//! ```bash
//! printf 'SET x 10\nGET x\nEXIT\n' | kvlog --data-file data.db
//! RUST_LOG=debug kvlog --log-format json
//! ```

mod command;
mod config;
mod repl;
mod store;

use anyhow::{Context, Result};
use clap::Parser;
use config::{Cli, LogFormat};
use std::io;
use store::Store;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    // no store, no service
    let mut store = Store::open(&cli.data_file, cli.initial_capacity)
        .with_context(|| format!("failed to open {}", cli.data_file.display()))?;

    tracing::info!(
        path = %store.path().display(),
        keys = store.len(),
        "ready"
    );

    let stdin = io::stdin();
    let result = repl::run(&mut store, stdin.lock(), io::stdout().lock());

    // close even if the loop failed; the loop error takes precedence
    let closed = store.close().context("failed to close store");
    result?;
    closed
}

/// Diagnostics go to stderr so stdout stays a clean response stream.
fn init_logging(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(false)
                    .with_writer(io::stderr),
            )
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(io::stderr))
            .init(),
    }
}
