//! The command loop: reads lines from an input stream, drives the [`Store`]
//! and writes one flushed response line per `GET` or error.

use crate::command::Command;
use crate::store::Store;
use anyhow::{Context, Result};
use std::io::{BufRead, Write};
use tracing::{debug, warn};

/// Literal response for any rejected or failed command.
pub const ERR: &str = "ERR";

/// Runs until `EXIT` or end of input.
///
/// - `SET` prints nothing on success.
/// - `GET` prints the value, or an empty line if the key is absent.
/// - Parse failures and store failures print [`ERR`].
///
/// Only failures of the input or output streams end the loop with an error.
pub fn run<R: BufRead, W: Write>(store: &mut Store, mut input: R, mut output: W) -> Result<()> {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let n = input
            .read_until(b'\n', &mut buf)
            .context("failed to read command")?;
        if n == 0 {
            return Ok(());
        }

        let Ok(line) = std::str::from_utf8(&buf) else {
            debug!("rejected non-UTF-8 input line");
            reply(&mut output, ERR)?;
            continue;
        };

        match Command::parse(line) {
            Ok(None) => {}
            Ok(Some(Command::Exit)) => return Ok(()),
            Ok(Some(Command::Set { key, value })) => {
                if let Err(e) = store.set(&key, &value) {
                    warn!(error = %e, key = %key, "SET failed");
                    reply(&mut output, ERR)?;
                }
            }
            Ok(Some(Command::Get { key })) => match store.get(&key) {
                Ok(value) => reply(&mut output, value.unwrap_or(""))?,
                Err(e) => {
                    warn!(error = %e, key = %key, "GET failed");
                    reply(&mut output, ERR)?;
                }
            },
            Err(e) => {
                debug!(error = %e, "rejected command");
                reply(&mut output, ERR)?;
            }
        }
    }
}

/// Writes one line and flushes it so a lock-step driver sees it immediately.
fn reply<W: Write>(output: &mut W, line: &str) -> Result<()> {
    writeln!(output, "{}", line).context("failed to write response")?;
    output.flush().context("failed to flush response")?;
    Ok(())
}
