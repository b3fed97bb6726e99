//! Parsing of the line-oriented command surface.

use aolog::valid_token;
use thiserror::Error;

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Set { key: String, value: String },
    Get { key: String },
    Exit,
}

/// Why an input line was rejected. Every variant surfaces to the user as
/// `ERR`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command: {0}")]
    Unknown(String),
    #[error("{command} takes {expected} argument(s), got {got}")]
    Arity {
        command: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("invalid token: {0:?}")]
    InvalidToken(String),
}

impl Command {
    /// Parses a single input line.
    ///
    /// Surrounding whitespace is trimmed and a blank line yields `Ok(None)`.
    /// Fields are separated by single spaces, so a doubled space produces an
    /// empty (invalid) token rather than being collapsed. The verb is
    /// case-insensitive; arguments are taken verbatim.
    pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let mut parts = line.split(' ');
        let verb = parts.next().unwrap_or_default();
        let args: Vec<&str> = parts.collect();

        let cmd = match verb.to_ascii_uppercase().as_str() {
            "SET" => {
                let [key, value] = take_args::<2>("SET", &args)?;
                Command::Set { key, value }
            }
            "GET" => {
                let [key] = take_args::<1>("GET", &args)?;
                Command::Get { key }
            }
            "EXIT" => {
                let [] = take_args::<0>("EXIT", &args)?;
                Command::Exit
            }
            _ => return Err(CommandError::Unknown(verb.to_string())),
        };
        Ok(Some(cmd))
    }
}

/// Checks arity and the token rule, returning owned arguments.
fn take_args<const N: usize>(
    command: &'static str,
    args: &[&str],
) -> Result<[String; N], CommandError> {
    if args.len() != N {
        return Err(CommandError::Arity {
            command,
            expected: N,
            got: args.len(),
        });
    }
    if let Some(bad) = args.iter().find(|a| !valid_token(a)) {
        return Err(CommandError::InvalidToken(bad.to_string()));
    }
    Ok(std::array::from_fn(|i| args[i].to_string()))
}
