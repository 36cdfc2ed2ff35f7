use std::{fmt, io};

/// Failures of the shell's own control primitives.
///
/// Anything attributable to user input or to a child process is reported and
/// recovered locally; these errors mean the shell can no longer trust its own
/// invariants and must terminate with a diagnostic.
#[derive(Debug)]
pub enum Error {
    SignalSetup(io::Error),
    Fork(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::SignalSetup(e) => write!(f, "cannot set up signal handling: {e}"),
            Error::Fork(e) => write!(f, "cannot fork: {e}"),
        }
    }
}
