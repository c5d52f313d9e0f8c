//! Error kinds shared by every layer (§7).
//!
//! One flat enum, reused as a `Result<T>` alias everywhere, following the
//! teacher's `storage::transport::Error` pattern rather than reaching for
//! `thiserror`/`anyhow` (see SPEC_FULL.md §3.1).

use std::fmt;
use std::io;
use std::result;

pub type Result<T> = result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// Malformed target string, illegal method/source/dest combination, or
    /// a duplicate tag target. Fatal, raised before any write.
    BadSpec(String),
    /// Source path does not resolve, or resolves to the empty-tree sentinel.
    NotFound(String),
    /// `ff`'s dest is not an ancestor of src.
    AncestorViolation(String),
    /// A payload failed to parse, or a hash mismatch was found on read.
    CorruptObject,
    /// Compare-and-swap failed updating a ref.
    RefConflict(String),
    /// I/O error talking to a (possibly remote) writer or repository.
    Transport(io::Error),
    /// Ctrl-C observed at a cooperative checkpoint.
    Cancelled,
    /// Catch-all I/O error not otherwise classified above.
    Io(io::Error),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Error::*;
        match self {
            BadSpec(msg) => write!(f, "{}", msg),
            NotFound(msg) => write!(f, "{}", msg),
            AncestorViolation(msg) => write!(f, "{}", msg),
            CorruptObject => write!(f, "corrupt object"),
            RefConflict(msg) => write!(f, "ref update conflict: {}", msg),
            Transport(err) => write!(f, "transport error: {}", err),
            Cancelled => write!(f, "interrupted"),
            Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}
