// Crate-wide error type.
//
// Puffin's operations fail for a small, closed set of reasons, and every
// layer (bit I/O, puff records, Huffman tables, engines, streams) reports
// through the same enum so callers can branch on the kind without digging
// through wrapper types.

use std::io;

/// Error kinds shared by all puffin operations.
#[derive(Debug)]
pub enum Error {
    /// The deflate or puff bytes violate structural rules (bad block type,
    /// LEN/NLEN mismatch, malformed Huffman preamble, out-of-range symbol,
    /// malformed record).
    InvalidInput(String),
    /// The reader ran out of bits or bytes before a structurally required
    /// quantity was satisfied.
    InsufficientInput,
    /// The writer ran out of buffer before a structurally required quantity
    /// was written.
    InsufficientOutput,
    /// The underlying byte stream reported a failure.
    StreamIo(io::Error),
}

impl Error {
    /// Shorthand for an `InvalidInput` with a formatted message.
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Self::InsufficientInput => write!(f, "insufficient input"),
            Self::InsufficientOutput => write!(f, "insufficient output"),
            Self::StreamIo(e) => write!(f, "stream I/O error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::StreamIo(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::StreamIo(e)
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;
