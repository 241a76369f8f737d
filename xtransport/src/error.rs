//! Error types for the xtransfer protocol.

use std::fmt;

/// Result type alias for protocol operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types surfaced by the protocol.
#[derive(Debug)]
pub enum Error {
    /// A decoded frame's checksum did not match, or the datagram was
    /// shorter than the 7-byte header.
    CorruptFrame,

    /// A filename init payload failed to parse or validate.
    InvalidInit,

    /// The sliding window has no free slot for a new frame.
    WindowFull,

    /// A sequence number fell outside any store that could resolve it.
    SequenceOutOfRange,

    /// The handshake did not complete within its retry budget.
    HandshakeFailed,

    /// The server reported the requested file does not exist.
    FileNotFound,

    /// An operation was attempted in a state that doesn't allow it.
    InvalidState,

    /// Underlying I/O failure (socket or file).
    Io(std::io::Error),
}

impl Error {
    /// Returns a human-readable description of the error.
    pub fn as_str(&self) -> &'static str {
        match self {
            Error::CorruptFrame => "corrupt frame",
            Error::InvalidInit => "invalid filename init payload",
            Error::WindowFull => "window full",
            Error::SequenceOutOfRange => "sequence out of range",
            Error::HandshakeFailed => "handshake failed",
            Error::FileNotFound => "file not found",
            Error::InvalidState => "invalid state",
            Error::Io(_) => "I/O error",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "{}: {}", self.as_str(), e),
            _ => f.write_str(self.as_str()),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}
