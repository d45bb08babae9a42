//! Error types for memwire.

use thiserror::Error;

/// Broad failure class, used to pick the response status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Malformed envelope, unknown command, constraint violation.
    Protocol,
    /// Link not open, short or missing reply, I/O failure.
    Transport,
    /// Hex decode failure, short buffer, value out of range.
    Encoding,
}

impl ErrorClass {
    /// Status code reported in a failure envelope.
    pub fn status(self) -> i64 {
        match self {
            ErrorClass::Protocol => 1,
            ErrorClass::Transport => 2,
            ErrorClass::Encoding => 3,
        }
    }
}

/// Main error type for all memwire operations.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// I/O error on the probe link or a client channel.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Hex payload could not be decoded.
    #[error("Invalid hex data: {0}")]
    Hex(#[from] hex::FromHexError),

    /// Protocol error (bad envelope, addressing constraint, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Transport error (short reply, timeout, closed link).
    #[error("Transport error: {0}")]
    Transport(String),

    /// Value or buffer does not fit the requested kind.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Command name not present in the dispatch table.
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// Command received fewer parameters than it requires.
    #[error("Command '{command}' requires {required} arguments")]
    MissingParams {
        /// Command name.
        command: String,
        /// Minimum parameter count.
        required: usize,
    },

    /// Probe name not present in the registry.
    #[error("Unknown probe type: {0}")]
    UnknownProbe(String),

    /// Operation needs an open link.
    #[error("Probe is not connected")]
    NotConnected,

    /// Failure envelope returned by a remote server.
    #[error("Remote error (status {status}): {msg}")]
    Remote {
        /// Status code from the envelope.
        status: i64,
        /// Message from the envelope.
        msg: String,
    },
}

impl ProbeError {
    /// Classify this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            ProbeError::Io(_) | ProbeError::Transport(_) | ProbeError::NotConnected => {
                ErrorClass::Transport
            }
            ProbeError::Hex(_) | ProbeError::Encoding(_) => ErrorClass::Encoding,
            ProbeError::Remote { status, .. } => match status {
                2 => ErrorClass::Transport,
                3 => ErrorClass::Encoding,
                _ => ErrorClass::Protocol,
            },
            ProbeError::Json(_)
            | ProbeError::Protocol(_)
            | ProbeError::UnknownCommand(_)
            | ProbeError::MissingParams { .. }
            | ProbeError::UnknownProbe(_) => ErrorClass::Protocol,
        }
    }

    /// Status code for a failure envelope (always nonzero).
    pub fn status(&self) -> i64 {
        match self {
            ProbeError::Remote { status, .. } if *status != 0 => *status,
            _ => self.class().status(),
        }
    }

    /// Whether the link should be considered lost after this error.
    pub fn is_transport(&self) -> bool {
        self.class() == ErrorClass::Transport
    }
}

/// Result type alias using ProbeError.
pub type Result<T> = std::result::Result<T, ProbeError>;
