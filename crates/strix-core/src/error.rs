//! Error types for the streaming compression engine.

use thiserror::Error;

/// Result type alias for compression operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Compression stream error types.
#[derive(Debug, Error)]
pub enum Error {
    /// A constructor or call argument was rejected.
    #[error("invalid argument `{what}`: {message}")]
    InvalidArgument {
        what: &'static str,
        message: String,
    },

    /// The operation is not valid for the stream's current mode, or the
    /// underlying stream violated its I/O contract.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// The operation is not supported by this kind of stream.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// The stream was used after it was closed.
    #[error("stream is closed: cannot {operation}")]
    Disposed { operation: &'static str },

    /// Compressed input is corrupted or structurally invalid.
    #[error("corrupted data: {message}")]
    CorruptedData { message: String },

    /// Checksum verification failed.
    #[error("checksum mismatch: expected 0x{expected:08x}, got 0x{actual:08x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    /// The compressed stream ended before its final block.
    #[error("unexpected EOF after {bytes_read} bytes")]
    UnexpectedEof { bytes_read: usize },

    /// Internal stream state error.
    #[error("invalid state: expected {expected}, got {actual}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },

    /// The operation observed a cancellation request.
    #[error("operation cancelled")]
    Cancelled,

    /// I/O error from an underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create an invalid argument error.
    pub fn invalid_argument(what: &'static str, message: impl Into<String>) -> Self {
        Error::InvalidArgument {
            what,
            message: message.into(),
        }
    }

    /// Create an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Error::InvalidOperation(message.into())
    }

    /// Create an unsupported-operation error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Error::Unsupported(message.into())
    }

    /// Create a disposed-stream error.
    pub fn disposed(operation: &'static str) -> Self {
        Error::Disposed { operation }
    }

    /// Create a corrupted data error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Error::CorruptedData {
            message: message.into(),
        }
    }

    /// Create a checksum mismatch error.
    pub fn checksum_mismatch(expected: u32, actual: u32) -> Self {
        Error::ChecksumMismatch { expected, actual }
    }

    /// Create an unexpected EOF error.
    pub fn unexpected_eof(bytes_read: usize) -> Self {
        Error::UnexpectedEof { bytes_read }
    }

    /// Check if the error denotes malformed compressed input.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Error::CorruptedData { .. }
                | Error::ChecksumMismatch { .. }
                | Error::UnexpectedEof { .. }
        )
    }

    /// Get error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Error::InvalidArgument { .. } => "invalid_argument",
            Error::InvalidOperation(_) => "invalid_operation",
            Error::Unsupported(_) => "unsupported",
            Error::Disposed { .. } => "disposed",
            Error::CorruptedData { .. } => "corrupted_data",
            Error::ChecksumMismatch { .. } => "checksum_mismatch",
            Error::UnexpectedEof { .. } => "unexpected_eof",
            Error::InvalidState { .. } => "invalid_state",
            Error::Cancelled => "cancelled",
            Error::Io(_) => "io_error",
        }
    }
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        use std::io::ErrorKind;

        match err {
            Error::Io(inner) => inner,
            Error::InvalidArgument { .. } => std::io::Error::new(ErrorKind::InvalidInput, err),
            Error::Unsupported(_) => std::io::Error::new(ErrorKind::Unsupported, err),
            Error::UnexpectedEof { .. } => std::io::Error::new(ErrorKind::UnexpectedEof, err),
            Error::CorruptedData { .. } | Error::ChecksumMismatch { .. } => {
                std::io::Error::new(ErrorKind::InvalidData, err)
            }
            Error::Cancelled => std::io::Error::new(ErrorKind::Interrupted, err),
            _ => std::io::Error::other(err),
        }
    }
}
