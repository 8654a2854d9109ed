//! Error types for lanhub core operations.

use thiserror::Error;

/// Core error type for lanhub wire operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// Buffer is too short for the requested operation.
    #[error("buffer too short: required {required} bytes, available {available} bytes")]
    BufferTooShort {
        /// Required buffer size in bytes.
        required: usize,
        /// Available buffer size in bytes.
        available: usize,
    },

    /// Append would exceed the fixed capacity of a buffer.
    #[error("buffer overflow: {requested} bytes requested, {available} bytes free")]
    BufferOverflow {
        /// Bytes the caller tried to append.
        requested: usize,
        /// Spare capacity left in the buffer.
        available: usize,
    },

    /// Handshake or probe did not start with the expected magic.
    #[error("bad magic: {found:?}")]
    BadMagic {
        /// The bytes found where the magic was expected.
        found: [u8; 8],
    },

    /// Unknown connection status byte.
    #[error("invalid connection status: {0}")]
    InvalidStatus(u8),

    /// Header's payload size disagrees with the payload supplied.
    #[error("payload size mismatch: header declares {declared} bytes, got {actual}")]
    PayloadMismatch {
        /// Size in the header.
        declared: i32,
        /// Actual payload length.
        actual: usize,
    },

    /// Header declared a negative payload size.
    #[error("invalid payload size: {0}")]
    InvalidPayloadSize(i32),
}

impl Error {
    /// Creates a buffer too short error.
    #[must_use]
    pub fn too_short(required: usize, available: usize) -> Self {
        Self::BufferTooShort {
            required,
            available,
        }
    }
}

/// Result type alias for lanhub core operations.
pub type Result<T> = std::result::Result<T, Error>;
