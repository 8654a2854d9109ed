//! Error types for transport operations.

use thiserror::Error;

/// Error type for transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Wire format error.
    #[error("wire error: {0}")]
    Core(#[from] lanhub_core::Error),

    /// Connection timeout.
    #[error("connection timeout")]
    ConnectTimeout,

    /// Frame too large.
    #[error("frame too large: {size} bytes exceeds maximum {max} bytes")]
    FrameTooLarge {
        /// Actual frame size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Invalid frame.
    #[error("invalid frame: {message}")]
    InvalidFrame {
        /// Error message.
        message: String,
    },

    /// Handshake rejected or incomplete.
    #[error("handshake failed: {message}")]
    Handshake {
        /// Error message.
        message: String,
    },

    /// Multicast error.
    #[error("multicast error: {message}")]
    Multicast {
        /// Error message.
        message: String,
    },
}

impl TransportError {
    /// Creates a frame too large error.
    pub fn frame_too_large(size: usize, max: usize) -> Self {
        Self::FrameTooLarge { size, max }
    }

    /// Creates an invalid frame error.
    pub fn invalid_frame(message: impl Into<String>) -> Self {
        Self::InvalidFrame {
            message: message.into(),
        }
    }

    /// Creates a handshake error.
    pub fn handshake(message: impl Into<String>) -> Self {
        Self::Handshake {
            message: message.into(),
        }
    }

    /// Creates a multicast error.
    pub fn multicast(message: impl Into<String>) -> Self {
        Self::Multicast {
            message: message.into(),
        }
    }
}
