//! Error types for node operations.

use lanhub_core::PeerId;
use thiserror::Error;

/// Error type for node operations.
#[derive(Debug, Error)]
pub enum NodeError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] lanhub_transport::TransportError),

    /// Invalid configuration.
    #[error("invalid configuration: {message}")]
    Config {
        /// Error message.
        message: String,
    },

    /// Starting as hub or client failed; no session state was kept.
    #[error("startup failed: {message}")]
    Startup {
        /// Error message.
        message: String,
    },

    /// The node is already running as hub or client.
    #[error("node already started")]
    AlreadyStarted,

    /// The node has not been started.
    #[error("node not started")]
    NotStarted,

    /// Every session slot is taken.
    #[error("all {capacity} session slots are in use")]
    SlotsExhausted {
        /// Number of peer slots.
        capacity: usize,
    },

    /// The outbound buffer cannot take the record.
    #[error("outbound buffer full: {requested} bytes requested, {available} bytes free")]
    BufferOverflow {
        /// Encoded record size.
        requested: usize,
        /// Spare outbound capacity.
        available: usize,
    },

    /// The record can never fit a session buffer.
    #[error("record too large: {size} bytes exceeds maximum {max} bytes")]
    RecordTooLarge {
        /// Payload size.
        size: usize,
        /// Maximum payload size.
        max: usize,
    },

    /// The type tag is reserved for connection events.
    #[error("type tag {0:#010x} is reserved")]
    ReservedTag(u32),

    /// No connected peer has this id.
    #[error("unknown peer {0}")]
    UnknownPeer(PeerId),
}

impl NodeError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a startup error.
    pub fn startup(message: impl Into<String>) -> Self {
        Self::Startup {
            message: message.into(),
        }
    }
}

impl From<lanhub_core::Error> for NodeError {
    fn from(err: lanhub_core::Error) -> Self {
        match err {
            lanhub_core::Error::BufferOverflow {
                requested,
                available,
            } => Self::BufferOverflow {
                requested,
                available,
            },
            other => Self::Transport(other.into()),
        }
    }
}
