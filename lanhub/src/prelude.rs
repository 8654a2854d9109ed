//! Prelude module for convenient imports.
//!
//! This module re-exports the most commonly used types and traits.
//!
//! ```
//! use lanhub::prelude::*;
//! ```

// Core types
pub use lanhub_core::error::{Error as CoreError, Result as CoreResult};
pub use lanhub_core::{
    CONNECTION_EVENT_TAG, ConnectStatus, ConnectionEvent, PeerId, RecordHeader, type_tag,
};

// Transport types
pub use lanhub_transport::TransportError;

// Node types
pub use lanhub_node::{
    ConnectionHandler, Node, NodeConfig, NodeError, ReceiveHandler, Responder,
};
