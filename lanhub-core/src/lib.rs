//! # lanhub Core
//!
//! Wire-level types shared by every lanhub crate.
//!
//! This crate provides:
//! - [`PeerId`] - session slot identifiers with reserved sentinel values
//! - [`RecordHeader`] and [`Record`] - the framed message unit
//! - [`FixedBuffer`] - fixed-capacity byte accumulation buffer
//! - [`type_tag`] - compile-time string hash used for record type tags
//! - [`Handshake`] - identity handshake and discovery probe layout
//! - [`ConnectionEvent`] - synthetic join/leave notifications
//! - Error types for encoding/decoding operations

pub mod buffer;
pub mod error;
pub mod event;
pub mod handshake;
pub mod header;
pub mod peer;
pub mod tag;

pub use buffer::FixedBuffer;
pub use error::{Error, Result};
pub use event::{CONNECTION_EVENT_TAG, ConnectStatus, ConnectionEvent};
pub use handshake::{DISCOVERY_ACK, Handshake, MAGIC};
pub use header::{Record, RecordHeader};
pub use peer::PeerId;
pub use tag::type_tag;
