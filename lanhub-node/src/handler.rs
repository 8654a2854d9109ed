//! Handler traits invoked by the event loop.

use crate::error::NodeError;
use lanhub_core::{ConnectionEvent, PeerId, RecordHeader};

/// Handle for sending records from inside a handler.
///
/// Records sent through a responder are queued exactly like records sent
/// through [`crate::Node`]; loopback deliveries they cause are dispatched
/// after the current handler returns.
pub trait Responder {
    /// Broadcasts a record to every other node and to this node.
    ///
    /// # Errors
    /// See [`crate::Node::send`].
    fn send(&mut self, type_tag: u32, payload: &[u8]) -> Result<(), NodeError>;

    /// Sends a record to one peer.
    ///
    /// # Errors
    /// See [`crate::Node::send_to`].
    fn send_to(&mut self, to: PeerId, type_tag: u32, payload: &[u8]) -> Result<(), NodeError>;

    /// Returns this node's id, or [`PeerId::UNASSIGNED`] when idle.
    fn self_id(&self) -> PeerId;

    /// Returns true if this node runs as the hub.
    fn is_server(&self) -> bool;
}

/// Handler for application records.
pub trait ReceiveHandler {
    /// Called once per delivered record.
    ///
    /// # Arguments
    /// * `header` - Decoded header; `from` is the originating peer
    /// * `payload` - Payload bytes, exactly `header.payload_size` long
    /// * `responder` - Interface for sending replies
    fn on_receive(&mut self, header: &RecordHeader, payload: &[u8], responder: &mut dyn Responder);
}

/// Handler for join and leave notifications.
pub trait ConnectionHandler {
    /// Called once per connection event.
    fn on_connection(&mut self, event: ConnectionEvent, responder: &mut dyn Responder);
}

impl<F> ReceiveHandler for F
where
    F: FnMut(&RecordHeader, &[u8], &mut dyn Responder),
{
    fn on_receive(&mut self, header: &RecordHeader, payload: &[u8], responder: &mut dyn Responder) {
        self(header, payload, responder);
    }
}

impl<F> ConnectionHandler for F
where
    F: FnMut(ConnectionEvent, &mut dyn Responder),
{
    fn on_connection(&mut self, event: ConnectionEvent, responder: &mut dyn Responder) {
        self(event, responder);
    }
}
