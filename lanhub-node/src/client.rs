//! Client role: joining a hub and filtering what it forwards.

use crate::engine::{Engine, Role};
use crate::error::NodeError;
use crate::session::Socket;
use lanhub_core::{CONNECTION_EVENT_TAG, ConnectStatus, ConnectionEvent, Record};
use lanhub_transport::tcp::connect_and_handshake;
use std::net::SocketAddr;

impl Engine {
    /// Connects to the hub at `addr` and adopts the id it assigns.
    ///
    /// Blocks for at most the connect timeout plus the handshake timeout.
    pub(crate) fn start_client(&mut self, addr: SocketAddr) -> Result<(), NodeError> {
        if self.role != Role::Idle {
            return Err(NodeError::AlreadyStarted);
        }

        let (stream, handshake) = connect_and_handshake(&self.config.client_config(addr))
            .map_err(|e| NodeError::startup(format!("cannot join hub at {addr}: {e}")))?;
        self.sessions
            .install_primary(Socket::Stream(stream), self.poll.registry())
            .map_err(|e| NodeError::startup(format!("cannot register link to {addr}: {e}")))?;

        self.role = Role::Client;
        self.self_id = handshake.peer_id;
        tracing::info!("Joined hub at {} as {}", addr, self.self_id);
        self.deliver_event(self.self_id, ConnectionEvent::joined(self.self_id));
        Ok(())
    }

    /// Delivers a record from the hub if it is meant for this node.
    pub(crate) fn accept_from_hub(&mut self, record: Record) {
        let header = record.header;

        if header.type_tag == CONNECTION_EVENT_TAG {
            match ConnectionEvent::decode(&record.payload) {
                Ok(event) if event.id != self.self_id => match event.status {
                    ConnectStatus::Joined => {
                        self.roster.insert(event.id);
                    }
                    ConnectStatus::Left => {
                        self.roster.remove(&event.id);
                    }
                },
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("Dropping malformed connection event: {}", e);
                    return;
                }
            }
            self.deliver(record);
            return;
        }

        if header.is_broadcast() || header.to == self.self_id {
            self.deliver(record);
        } else {
            tracing::trace!(
                "Dropping record for {} (this node is {})",
                header.to,
                self.self_id
            );
        }
    }
}
