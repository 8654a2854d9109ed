//! Hub role: listener, admission, relay and departure announcements.

use crate::engine::{DISCOVERY_TOKEN, Engine, Role, event_header};
use crate::error::NodeError;
use crate::session::{Session, Socket};
use lanhub_core::{CONNECTION_EVENT_TAG, ConnectionEvent, Handshake, PeerId, Record};
use lanhub_transport::tcp::{bind_listener, reject};
use lanhub_transport::udp::DiscoveryResponder;
use mio::Interest;
use mio::net::TcpStream;
use std::io::ErrorKind;
use std::net::SocketAddr;

impl Engine {
    /// Binds the listener (and discovery socket) and becomes the hub.
    pub(crate) fn start_hub(&mut self) -> Result<(), NodeError> {
        if self.role != Role::Idle {
            return Err(NodeError::AlreadyStarted);
        }

        let server_config = self.config.server_config();
        let listener = bind_listener(&server_config).map_err(|e| {
            NodeError::startup(format!("cannot listen on {}: {}", server_config.bind_addr, e))
        })?;

        let mut discovery = self.bind_discovery();
        if let Some(responder) = discovery.as_mut() {
            if let Err(e) = self
                .poll
                .registry()
                .register(responder, DISCOVERY_TOKEN, Interest::READABLE)
            {
                tracing::warn!("Discovery disabled, cannot register socket: {}", e);
                discovery = None;
            }
        }

        if let Err(e) = self
            .sessions
            .install_primary(Socket::Listener(listener), self.poll.registry())
        {
            if let Some(mut responder) = discovery {
                let _ = self.poll.registry().deregister(&mut responder);
            }
            return Err(NodeError::startup(format!("cannot register listener: {e}")));
        }

        self.discovery = discovery;
        self.role = Role::Hub;
        self.self_id = PeerId::HUB;
        tracing::info!(
            "Hub for app {} listening on {} ({} peer slots)",
            self.config.app_id,
            server_config.bind_addr,
            self.sessions.capacity()
        );
        self.deliver_event(PeerId::HUB, ConnectionEvent::joined(PeerId::HUB));
        Ok(())
    }

    /// A hub that cannot join the multicast group still serves clients that
    /// know its address.
    fn bind_discovery(&self) -> Option<DiscoveryResponder> {
        if !self.config.discovery {
            return None;
        }
        let config = self.config.discovery_config()?;
        match DiscoveryResponder::bind(&config, self.config.app_id) {
            Ok(responder) => Some(responder),
            Err(e) => {
                tracing::warn!("Discovery disabled: {}", e);
                None
            }
        }
    }

    /// Accepts connections until the listener would block.
    pub(crate) fn accept_pending(&mut self) {
        loop {
            let accepted = match self.sessions.primary().and_then(Session::listener) {
                Some(listener) => listener.accept(),
                None => return,
            };

            match accepted {
                Ok((stream, addr)) => self.admit(stream, addr),
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    if let Some(primary) = self.sessions.primary_mut() {
                        primary.readable = false;
                    }
                    return;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    // Stays readable, so the next tick retries.
                    tracing::warn!("Accept failed: {}", e);
                    return;
                }
            }
        }
    }

    /// Gives a new connection a slot, its handshake and the current roster.
    fn admit(&mut self, stream: TcpStream, addr: SocketAddr) {
        if let Err(e) = stream.set_nodelay(self.config.tcp_nodelay) {
            tracing::debug!("set_nodelay for {} failed: {}", addr, e);
        }

        let id = match self.sessions.allocate(stream, self.poll.registry()) {
            Ok(id) => id,
            Err((e, stream)) => {
                tracing::warn!("Rejecting {}: {}", addr, e);
                if let Some(stream) = stream {
                    reject(stream);
                }
                return;
            }
        };

        let handshake = Handshake::new(self.config.app_id, id).encode();
        let mut roster = vec![PeerId::HUB];
        roster.extend(self.sessions.peer_ids().into_iter().filter(|peer| *peer != id));
        let header = event_header(PeerId::HUB);

        if let Some(session) = self.sessions.get_mut(id) {
            let queued = session.queue_bytes(&handshake).and_then(|()| {
                roster.iter().try_for_each(|peer| {
                    session.queue_record(&header, &ConnectionEvent::joined(*peer).encode())
                })
            });
            if let Err(e) = queued {
                tracing::warn!("Roster for {} does not fit its buffer: {}", id, e);
                session.overflowed = true;
            }
        }

        tracing::info!("Peer {} joined from {}", id, addr);
        self.announce(ConnectionEvent::joined(id), Some(id));
    }

    /// Sends a connection event to every peer except `skip`, and locally.
    fn announce(&mut self, event: ConnectionEvent, skip: Option<PeerId>) {
        let header = event_header(PeerId::HUB);
        let payload = event.encode();
        for peer in self.sessions.peer_ids() {
            if Some(peer) != skip {
                let _ = self.queue_to_peer(peer, &header, &payload);
            }
        }
        self.deliver_event(PeerId::HUB, event);
    }

    /// Closes a peer's session and announces its departure, once.
    pub(crate) fn release_peer(&mut self, id: PeerId) {
        if self.sessions.release(id, self.poll.registry()) {
            tracing::info!("Peer {} left", id);
            self.announce(ConnectionEvent::left(id), None);
        }
    }

    /// Forwards a record received from peer `from`.
    pub(crate) fn relay(&mut self, from: PeerId, mut record: Record) {
        record.header.from = from;
        let header = record.header;

        if header.type_tag == CONNECTION_EVENT_TAG {
            tracing::debug!("Dropping reserved-tag record from {}", from);
            return;
        }

        if header.is_broadcast() {
            for peer in self.sessions.peer_ids() {
                if peer != from {
                    let _ = self.queue_to_peer(peer, &header, &record.payload);
                }
            }
        } else if header.to == self.self_id {
            // Addressed to the hub itself.
        } else if self.sessions.is_connected(header.to) {
            let _ = self.queue_to_peer(header.to, &header, &record.payload);
            if !self.config.observe_relayed {
                return;
            }
        } else {
            tracing::debug!(
                "Dropping record from {} for unknown peer {}",
                from,
                header.to
            );
            return;
        }

        tracing::trace!(
            "Relayed tag={:#010x} {} -> {} ({} bytes)",
            header.type_tag,
            from,
            header.to,
            record.payload.len()
        );
        self.deliver(record);
    }
}
