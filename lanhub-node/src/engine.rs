//! Shared engine state and send paths for both roles.

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::handler::Responder;
use crate::session::SessionTable;
use bytes::Bytes;
use lanhub_core::{CONNECTION_EVENT_TAG, ConnectionEvent, PeerId, Record, RecordHeader};
use lanhub_transport::tcp::RecordCodec;
use lanhub_transport::udp::DiscoveryResponder;
use mio::{Events, Poll, Token};
use std::collections::{BTreeSet, VecDeque};

/// Poll token of the hub's discovery socket; session tokens are slot indices.
pub(crate) const DISCOVERY_TOKEN: Token = Token(usize::MAX);

/// Which side of the star this node is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Role {
    Idle,
    Hub,
    Client,
}

/// Everything a node owns except its handlers.
///
/// Records due for local delivery are queued in `inbox`; the owning
/// [`crate::Node`] drains it into the dispatcher after every operation, which
/// lets handlers send through the engine while a delivery is in progress.
pub(crate) struct Engine {
    pub(crate) config: NodeConfig,
    pub(crate) poll: Poll,
    pub(crate) events: Events,
    pub(crate) sessions: SessionTable,
    pub(crate) codec: RecordCodec,
    pub(crate) role: Role,
    pub(crate) discovery: Option<DiscoveryResponder>,
    pub(crate) self_id: PeerId,
    /// Other nodes a client has heard of through connection events.
    pub(crate) roster: BTreeSet<PeerId>,
    pub(crate) inbox: VecDeque<Record>,
}

impl Engine {
    pub(crate) fn new(config: NodeConfig) -> Result<Self, NodeError> {
        config.validate()?;
        Ok(Self {
            poll: Poll::new()?,
            events: Events::with_capacity(config.max_peers + 2),
            sessions: SessionTable::new(config.max_peers, config.buffer_capacity),
            codec: RecordCodec::for_buffer(config.buffer_capacity),
            role: Role::Idle,
            discovery: None,
            self_id: PeerId::UNASSIGNED,
            roster: BTreeSet::new(),
            inbox: VecDeque::new(),
            config,
        })
    }

    pub(crate) fn is_started(&self) -> bool {
        self.role != Role::Idle
    }

    /// Closes every socket and reports the node's own departure locally.
    pub(crate) fn stop(&mut self) {
        if self.role == Role::Idle {
            return;
        }

        self.sessions.clear(self.poll.registry());
        if let Some(mut responder) = self.discovery.take() {
            if let Err(e) = self.poll.registry().deregister(&mut responder) {
                tracing::debug!("deregister of discovery socket failed: {}", e);
            }
        }

        let me = self.self_id;
        tracing::info!("Node {} stopped", me);
        self.role = Role::Idle;
        self.self_id = PeerId::UNASSIGNED;
        self.roster.clear();
        self.deliver_event(me, ConnectionEvent::left(me));
    }

    /// Queues a record for this node's own handlers.
    pub(crate) fn deliver(&mut self, record: Record) {
        self.inbox.push_back(record);
    }

    pub(crate) fn deliver_event(&mut self, from: PeerId, event: ConnectionEvent) {
        let header = event_header(from);
        self.deliver(Record {
            header,
            payload: Bytes::copy_from_slice(&event.encode()),
        });
    }

    fn loopback(&mut self, header: RecordHeader, payload: &[u8]) {
        self.deliver(Record {
            header,
            payload: Bytes::copy_from_slice(payload),
        });
    }

    /// Queues a record on a peer's link; an overflowing peer is marked for
    /// disconnection at the end of the tick.
    pub(crate) fn queue_to_peer(
        &mut self,
        id: PeerId,
        header: &RecordHeader,
        payload: &[u8],
    ) -> Result<(), NodeError> {
        let session = self.sessions.get_mut(id).ok_or(NodeError::UnknownPeer(id))?;
        session.queue_record(header, payload).inspect_err(|e| {
            if !session.overflowed {
                tracing::warn!("Peer {} is not keeping up ({}), disconnecting", id, e);
            }
            session.overflowed = true;
        })
    }

    fn check_send(&self, type_tag: u32, payload: &[u8]) -> Result<i32, NodeError> {
        if self.role == Role::Idle {
            return Err(NodeError::NotStarted);
        }
        if type_tag == CONNECTION_EVENT_TAG {
            return Err(NodeError::ReservedTag(type_tag));
        }
        let max = self.config.max_payload();
        if payload.len() > max {
            return Err(NodeError::RecordTooLarge {
                size: payload.len(),
                max,
            });
        }
        i32::try_from(payload.len()).map_err(|_| NodeError::RecordTooLarge {
            size: payload.len(),
            max,
        })
    }

    /// Sends a record originating at this node.
    ///
    /// `to` is a peer id or any sentinel, which means broadcast.
    pub(crate) fn send(&mut self, to: PeerId, type_tag: u32, payload: &[u8]) -> Result<(), NodeError> {
        let size = self.check_send(type_tag, payload)?;
        let header = RecordHeader::new(type_tag, size, self.self_id, to);

        if header.to == self.self_id {
            self.loopback(header, payload);
            return Ok(());
        }

        match self.role {
            Role::Idle => Err(NodeError::NotStarted),
            Role::Hub => self.hub_send(header, payload),
            Role::Client => self.client_send(header, payload),
        }
    }

    fn hub_send(&mut self, header: RecordHeader, payload: &[u8]) -> Result<(), NodeError> {
        if header.is_broadcast() {
            for id in self.sessions.peer_ids() {
                // Overflowing peers are dropped at the end of the tick; the
                // broadcast still reaches everyone else.
                let _ = self.queue_to_peer(id, &header, payload);
            }
        } else {
            self.queue_to_peer(header.to, &header, payload)?;
        }
        tracing::trace!(
            "Hub sent tag={:#010x} to {} ({} bytes)",
            header.type_tag,
            header.to,
            payload.len()
        );
        self.loopback(header, payload);
        Ok(())
    }

    fn client_send(&mut self, header: RecordHeader, payload: &[u8]) -> Result<(), NodeError> {
        let link = self.sessions.primary_mut().ok_or(NodeError::NotStarted)?;
        link.queue_record(&header, payload)?;
        if header.is_broadcast() {
            self.loopback(header, payload);
        }
        Ok(())
    }

    /// Ids of the other nodes this node knows to be connected.
    pub(crate) fn connected_peers(&self) -> Vec<PeerId> {
        match self.role {
            Role::Idle => Vec::new(),
            Role::Hub => self.sessions.peer_ids(),
            Role::Client => self.roster.iter().copied().collect(),
        }
    }
}

impl Responder for Engine {
    fn send(&mut self, type_tag: u32, payload: &[u8]) -> Result<(), NodeError> {
        Engine::send(self, PeerId::BROADCAST, type_tag, payload)
    }

    fn send_to(&mut self, to: PeerId, type_tag: u32, payload: &[u8]) -> Result<(), NodeError> {
        Engine::send(self, to, type_tag, payload)
    }

    fn self_id(&self) -> PeerId {
        self.self_id
    }

    fn is_server(&self) -> bool {
        self.role == Role::Hub
    }
}

/// Header of a connection event record.
pub(crate) fn event_header(from: PeerId) -> RecordHeader {
    RecordHeader::new(
        CONNECTION_EVENT_TAG,
        ConnectionEvent::ENCODED_LENGTH as i32,
        from,
        PeerId::BROADCAST,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use lanhub_core::{ConnectStatus, type_tag};

    const CHAT: u32 = type_tag("chat");

    /// Hands the engine one end of a loopback connection as a new peer.
    fn admit_loopback(engine: &mut Engine, listener: &std::net::TcpListener) -> PeerId {
        let _client = std::net::TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (stream, _) = listener.accept().unwrap();
        stream.set_nonblocking(true).unwrap();
        let stream = mio::net::TcpStream::from_std(stream);
        engine
            .sessions
            .allocate(stream, engine.poll.registry())
            .unwrap()
    }

    fn engine() -> Engine {
        Engine::new(NodeConfig::new(7, 0).discovery(false).buffer_capacity(256)).unwrap()
    }

    #[test]
    fn test_new_engine_is_idle() {
        let engine = engine();
        assert!(!engine.is_started());
        assert_eq!(engine.self_id, PeerId::UNASSIGNED);
        assert!(engine.connected_peers().is_empty());
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let result = Engine::new(NodeConfig::new(7, 0).max_peers(0));
        assert!(matches!(result, Err(NodeError::Config { .. })));
    }

    #[test]
    fn test_send_requires_start() {
        let mut engine = engine();
        let err = engine.send(PeerId::BROADCAST, CHAT, b"hi").unwrap_err();
        assert!(matches!(err, NodeError::NotStarted));
        assert!(engine.inbox.is_empty());
    }

    #[test]
    fn test_send_checks_tag_and_size() {
        let mut engine = engine();
        engine.role = Role::Hub;
        engine.self_id = PeerId::HUB;

        let err = engine
            .send(PeerId::BROADCAST, CONNECTION_EVENT_TAG, b"x")
            .unwrap_err();
        assert!(matches!(err, NodeError::ReservedTag(_)));

        let err = engine
            .send(PeerId::BROADCAST, CHAT, &[0u8; 245])
            .unwrap_err();
        assert!(matches!(err, NodeError::RecordTooLarge { size: 245, max: 244 }));
        assert!(engine.inbox.is_empty());
    }

    #[test]
    fn test_hub_broadcast_without_peers_loops_back() {
        let mut engine = engine();
        engine.role = Role::Hub;
        engine.self_id = PeerId::HUB;

        engine.send(PeerId::BROADCAST, CHAT, b"hello").unwrap();
        let record = engine.inbox.pop_front().unwrap();
        assert_eq!(record.header.from, PeerId::HUB);
        assert_eq!(record.header.to, PeerId::BROADCAST);
        assert_eq!(&record.payload[..], b"hello");
    }

    #[test]
    fn test_hub_send_to_unknown_peer() {
        let mut engine = engine();
        engine.role = Role::Hub;
        engine.self_id = PeerId::HUB;

        let err = engine.send(PeerId::new(3), CHAT, b"hi").unwrap_err();
        assert!(matches!(err, NodeError::UnknownPeer(id) if id == PeerId::new(3)));
        assert!(engine.inbox.is_empty());
    }

    #[test]
    fn test_send_to_self_is_local_only() {
        let mut engine = engine();
        engine.role = Role::Client;
        engine.self_id = PeerId::new(2);

        engine.send(PeerId::new(2), CHAT, b"me").unwrap();
        assert_eq!(engine.inbox.len(), 1);
        assert_eq!(engine.inbox[0].header.to, PeerId::new(2));
    }

    #[test]
    fn test_stop_reports_left_once() {
        let mut engine = engine();
        engine.role = Role::Hub;
        engine.self_id = PeerId::HUB;

        engine.stop();
        engine.stop();

        assert_eq!(engine.inbox.len(), 1);
        let record = engine.inbox.pop_front().unwrap();
        assert_eq!(record.header.type_tag, CONNECTION_EVENT_TAG);
        let event = ConnectionEvent::decode(&record.payload).unwrap();
        assert_eq!(event.status, ConnectStatus::Left);
        assert_eq!(event.id, PeerId::HUB);
        assert!(!engine.is_started());
    }

    #[test]
    fn test_release_peer_twice_announces_once() {
        let mut engine = engine();
        engine.role = Role::Hub;
        engine.self_id = PeerId::HUB;
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let leaving = admit_loopback(&mut engine, &listener);
        let staying = admit_loopback(&mut engine, &listener);

        engine.release_peer(leaving);
        engine.release_peer(leaving);

        let lefts = engine
            .inbox
            .iter()
            .filter_map(|record| ConnectionEvent::decode(&record.payload).ok())
            .filter(|event| *event == ConnectionEvent::left(leaving))
            .count();
        assert_eq!(lefts, 1);
        assert_eq!(engine.connected_peers(), vec![staying]);

        // The remaining peer was told once as well.
        let queued = engine.sessions.get(staying).unwrap().outbound().len();
        assert_eq!(
            queued,
            RecordHeader::ENCODED_LENGTH + ConnectionEvent::ENCODED_LENGTH
        );
    }
}
