//! Session table.
//!
//! Slot 0 holds the node's primary socket: the listener on a hub, the link to
//! the hub on a client. Slots `1..=max_peers` hold accepted peers on a hub,
//! and a peer's id is its slot index. Freed slots are reused first in, first
//! out.

use crate::error::NodeError;
use lanhub_core::{FixedBuffer, PeerId, RecordHeader};
use mio::event::Source;
use mio::net::{TcpListener, TcpStream};
use mio::{Interest, Registry, Token};
use std::collections::VecDeque;
use std::io;
use std::net::Shutdown;

/// Index of the primary socket.
pub const PRIMARY_SLOT: usize = 0;

/// What a slot is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionRole {
    /// Unused slot.
    #[default]
    Free,
    /// The node's own listener or hub link.
    Primary,
    /// A peer accepted by the hub.
    Peer,
}

/// Socket owned by a session.
#[derive(Debug)]
pub enum Socket {
    /// Hub listener.
    Listener(TcpListener),
    /// Connected stream.
    Stream(TcpStream),
}

impl Socket {
    fn interest(&self) -> Interest {
        match self {
            Socket::Listener(_) => Interest::READABLE,
            Socket::Stream(_) => Interest::READABLE | Interest::WRITABLE,
        }
    }

    fn source(&mut self) -> &mut dyn Source {
        match self {
            Socket::Listener(listener) => listener,
            Socket::Stream(stream) => stream,
        }
    }
}

/// One slot of the session table.
///
/// Readiness flags are cached because the poller is edge-triggered: a flag
/// stays set until an operation on the socket returns `WouldBlock`.
#[derive(Debug, Default)]
pub struct Session {
    role: SessionRole,
    socket: Option<Socket>,
    inbound: FixedBuffer,
    outbound: FixedBuffer,
    pub(crate) readable: bool,
    pub(crate) writable: bool,
    pub(crate) faulted: bool,
    pub(crate) overflowed: bool,
}

impl Session {
    fn open(role: SessionRole, socket: Socket, buffer_capacity: usize) -> Self {
        let (inbound, outbound) = match socket {
            Socket::Listener(_) => (FixedBuffer::default(), FixedBuffer::default()),
            Socket::Stream(_) => (
                FixedBuffer::new(buffer_capacity),
                FixedBuffer::new(buffer_capacity),
            ),
        };
        // Bytes may already be waiting (a client's stream after the
        // handshake), so a fresh stream starts out ready both ways.
        let stream = matches!(socket, Socket::Stream(_));
        Self {
            role,
            socket: Some(socket),
            inbound,
            outbound,
            readable: stream,
            writable: stream,
            faulted: false,
            overflowed: false,
        }
    }

    /// Returns the slot's role.
    #[must_use]
    pub fn role(&self) -> SessionRole {
        self.role
    }

    /// Returns true if the slot holds a socket.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    /// Returns the listener, if this is a hub's primary slot.
    pub fn listener(&self) -> Option<&TcpListener> {
        match &self.socket {
            Some(Socket::Listener(listener)) => Some(listener),
            _ => None,
        }
    }

    /// Returns the stream, if the slot holds one.
    pub fn stream_mut(&mut self) -> Option<&mut TcpStream> {
        match &mut self.socket {
            Some(Socket::Stream(stream)) => Some(stream),
            _ => None,
        }
    }

    /// Returns the stream, if the slot holds one.
    pub fn stream(&self) -> Option<&TcpStream> {
        match &self.socket {
            Some(Socket::Stream(stream)) => Some(stream),
            _ => None,
        }
    }

    /// Returns bytes received but not yet decoded.
    pub fn inbound(&self) -> &FixedBuffer {
        &self.inbound
    }

    pub(crate) fn inbound_mut(&mut self) -> &mut FixedBuffer {
        &mut self.inbound
    }

    /// Returns bytes queued for sending.
    pub fn outbound(&self) -> &FixedBuffer {
        &self.outbound
    }

    /// Queues raw bytes for sending, all or nothing.
    ///
    /// # Errors
    /// Returns [`NodeError::BufferOverflow`] if the bytes do not fit.
    pub fn queue_bytes(&mut self, bytes: &[u8]) -> Result<(), NodeError> {
        self.outbound.try_extend(bytes)?;
        Ok(())
    }

    /// Queues one record for sending, all or nothing.
    ///
    /// # Errors
    /// Returns [`NodeError::BufferOverflow`] if the encoded record does not
    /// fit the spare outbound capacity.
    pub fn queue_record(&mut self, header: &RecordHeader, payload: &[u8]) -> Result<(), NodeError> {
        self.outbound.try_extend_record(header, payload)?;
        Ok(())
    }

    /// Performs at most one read into the inbound buffer.
    ///
    /// # Errors
    /// Propagates socket errors, including `WouldBlock`.
    pub(crate) fn read_once(&mut self) -> io::Result<usize> {
        match &mut self.socket {
            Some(Socket::Stream(stream)) => self.inbound.read_from(stream),
            _ => Ok(0),
        }
    }

    /// Performs at most one write from the outbound buffer.
    ///
    /// # Errors
    /// Propagates socket errors, including `WouldBlock`.
    pub(crate) fn write_once(&mut self) -> io::Result<usize> {
        match &mut self.socket {
            Some(Socket::Stream(stream)) => self.outbound.write_to(stream),
            _ => Ok(0),
        }
    }

    fn close(&mut self, registry: &Registry) {
        if let Some(mut socket) = self.socket.take() {
            if let Err(e) = registry.deregister(socket.source()) {
                tracing::debug!("deregister failed: {}", e);
            }
            if let Socket::Stream(stream) = &socket {
                // The peer may already be gone.
                let _ = stream.shutdown(Shutdown::Both);
            }
        }
        *self = Session::default();
    }
}

/// Fixed-size table of sessions indexed by slot.
#[derive(Debug)]
pub struct SessionTable {
    slots: Vec<Session>,
    free: VecDeque<usize>,
    buffer_capacity: usize,
}

impl SessionTable {
    /// Creates a table with one primary slot and `max_peers` peer slots.
    #[must_use]
    pub fn new(max_peers: usize, buffer_capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(max_peers + 1);
        slots.resize_with(max_peers + 1, Session::default);
        Self {
            slots,
            free: (1..=max_peers).collect(),
            buffer_capacity,
        }
    }

    /// Returns the number of peer slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len() - 1
    }

    /// Returns the number of connected peers.
    #[must_use]
    pub fn peer_count(&self) -> usize {
        self.capacity() - self.free.len()
    }

    /// Installs the primary socket in slot 0 and registers it.
    ///
    /// # Errors
    /// Returns IO error if registration fails; the slot stays free.
    pub fn install_primary(&mut self, mut socket: Socket, registry: &Registry) -> io::Result<()> {
        let interest = socket.interest();
        registry.register(socket.source(), Token(PRIMARY_SLOT), interest)?;
        self.slots[PRIMARY_SLOT] = Session::open(SessionRole::Primary, socket, self.buffer_capacity);
        Ok(())
    }

    /// Places an accepted stream in the next free slot and registers it.
    ///
    /// # Errors
    /// Returns [`NodeError::SlotsExhausted`] if every slot is taken, handing
    /// the stream back so it can be rejected, or IO error if registration
    /// fails.
    pub fn allocate(
        &mut self,
        stream: TcpStream,
        registry: &Registry,
    ) -> Result<PeerId, (NodeError, Option<TcpStream>)> {
        let Some(slot) = self.free.pop_front() else {
            return Err((
                NodeError::SlotsExhausted {
                    capacity: self.capacity(),
                },
                Some(stream),
            ));
        };
        let Some(id) = PeerId::from_slot(slot) else {
            self.free.push_front(slot);
            return Err((NodeError::startup("slot index exceeds the id range"), Some(stream)));
        };

        let mut socket = Socket::Stream(stream);
        let interest = socket.interest();
        if let Err(e) = registry.register(socket.source(), Token(slot), interest) {
            self.free.push_front(slot);
            return Err((NodeError::Io(e), None));
        }

        self.slots[slot] = Session::open(SessionRole::Peer, socket, self.buffer_capacity);
        Ok(id)
    }

    /// Closes a peer session and frees its slot.
    ///
    /// Returns false if `id` does not name a connected peer, so releasing
    /// twice is harmless.
    pub fn release(&mut self, id: PeerId, registry: &Registry) -> bool {
        let Some(session) = id.slot().and_then(|slot| self.peer_slot_mut(slot)) else {
            return false;
        };
        session.close(registry);
        if let Some(slot) = id.slot() {
            self.free.push_back(slot);
        }
        true
    }

    /// Closes every socket, the primary included, and frees all slots.
    pub fn clear(&mut self, registry: &Registry) {
        for session in &mut self.slots {
            session.close(registry);
        }
        self.free = (1..=self.capacity()).collect();
    }

    /// Returns the primary session if one is installed.
    pub fn primary(&self) -> Option<&Session> {
        self.slots
            .get(PRIMARY_SLOT)
            .filter(|s| s.role == SessionRole::Primary)
    }

    /// Returns the primary session if one is installed.
    pub fn primary_mut(&mut self) -> Option<&mut Session> {
        self.slots
            .get_mut(PRIMARY_SLOT)
            .filter(|s| s.role == SessionRole::Primary)
    }

    /// Returns the connected peer with this id.
    pub fn get(&self, id: PeerId) -> Option<&Session> {
        let slot = id.slot()?;
        if slot == PRIMARY_SLOT {
            return None;
        }
        self.slots.get(slot).filter(|s| s.role == SessionRole::Peer)
    }

    /// Returns the connected peer with this id.
    pub fn get_mut(&mut self, id: PeerId) -> Option<&mut Session> {
        self.peer_slot_mut(id.slot()?)
    }

    fn peer_slot_mut(&mut self, slot: usize) -> Option<&mut Session> {
        if slot == PRIMARY_SLOT {
            return None;
        }
        self.slots
            .get_mut(slot)
            .filter(|s| s.role == SessionRole::Peer)
    }

    /// Returns true if a peer with this id is connected.
    #[must_use]
    pub fn is_connected(&self, id: PeerId) -> bool {
        self.get(id).is_some()
    }

    /// Returns the session in `slot`, whatever its role.
    pub fn slot_mut(&mut self, slot: usize) -> Option<&mut Session> {
        self.slots.get_mut(slot)
    }

    /// Returns the ids of connected peers in slot order.
    #[must_use]
    pub fn peer_ids(&self) -> Vec<PeerId> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.role == SessionRole::Peer)
            .filter_map(|(slot, _)| PeerId::from_slot(slot))
            .collect()
    }

    /// Returns the slot indices of every open session, primary first.
    #[must_use]
    pub fn open_slots(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.role != SessionRole::Free)
            .map(|(slot, _)| slot)
            .collect()
    }
}
