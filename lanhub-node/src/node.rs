//! Public node API.

use crate::config::NodeConfig;
use crate::dispatcher::Dispatcher;
use crate::engine::{Engine, Role};
use crate::error::NodeError;
use crate::handler::{ConnectionHandler, ReceiveHandler, Responder};
use lanhub_core::{ConnectionEvent, PeerId, RecordHeader};
use lanhub_transport::udp::find_server;
use std::net::SocketAddr;
use std::time::Duration;

/// A lanhub endpoint, either the hub or one of its clients.
///
/// A node is single-threaded: nothing happens between calls to
/// [`Node::poll`], and every handler runs on the calling thread from inside
/// `poll` (or from inside the send or start call that caused a local
/// delivery).
///
/// # Example
/// ```no_run
/// use lanhub_node::{Node, NodeConfig};
/// use lanhub_core::type_tag;
///
/// const CHAT: u32 = type_tag("chat");
///
/// let mut node = Node::new(NodeConfig::new(42, 9000))?;
/// node.on_receive(|header, payload, _| {
///     println!("{}: {}", header.from, String::from_utf8_lossy(payload));
/// });
/// node.start_server()?;
/// node.send(CHAT, b"hello")?;
/// while node.poll() {
///     std::thread::sleep(std::time::Duration::from_millis(1));
/// }
/// # Ok::<(), lanhub_node::NodeError>(())
/// ```
pub struct Node {
    engine: Engine,
    dispatcher: Dispatcher,
}

impl Node {
    /// Creates an idle node.
    ///
    /// # Errors
    /// Returns [`NodeError::Config`] if the config does not validate, or an
    /// IO error if the OS poller cannot be created.
    pub fn new(config: NodeConfig) -> Result<Self, NodeError> {
        Ok(Self {
            engine: Engine::new(config)?,
            dispatcher: Dispatcher::new(),
        })
    }

    /// Sets the application id and hub port for the next start.
    ///
    /// # Errors
    /// Returns [`NodeError::AlreadyStarted`] while running, or
    /// [`NodeError::Config`] if the port leaves no room for discovery.
    pub fn initialize(&mut self, app_id: u32, port: u16) -> Result<(), NodeError> {
        if self.engine.is_started() {
            return Err(NodeError::AlreadyStarted);
        }
        let config = NodeConfig {
            app_id,
            port,
            ..self.engine.config.clone()
        };
        config.validate()?;
        self.engine.config = config;
        Ok(())
    }

    /// Returns the active configuration.
    #[must_use]
    pub fn config(&self) -> &NodeConfig {
        &self.engine.config
    }

    /// Looks for a hub running this node's application id.
    ///
    /// Blocks for at most `timeout`. Returns `None` when nothing answers or
    /// discovery is unavailable on this host.
    #[must_use]
    pub fn find_server(&self, timeout: Duration) -> Option<SocketAddr> {
        let config = self.engine.config.discovery_config()?;
        match find_server(&config, self.engine.config.app_id, timeout) {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!("Discovery failed: {}", e);
                None
            }
        }
    }

    /// Starts as the hub.
    ///
    /// # Errors
    /// Returns [`NodeError::AlreadyStarted`] if running, or
    /// [`NodeError::Startup`] if the listener cannot be set up.
    pub fn start_server(&mut self) -> Result<(), NodeError> {
        let result = self.engine.start_hub();
        self.drain();
        result
    }

    /// Starts as a client of the hub at `addr`.
    ///
    /// # Errors
    /// Returns [`NodeError::AlreadyStarted`] if running, or
    /// [`NodeError::Startup`] if the hub cannot be reached, turns the
    /// connection away, or fails the handshake.
    pub fn start_client(&mut self, addr: SocketAddr) -> Result<(), NodeError> {
        let result = self.engine.start_client(addr);
        self.drain();
        result
    }

    /// Closes every connection. The node can be started again afterwards.
    pub fn shutdown(&mut self) {
        self.engine.stop();
        self.drain();
    }

    /// Broadcasts a record to every other node; this node gets a copy too.
    ///
    /// # Errors
    /// Returns [`NodeError::NotStarted`], [`NodeError::ReservedTag`],
    /// [`NodeError::RecordTooLarge`], or on a client
    /// [`NodeError::BufferOverflow`] when the link to the hub is backed up.
    pub fn send(&mut self, type_tag: u32, payload: &[u8]) -> Result<(), NodeError> {
        let result = self.engine.send(PeerId::BROADCAST, type_tag, payload);
        self.drain();
        result
    }

    /// Sends a record to a single node.
    ///
    /// Clients route everything through the hub. On the hub an unknown `to`
    /// fails with [`NodeError::UnknownPeer`]; a peer whose buffer overflows is
    /// disconnected on the next poll.
    ///
    /// # Errors
    /// As [`Node::send`], plus [`NodeError::UnknownPeer`] on the hub.
    pub fn send_to(&mut self, to: PeerId, type_tag: u32, payload: &[u8]) -> Result<(), NodeError> {
        let result = self.engine.send(to, type_tag, payload);
        self.drain();
        result
    }

    /// Runs one non-blocking tick of the event loop and dispatches what it
    /// delivered.
    ///
    /// Returns false when the node is not running, including right after its
    /// primary socket failed.
    pub fn poll(&mut self) -> bool {
        let alive = self.engine.poll_once();
        self.drain();
        alive
    }

    /// Registers the handler for application records, replacing any other.
    pub fn register_receive_handler<H: ReceiveHandler + 'static>(&mut self, handler: H) {
        self.dispatcher.set_receive(handler);
    }

    /// Registers the handler for connection events, replacing any other.
    pub fn register_connection_handler<H: ConnectionHandler + 'static>(&mut self, handler: H) {
        self.dispatcher.set_connection(handler);
    }

    /// Registers a closure as the receive handler.
    pub fn on_receive<F>(&mut self, handler: F)
    where
        F: FnMut(&RecordHeader, &[u8], &mut dyn Responder) + 'static,
    {
        self.dispatcher.set_receive(handler);
    }

    /// Registers a closure as the connection handler.
    pub fn on_connection<F>(&mut self, handler: F)
    where
        F: FnMut(ConnectionEvent, &mut dyn Responder) + 'static,
    {
        self.dispatcher.set_connection(handler);
    }

    /// Returns true while running as the hub.
    #[must_use]
    pub fn is_server(&self) -> bool {
        self.engine.role == Role::Hub
    }

    /// Returns true while running in either role.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.engine.is_started()
    }

    /// Returns this node's id: 0 on the hub, the assigned id on a client,
    /// [`PeerId::UNASSIGNED`] when idle.
    #[must_use]
    pub fn self_id(&self) -> PeerId {
        self.engine.self_id
    }

    /// Returns the local address of the listener (hub) or the link (client).
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        let primary = self.engine.sessions.primary()?;
        match primary.listener() {
            Some(listener) => listener.local_addr().ok(),
            None => primary.stream()?.local_addr().ok(),
        }
    }

    /// Returns the ids of the other nodes known to be connected.
    ///
    /// The hub reports its peers; a client reports the hub and the peers it
    /// has been told about.
    #[must_use]
    pub fn connected_peers(&self) -> Vec<PeerId> {
        self.engine.connected_peers()
    }

    fn drain(&mut self) {
        while let Some(record) = self.engine.inbox.pop_front() {
            self.dispatcher.dispatch(&record, &mut self.engine);
        }
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.engine.stop();
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("role", &self.engine.role)
            .field("self_id", &self.engine.self_id)
            .field("peers", &self.engine.sessions.peer_count())
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}
