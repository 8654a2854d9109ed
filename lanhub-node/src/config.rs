//! Node configuration.

use crate::error::NodeError;
use lanhub_core::{ConnectionEvent, Handshake, RecordHeader};
use lanhub_transport::tcp::{TcpClientConfig, TcpServerConfig};
use lanhub_transport::udp::DiscoveryConfig;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Smallest session buffer that still fits a handshake followed by one
/// connection event record.
pub const MIN_BUFFER_CAPACITY: usize =
    Handshake::ENCODED_LENGTH + RecordHeader::ENCODED_LENGTH + ConnectionEvent::ENCODED_LENGTH;

/// Configuration shared by hub and client nodes.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Application id; hub and clients must agree on it.
    pub app_id: u32,
    /// TCP port of the hub. Discovery uses `port + 1`.
    pub port: u16,
    /// Local address the hub binds to.
    pub bind_addr: Ipv4Addr,
    /// Number of peer slots on the hub.
    pub max_peers: usize,
    /// Fixed capacity of every inbound and outbound session buffer.
    pub buffer_capacity: usize,
    /// Client connection timeout.
    pub connect_timeout: Duration,
    /// Upper bound on the client's wait for the hub handshake.
    pub handshake_timeout: Duration,
    /// Whether the hub answers discovery probes.
    pub discovery: bool,
    /// Multicast group used for discovery.
    pub discovery_group: Ipv4Addr,
    /// Interface used for discovery.
    pub discovery_interface: Ipv4Addr,
    /// Enable TCP_NODELAY on every link.
    pub tcp_nodelay: bool,
    /// Whether the hub delivers directed records between two other peers to
    /// its own handlers.
    pub observe_relayed: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            app_id: 0,
            port: 27015,
            bind_addr: Ipv4Addr::UNSPECIFIED,
            max_peers: 32,
            buffer_capacity: 16 * 1024,
            connect_timeout: Duration::from_secs(5),
            handshake_timeout: Duration::from_secs(2),
            discovery: true,
            discovery_group: Ipv4Addr::new(224, 0, 0, 1),
            discovery_interface: Ipv4Addr::UNSPECIFIED,
            tcp_nodelay: true,
            observe_relayed: true,
        }
    }
}

impl NodeConfig {
    /// Creates a config for `app_id` on `port`.
    #[must_use]
    pub fn new(app_id: u32, port: u16) -> Self {
        Self {
            app_id,
            port,
            ..Default::default()
        }
    }

    /// Sets the application id.
    #[must_use]
    pub fn app_id(mut self, app_id: u32) -> Self {
        self.app_id = app_id;
        self
    }

    /// Sets the hub port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the hub bind address.
    #[must_use]
    pub fn bind_addr(mut self, ip: Ipv4Addr) -> Self {
        self.bind_addr = ip;
        self
    }

    /// Sets the number of peer slots.
    #[must_use]
    pub fn max_peers(mut self, max: usize) -> Self {
        self.max_peers = max;
        self
    }

    /// Sets the session buffer capacity.
    #[must_use]
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the handshake timeout.
    #[must_use]
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Enables or disables the hub's discovery responder.
    #[must_use]
    pub fn discovery(mut self, enabled: bool) -> Self {
        self.discovery = enabled;
        self
    }

    /// Sets the discovery multicast group.
    #[must_use]
    pub fn discovery_group(mut self, group: Ipv4Addr) -> Self {
        self.discovery_group = group;
        self
    }

    /// Sets the discovery interface.
    #[must_use]
    pub fn discovery_interface(mut self, interface: Ipv4Addr) -> Self {
        self.discovery_interface = interface;
        self
    }

    /// Sets TCP_NODELAY option.
    #[must_use]
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }

    /// Sets whether the hub observes directed records it relays.
    #[must_use]
    pub fn observe_relayed(mut self, enabled: bool) -> Self {
        self.observe_relayed = enabled;
        self
    }

    /// Checks the config for values the engine cannot work with.
    ///
    /// # Errors
    /// Returns [`NodeError::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<(), NodeError> {
        if self.max_peers == 0 {
            return Err(NodeError::config("max_peers must be at least 1"));
        }
        if self.max_peers >= i16::MAX as usize {
            return Err(NodeError::config(format!(
                "max_peers must be below {}",
                i16::MAX
            )));
        }
        if self.buffer_capacity < MIN_BUFFER_CAPACITY {
            return Err(NodeError::config(format!(
                "buffer_capacity must be at least {MIN_BUFFER_CAPACITY} bytes"
            )));
        }
        if self.buffer_capacity > i32::MAX as usize {
            return Err(NodeError::config("buffer_capacity exceeds the wire size field"));
        }
        if self.connect_timeout.is_zero() || self.handshake_timeout.is_zero() {
            return Err(NodeError::config("timeouts must be non-zero"));
        }
        if self.discovery && self.port == u16::MAX {
            return Err(NodeError::config(
                "port leaves no room for the discovery port",
            ));
        }
        Ok(())
    }

    /// Returns the discovery port (`port + 1`).
    #[must_use]
    pub fn discovery_port(&self) -> Option<u16> {
        self.port.checked_add(1)
    }

    /// Largest payload a single record may carry.
    #[must_use]
    pub fn max_payload(&self) -> usize {
        self.buffer_capacity - RecordHeader::ENCODED_LENGTH
    }

    pub(crate) fn server_config(&self) -> TcpServerConfig {
        TcpServerConfig::new(SocketAddr::from((self.bind_addr, self.port)))
            .tcp_nodelay(self.tcp_nodelay)
    }

    pub(crate) fn client_config(&self, server_addr: SocketAddr) -> TcpClientConfig {
        TcpClientConfig::new(server_addr, self.app_id)
            .connect_timeout(self.connect_timeout)
            .handshake_timeout(self.handshake_timeout)
            .tcp_nodelay(self.tcp_nodelay)
    }

    pub(crate) fn discovery_config(&self) -> Option<DiscoveryConfig> {
        Some(
            DiscoveryConfig::for_tcp_port(self.port)?
                .group(self.discovery_group)
                .interface(self.discovery_interface),
        )
    }
}
