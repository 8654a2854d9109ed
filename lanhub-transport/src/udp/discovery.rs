//! UDP multicast hub discovery.
//!
//! A client multicasts one probe `{magic, app id}` to the discovery group; a
//! hub running the same application id answers with [`DISCOVERY_ACK`] sent
//! unicast to the probe's source. The source address of the first valid reply,
//! combined with the hub's TCP port, is the address to connect to.

use crate::error::TransportError;
use lanhub_core::{DISCOVERY_ACK, Handshake, PeerId};
use mio::event::Source;
use mio::net::UdpSocket;
use mio::{Interest, Registry, Token};
use socket2::{Domain, Protocol, Socket, Type};
use std::io::{self, ErrorKind};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};

/// Largest datagram the discovery exchange ever needs.
const DATAGRAM_SIZE: usize = 64;

/// Configuration for the discovery exchange.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Multicast group probes are sent to.
    pub group: Ipv4Addr,
    /// UDP port of the discovery socket (the hub's TCP port + 1).
    pub port: u16,
    /// TCP port reported back to the client.
    pub tcp_port: u16,
    /// Network interface to join the group on / send probes from.
    pub interface: Ipv4Addr,
    /// Multicast TTL of probes.
    pub ttl: u32,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            group: Ipv4Addr::new(224, 0, 0, 1),
            port: 27016,
            tcp_port: 27015,
            interface: Ipv4Addr::UNSPECIFIED,
            ttl: 1,
        }
    }
}

impl DiscoveryConfig {
    /// Creates the discovery config paired with a hub TCP port.
    ///
    /// Returns `None` if `tcp_port + 1` does not fit a port number.
    #[must_use]
    pub fn for_tcp_port(tcp_port: u16) -> Option<Self> {
        Some(Self {
            port: tcp_port.checked_add(1)?,
            tcp_port,
            ..Default::default()
        })
    }

    /// Sets the multicast group.
    #[must_use]
    pub fn group(mut self, group: Ipv4Addr) -> Self {
        self.group = group;
        self
    }

    /// Sets the multicast interface.
    #[must_use]
    pub fn interface(mut self, interface: Ipv4Addr) -> Self {
        self.interface = interface;
        self
    }
}

/// Returns true if `datagram` is a probe for `app_id`.
#[must_use]
pub fn is_probe_for(datagram: &[u8], app_id: u32) -> bool {
    match Handshake::decode(datagram) {
        Ok(probe) => probe.app_id == app_id && probe.peer_id == PeerId::UNASSIGNED,
        Err(_) => false,
    }
}

/// Hub-side responder answering discovery probes.
///
/// Registered with the hub's `mio::Poll`; call [`DiscoveryResponder::service`]
/// whenever it reports readable.
pub struct DiscoveryResponder {
    socket: UdpSocket,
    app_id: u32,
}

impl DiscoveryResponder {
    /// Binds the discovery port and joins the multicast group.
    ///
    /// # Errors
    /// Returns IO error if the socket cannot be bound and
    /// [`TransportError::Multicast`] if the group cannot be joined.
    pub fn bind(config: &DiscoveryConfig, app_id: u32) -> Result<Self, TransportError> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.set_nonblocking(true)?;
        socket.bind(&SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.port)).into())?;
        socket
            .join_multicast_v4(&config.group, &config.interface)
            .map_err(|e| {
                TransportError::multicast(format!(
                    "cannot join {} on {}: {}",
                    config.group, config.interface, e
                ))
            })?;

        tracing::info!(
            "Discovery listening on {}:{} for app {}",
            config.group,
            config.port,
            app_id
        );
        Ok(Self::from_std(socket.into(), app_id))
    }

    fn from_std(socket: std::net::UdpSocket, app_id: u32) -> Self {
        Self {
            socket: UdpSocket::from_std(socket),
            app_id,
        }
    }

    /// Returns the local address of the discovery socket.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Answers every probe currently queued on the socket.
    ///
    /// Returns the number of acknowledgements sent. Never blocks.
    pub fn service(&mut self) -> usize {
        let mut buf = [0u8; DATAGRAM_SIZE];
        let mut answered = 0;

        loop {
            let (len, src) = match self.socket.recv_from(&mut buf) {
                Ok(received) => received,
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::warn!("Discovery receive failed: {}", e);
                    break;
                }
            };

            if !is_probe_for(&buf[..len], self.app_id) {
                tracing::debug!("Ignoring {} byte datagram from {}", len, src);
                continue;
            }

            match self.socket.send_to(DISCOVERY_ACK, src) {
                Ok(_) => {
                    tracing::debug!("Answered discovery probe from {}", src);
                    answered += 1;
                }
                Err(e) => tracing::warn!("Discovery reply to {} failed: {}", src, e),
            }
        }

        answered
    }
}

impl Source for DiscoveryResponder {
    fn register(
        &mut self,
        registry: &Registry,
        token: Token,
        interests: Interest,
    ) -> io::Result<()> {
        self.socket.register(registry, token, interests)
    }

    fn reregister(
        &mut self,
        registry: &Registry,
        token: Token,
        interests: Interest,
    ) -> io::Result<()> {
        self.socket.reregister(registry, token, interests)
    }

    fn deregister(&mut self, registry: &Registry) -> io::Result<()> {
        self.socket.deregister(registry)
    }
}

/// Looks for a hub running `app_id` on the local network.
///
/// Sends one multicast probe and waits up to `timeout` for the first valid
/// acknowledgement. Malformed replies are skipped.
///
/// # Returns
/// `Ok(Some(addr))` with the hub's TCP address, `Ok(None)` on timeout.
///
/// # Errors
/// Returns IO error if the probe cannot be sent.
pub fn find_server(
    config: &DiscoveryConfig,
    app_id: u32,
    timeout: Duration,
) -> Result<Option<SocketAddr>, TransportError> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_multicast_ttl_v4(config.ttl)?;
    socket.set_multicast_loop_v4(true)?;
    if !config.interface.is_unspecified() {
        socket.set_multicast_if_v4(&config.interface)?;
    }
    socket.bind(&SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)).into())?;
    let socket: std::net::UdpSocket = socket.into();

    let group = SocketAddr::from((config.group, config.port));
    socket.send_to(&Handshake::probe(app_id).encode(), group)?;
    tracing::debug!("Sent discovery probe for app {} to {}", app_id, group);

    let deadline = Instant::now() + timeout;
    let mut buf = [0u8; DATAGRAM_SIZE];
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(None);
        }
        socket.set_read_timeout(Some(remaining))?;

        match socket.recv_from(&mut buf) {
            Ok((len, src)) if &buf[..len] == DISCOVERY_ACK => {
                let hub = SocketAddr::new(src.ip(), config.tcp_port);
                tracing::info!("Discovered hub for app {} at {}", app_id, hub);
                return Ok(Some(hub));
            }
            Ok((len, src)) => {
                tracing::debug!("Skipping malformed {} byte reply from {}", len, src);
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                return Ok(None);
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
}
