//! Hub-side TCP listener setup.

use mio::net::{TcpListener, TcpStream};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{Shutdown, SocketAddr};

/// Configuration for the hub's listening socket.
#[derive(Debug, Clone)]
pub struct TcpServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Listen backlog.
    pub backlog: i32,
    /// Enable TCP_NODELAY on accepted streams.
    pub tcp_nodelay: bool,
}

impl Default for TcpServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 27015)),
            backlog: 128,
            tcp_nodelay: true,
        }
    }
}

impl TcpServerConfig {
    /// Creates a new server config with the specified bind address.
    #[must_use]
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }

    /// Sets the listen backlog.
    #[must_use]
    pub fn backlog(mut self, backlog: i32) -> Self {
        self.backlog = backlog;
        self
    }

    /// Sets TCP_NODELAY for accepted streams.
    #[must_use]
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }
}

/// Binds a non-blocking listener ready to be registered with a `mio::Poll`.
///
/// # Errors
/// Returns IO error if the socket cannot be created, bound, or put into
/// listening state.
pub fn bind_listener(config: &TcpServerConfig) -> std::io::Result<TcpListener> {
    let socket = Socket::new(
        Domain::for_address(config.bind_addr),
        Type::STREAM,
        Some(Protocol::TCP),
    )?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&config.bind_addr.into())?;
    socket.listen(config.backlog)?;

    let listener: std::net::TcpListener = socket.into();
    Ok(TcpListener::from_std(listener))
}

/// Turns away a connection the hub has no slot for.
///
/// The write side is shut down first so the peer sees a clean end of stream
/// instead of a reset, then the socket is closed.
pub fn reject(stream: TcpStream) {
    if let Err(e) = stream.shutdown(Shutdown::Write) {
        tracing::warn!("shutdown of rejected connection failed: {}", e);
    }
    drop(stream);
}
