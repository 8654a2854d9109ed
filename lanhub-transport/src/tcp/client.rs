//! Client-side TCP link setup.
//!
//! Connecting is the one place a lanhub client blocks: it opens the stream,
//! waits (bounded) for the hub's identity handshake, and only then hands a
//! non-blocking stream to the event loop.

use crate::error::TransportError;
use lanhub_core::{Handshake, PeerId};
use mio::net::TcpStream;
use std::io::{ErrorKind, Read};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Configuration for a client link.
#[derive(Debug, Clone)]
pub struct TcpClientConfig {
    /// Hub address to connect to.
    pub server_addr: SocketAddr,
    /// Application id the hub must announce.
    pub app_id: u32,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Upper bound on the wait for the hub's handshake.
    pub handshake_timeout: Duration,
    /// Enable TCP_NODELAY.
    pub tcp_nodelay: bool,
}

impl Default for TcpClientConfig {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([127, 0, 0, 1], 27015)),
            app_id: 0,
            connect_timeout: Duration::from_secs(5),
            handshake_timeout: Duration::from_secs(2),
            tcp_nodelay: true,
        }
    }
}

impl TcpClientConfig {
    /// Creates a new client config for `server_addr` and `app_id`.
    #[must_use]
    pub fn new(server_addr: SocketAddr, app_id: u32) -> Self {
        Self {
            server_addr,
            app_id,
            ..Default::default()
        }
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

    /// Sets TCP_NODELAY option.
    #[must_use]
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }
}

/// Connects to a hub and performs the identity handshake.
///
/// On success the returned stream is non-blocking and positioned right after
/// the handshake, so the first bytes read from it belong to records.
///
/// # Errors
/// Returns [`TransportError::ConnectTimeout`] or [`TransportError::Io`] if the
/// connection cannot be opened, and [`TransportError::Handshake`] if the hub
/// closes early, stays silent past the timeout, or sends a handshake with the
/// wrong magic, application id, or peer id.
pub fn connect_and_handshake(
    config: &TcpClientConfig,
) -> Result<(TcpStream, Handshake), TransportError> {
    let mut stream =
        std::net::TcpStream::connect_timeout(&config.server_addr, config.connect_timeout)
            .map_err(|e| match e.kind() {
                ErrorKind::TimedOut => TransportError::ConnectTimeout,
                _ => TransportError::Io(e),
            })?;
    stream.set_nodelay(config.tcp_nodelay)?;
    let buf = read_handshake(&mut stream, config.handshake_timeout)?;

    let handshake = Handshake::decode(&buf).map_err(|e| TransportError::handshake(e.to_string()))?;
    if handshake.app_id != config.app_id {
        return Err(TransportError::handshake(format!(
            "application id mismatch: expected {}, hub runs {}",
            config.app_id, handshake.app_id
        )));
    }
    if !handshake.peer_id.is_assigned() || handshake.peer_id == PeerId::HUB {
        return Err(TransportError::handshake(format!(
            "hub assigned invalid peer id {}",
            handshake.peer_id
        )));
    }

    stream.set_read_timeout(None)?;
    stream.set_nonblocking(true)?;
    tracing::debug!(
        "Handshake with {} complete, assigned {}",
        config.server_addr,
        handshake.peer_id
    );

    Ok((TcpStream::from_std(stream), handshake))
}

/// Reads the hub's handshake, giving up once `timeout` has elapsed in total.
fn read_handshake(
    stream: &mut std::net::TcpStream,
    timeout: Duration,
) -> Result<[u8; Handshake::ENCODED_LENGTH], TransportError> {
    let deadline = Instant::now() + timeout;
    let mut buf = [0u8; Handshake::ENCODED_LENGTH];
    let mut filled = 0;
    while filled < buf.len() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(TransportError::handshake(
                "timed out waiting for the hub's handshake",
            ));
        }
        stream.set_read_timeout(Some(remaining))?;

        match stream.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(TransportError::handshake(
                    "hub closed the connection before the handshake",
                ));
            }
            Ok(n) => filled += n,
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                return Err(TransportError::handshake(
                    "timed out waiting for the hub's handshake",
                ));
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::TcpListener;
    use std::thread;

    /// Accepts one connection and lets `respond` drive it.
    fn serve_once<F>(respond: F) -> SocketAddr
    where
        F: FnOnce(std::net::TcpStream) + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            respond(stream);
        });
        addr
    }

    fn config(addr: SocketAddr, app_id: u32) -> TcpClientConfig {
        TcpClientConfig::new(addr, app_id).handshake_timeout(Duration::from_millis(300))
    }

    #[test]
    fn test_tcp_client_config_default() {
        let config = TcpClientConfig::default();
        assert_eq!(config.server_addr.port(), 27015);
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.handshake_timeout, Duration::from_secs(2));
        assert!(config.tcp_nodelay);
    }

    #[test]
    fn test_handshake_success() {
        let addr = serve_once(|mut stream| {
            stream
                .write_all(&Handshake::new(42, PeerId::new(3)).encode())
                .unwrap();
            stream.write_all(b"first record bytes").unwrap();
            thread::sleep(Duration::from_millis(200));
        });

        let (_stream, handshake) = connect_and_handshake(&config(addr, 42)).unwrap();
        assert_eq!(handshake.peer_id, PeerId::new(3));
        assert_eq!(handshake.app_id, 42);
    }

    #[test]
    fn test_app_id_mismatch() {
        let addr = serve_once(|mut stream| {
            stream
                .write_all(&Handshake::new(7, PeerId::new(1)).encode())
                .unwrap();
            thread::sleep(Duration::from_millis(200));
        });

        let err = connect_and_handshake(&config(addr, 42)).unwrap_err();
        assert!(matches!(err, TransportError::Handshake { .. }));
    }

    #[test]
    fn test_bad_magic() {
        let addr = serve_once(|mut stream| {
            stream.write_all(b"NOTLANHUB00000").unwrap();
            thread::sleep(Duration::from_millis(200));
        });

        let err = connect_and_handshake(&config(addr, 42)).unwrap_err();
        assert!(matches!(err, TransportError::Handshake { .. }));
    }

    #[test]
    fn test_short_handshake_then_close() {
        let addr = serve_once(|mut stream| {
            stream.write_all(&Handshake::new(42, PeerId::new(1)).encode()[..6]).unwrap();
        });

        let err = connect_and_handshake(&config(addr, 42)).unwrap_err();
        assert!(matches!(err, TransportError::Handshake { .. }));
    }

    #[test]
    fn test_silent_hub_times_out() {
        let addr = serve_once(|_stream| {
            thread::sleep(Duration::from_millis(800));
        });

        let err = connect_and_handshake(&config(addr, 42)).unwrap_err();
        assert!(matches!(err, TransportError::Handshake { .. }));
    }

    #[test]
    fn test_hub_id_is_not_assignable() {
        let addr = serve_once(|mut stream| {
            stream
                .write_all(&Handshake::new(42, PeerId::HUB).encode())
                .unwrap();
            thread::sleep(Duration::from_millis(200));
        });

        let err = connect_and_handshake(&config(addr, 42)).unwrap_err();
        assert!(matches!(err, TransportError::Handshake { .. }));
    }

    #[test]
    fn test_trickling_hub_cannot_stretch_the_timeout() {
        let addr = serve_once(|mut stream| {
            let handshake = Handshake::new(42, PeerId::new(1)).encode();
            for byte in &handshake[..] {
                if stream.write_all(&[*byte]).is_err() {
                    return;
                }
                thread::sleep(Duration::from_millis(100));
            }
        });

        let started = Instant::now();
        let err = connect_and_handshake(&config(addr, 42)).unwrap_err();
        assert!(matches!(err, TransportError::Handshake { .. }));
        assert!(started.elapsed() < Duration::from_millis(1000));
    }
}
