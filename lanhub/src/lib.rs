//! # lanhub
//!
//! Hub-and-spoke binary message transport for local networks.
//!
//! One process acts as the hub and every other process connects to it as a
//! client. Clients find the hub through UDP multicast discovery or connect to
//! a known address, receive a small integer [`PeerId`](core::PeerId), and then
//! exchange length-prefixed records that are either broadcast or addressed to
//! one peer. The hub relays everything and tells every node when peers join
//! or leave.
//!
//! Everything runs on the caller's thread: nothing moves until
//! [`Node::poll`](node::Node::poll) is called, and handlers run from inside it.
//!
//! ## Quick Start
//!
//! ```no_run
//! use lanhub::prelude::*;
//! use std::time::Duration;
//!
//! const CHAT: u32 = type_tag("chat");
//!
//! let mut node = Node::new(NodeConfig::new(42, 9000))?;
//! node.on_receive(|header, payload, _| {
//!     println!("{}: {}", header.from, String::from_utf8_lossy(payload));
//! });
//!
//! match node.find_server(Duration::from_millis(500)) {
//!     Some(hub) => node.start_client(hub)?,
//!     None => node.start_server()?,
//! }
//!
//! node.send(CHAT, b"hello")?;
//! while node.poll() {
//!     std::thread::sleep(Duration::from_millis(1));
//! }
//! # Ok::<(), NodeError>(())
//! ```
//!
//! ## Crate Organization
//!
//! - [`core`] - Peer ids, record headers, buffers, handshake and event layouts
//! - [`transport`] - Framing codec, TCP link setup, multicast discovery
//! - [`node`] - Hub and client engine

pub mod prelude;

/// Wire-level types.
pub mod core {
    pub use lanhub_core::*;
}

/// Network transport layer.
pub mod transport {
    pub use lanhub_transport::*;
}

/// Hub and client engine.
pub mod node {
    pub use lanhub_node::*;
}
