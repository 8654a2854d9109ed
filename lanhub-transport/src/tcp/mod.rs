//! TCP transport module.
//!
//! Provides the record framing codec and the blocking setup steps of a TCP
//! link: binding the hub listener and the client's connect + handshake.

pub mod client;
pub mod framing;
pub mod server;

pub use client::{TcpClientConfig, connect_and_handshake};
pub use framing::{RecordCodec, encode, encode_record};
pub use server::{TcpServerConfig, bind_listener, reject};
