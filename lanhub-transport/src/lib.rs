//! # lanhub Transport
//!
//! Network transport layer for lanhub sessions.
//!
//! This crate provides:
//! - [`tcp`] - record framing codec plus listener and handshake helpers
//! - [`udp`] - multicast discovery of a hub on the local network

pub mod error;
pub mod tcp;
pub mod udp;

pub use error::TransportError;
