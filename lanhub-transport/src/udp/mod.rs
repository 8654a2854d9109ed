//! UDP transport module.
//!
//! Provides the multicast probe/reply exchange that lets a client locate a hub
//! before opening the TCP link.

pub mod discovery;

pub use discovery::{DiscoveryConfig, DiscoveryResponder, find_server, is_probe_for};
