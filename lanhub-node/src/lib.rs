//! # lanhub Node
//!
//! Hub and client engine for lanhub.
//!
//! One process runs the hub: it listens for TCP connections, gives every
//! client a slot and a [`PeerId`](lanhub_core::PeerId), and relays records
//! between them. Clients connect to the hub (optionally after finding it
//! through multicast discovery) and exchange records through it.
//!
//! This crate provides:
//! - [`Node`] - the public endpoint, driven by [`Node::poll`]
//! - [`NodeConfig`] - builder-style configuration
//! - [`ReceiveHandler`], [`ConnectionHandler`] and [`Responder`] - handler
//!   traits, implemented for closures
//! - [`SessionTable`] - the fixed slot table behind the hub

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod node;
pub mod session;

mod client;
mod engine;
mod hub;
mod reactor;

pub use config::NodeConfig;
pub use dispatcher::Dispatcher;
pub use error::NodeError;
pub use handler::{ConnectionHandler, ReceiveHandler, Responder};
pub use node::Node;
pub use session::{Session, SessionRole, SessionTable};
