//! One tick of the event loop.
//!
//! A tick is a single zero-timeout poll followed by:
//! 1. fault handling,
//! 2. discovery probes and pending accepts (hub),
//! 3. one read per readable session, with every complete record routed,
//! 4. one write per writable session with queued bytes,
//! 5. disconnection of peers whose outbound buffer overflowed.
//!
//! Reads run before writes so records relayed in a tick leave in that tick.

use crate::engine::{DISCOVERY_TOKEN, Engine, Role};
use crate::session::PRIMARY_SLOT;
use lanhub_core::{PeerId, Record};
use std::io::ErrorKind;
use std::time::Duration;

impl Engine {
    /// Runs one tick. Returns false once the primary socket is gone.
    pub(crate) fn poll_once(&mut self) -> bool {
        if self.role == Role::Idle {
            return false;
        }

        match self.poll.poll(&mut self.events, Some(Duration::ZERO)) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::Interrupted => return true,
            Err(e) => {
                tracing::error!("Poll failed: {}", e);
                self.stop();
                return false;
            }
        }

        let mut discovery_ready = false;
        for event in self.events.iter() {
            if event.token() == DISCOVERY_TOKEN {
                discovery_ready = true;
                continue;
            }
            if let Some(session) = self.sessions.slot_mut(event.token().0) {
                session.readable |= event.is_readable() || event.is_read_closed();
                session.writable |= event.is_writable() || event.is_write_closed();
                session.faulted |= event.is_error();
            }
        }

        if self.primary_faulted() {
            tracing::error!("Primary socket of {} failed", self.self_id);
            self.stop();
            return false;
        }
        self.release_faulted_peers();

        if discovery_ready {
            if let Some(responder) = self.discovery.as_mut() {
                responder.service();
            }
        }
        if self.role == Role::Hub && self.sessions.primary().is_some_and(|p| p.readable) {
            self.accept_pending();
        }

        if !self.read_pass() || !self.write_pass() {
            self.stop();
            return false;
        }

        if self.role == Role::Hub {
            self.release_overflowed_peers();
        }
        true
    }

    fn primary_faulted(&self) -> bool {
        self.sessions.primary().is_none_or(|primary| primary.faulted)
    }

    fn release_faulted_peers(&mut self) {
        let faulted: Vec<PeerId> = self
            .sessions
            .peer_ids()
            .into_iter()
            .filter(|id| self.sessions.get(*id).is_some_and(|s| s.faulted))
            .collect();
        for id in faulted {
            tracing::warn!("Peer {} faulted", id);
            self.release_peer(id);
        }
    }

    fn release_overflowed_peers(&mut self) {
        // Left announcements can overflow further peers, so repeat until
        // the table is clean.
        loop {
            let overflowed: Vec<PeerId> = self
                .sessions
                .peer_ids()
                .into_iter()
                .filter(|id| self.sessions.get(*id).is_some_and(|s| s.overflowed))
                .collect();
            if overflowed.is_empty() {
                break;
            }
            for id in overflowed {
                self.release_peer(id);
            }
        }
    }

    /// Reads once from every readable stream and routes what was decoded.
    ///
    /// Returns false if the client's link to the hub is gone.
    fn read_pass(&mut self) -> bool {
        for slot in self.sessions.open_slots() {
            let Some(session) = self.sessions.slot_mut(slot) else {
                continue;
            };
            if session.stream().is_none() || !session.readable || session.inbound().is_full() {
                continue;
            }

            let closed = match session.read_once() {
                Ok(0) => Some("closed by peer".to_string()),
                Ok(_) => None,
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    session.readable = false;
                    continue;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => Some(e.to_string()),
            };

            let mut records = Vec::new();
            let failure = match closed {
                Some(reason) => Some(reason),
                None => self
                    .codec
                    .decode_buffer(session.inbound_mut(), &mut records)
                    .err()
                    .map(|e| e.to_string()),
            };

            // Records ahead of a framing error are still routed.
            for record in records {
                self.route(slot, record);
            }
            if let Some(reason) = failure {
                if !self.drop_link(slot, &reason) {
                    return false;
                }
            }
        }
        true
    }

    /// Flushes once to every writable stream with queued bytes.
    ///
    /// Returns false if the client's link to the hub is gone.
    fn write_pass(&mut self) -> bool {
        for slot in self.sessions.open_slots() {
            let Some(session) = self.sessions.slot_mut(slot) else {
                continue;
            };
            if session.stream().is_none() || !session.writable || session.outbound().is_empty() {
                continue;
            }

            match session.write_once() {
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::WouldBlock => session.writable = false,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    if !self.drop_link(slot, &e.to_string()) {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Handles a dead link. Returns false if it was the primary link.
    fn drop_link(&mut self, slot: usize, reason: &str) -> bool {
        if slot == PRIMARY_SLOT {
            tracing::error!("Link to hub lost: {}", reason);
            return false;
        }
        if let Some(id) = PeerId::from_slot(slot) {
            tracing::info!("Peer {} disconnected: {}", id, reason);
            self.release_peer(id);
        }
        true
    }

    fn route(&mut self, slot: usize, record: Record) {
        match self.role {
            Role::Hub => {
                if let Some(from) = PeerId::from_slot(slot) {
                    self.relay(from, record);
                }
            }
            Role::Client => self.accept_from_hub(record),
            Role::Idle => {}
        }
    }
}
