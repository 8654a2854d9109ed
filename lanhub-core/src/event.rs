//! Connection events.
//!
//! Session role transitions are reported as ordinary records carrying the
//! reserved [`CONNECTION_EVENT_TAG`], so they travel through the same framing
//! and ordering as application data.

use crate::error::{Error, Result};
use crate::peer::PeerId;
use crate::tag::type_tag;

/// Reserved type tag of connection event records.
pub const CONNECTION_EVENT_TAG: u32 = type_tag("lanhub::connection_event");

/// Whether a peer joined or left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectStatus {
    /// The peer left the session.
    Left = 0,
    /// The peer joined the session.
    Joined = 1,
}

impl TryFrom<u8> for ConnectStatus {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Left),
            1 => Ok(Self::Joined),
            other => Err(Error::InvalidStatus(other)),
        }
    }
}

/// A peer joined or left (3-byte payload).
///
/// # Wire Format
/// ```text
/// +0: id     (i16, 2 bytes)
/// +2: status (u8, 1 byte)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionEvent {
    /// Peer the event is about.
    pub id: PeerId,
    /// New status of the peer.
    pub status: ConnectStatus,
}

impl ConnectionEvent {
    /// Encoded length of the event payload in bytes.
    pub const ENCODED_LENGTH: usize = 3;

    /// Event for a peer that joined.
    #[must_use]
    pub const fn joined(id: PeerId) -> Self {
        Self {
            id,
            status: ConnectStatus::Joined,
        }
    }

    /// Event for a peer that left.
    #[must_use]
    pub const fn left(id: PeerId) -> Self {
        Self {
            id,
            status: ConnectStatus::Left,
        }
    }

    /// Encodes the event payload.
    #[must_use]
    pub fn encode(&self) -> [u8; Self::ENCODED_LENGTH] {
        let id = self.id.raw().to_le_bytes();
        [id[0], id[1], self.status as u8]
    }

    /// Decodes an event payload.
    ///
    /// # Errors
    /// Returns [`Error::BufferTooShort`] or [`Error::InvalidStatus`].
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::ENCODED_LENGTH {
            return Err(Error::too_short(Self::ENCODED_LENGTH, buf.len()));
        }
        Ok(Self {
            id: PeerId::new(i16::from_le_bytes([buf[0], buf[1]])),
            status: ConnectStatus::try_from(buf[2])?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_encode_decode() {
        let event = ConnectionEvent::left(PeerId::new(5));
        assert_eq!(ConnectionEvent::decode(&event.encode()).unwrap(), event);
    }

    #[test]
    fn test_invalid_status() {
        assert_eq!(
            ConnectionEvent::decode(&[1, 0, 9]),
            Err(Error::InvalidStatus(9))
        );
    }

    #[test]
    fn test_reserved_tag_is_stable() {
        assert_eq!(CONNECTION_EVENT_TAG, type_tag("lanhub::connection_event"));
        assert_ne!(CONNECTION_EVENT_TAG, type_tag("string"));
    }
}
