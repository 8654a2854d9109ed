//! Identity handshake and discovery probe layout.
//!
//! The hub sends one [`Handshake`] to every accepted peer before any record.
//! The same 14-byte shape travels over UDP as a discovery probe, with the peer
//! id left as [`PeerId::UNASSIGNED`].

use crate::error::{Error, Result};
use crate::peer::PeerId;

/// Magic prefix of handshakes and discovery probes.
pub const MAGIC: [u8; 8] = *b"LANHUB01";

/// Literal a hub sends back to a matching discovery probe.
pub const DISCOVERY_ACK: &[u8] = b"LANHUB01-HERE";

/// Identity handshake (14 bytes).
///
/// # Wire Format
/// ```text
/// +0:  magic  ([u8; 8])
/// +8:  appId  (u32, 4 bytes)
/// +12: peerId (i16, 2 bytes)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handshake {
    /// Application id both ends must agree on.
    pub app_id: u32,
    /// Id assigned to the receiving peer.
    pub peer_id: PeerId,
}

impl Handshake {
    /// Encoded length of the handshake in bytes.
    pub const ENCODED_LENGTH: usize = 14;

    /// Creates a handshake assigning `peer_id`.
    #[must_use]
    pub const fn new(app_id: u32, peer_id: PeerId) -> Self {
        Self { app_id, peer_id }
    }

    /// Creates a discovery probe for `app_id`.
    #[must_use]
    pub const fn probe(app_id: u32) -> Self {
        Self::new(app_id, PeerId::UNASSIGNED)
    }

    /// Encodes the handshake.
    #[must_use]
    pub fn encode(&self) -> [u8; Self::ENCODED_LENGTH] {
        let mut out = [0u8; Self::ENCODED_LENGTH];
        out[..8].copy_from_slice(&MAGIC);
        out[8..12].copy_from_slice(&self.app_id.to_le_bytes());
        out[12..14].copy_from_slice(&self.peer_id.raw().to_le_bytes());
        out
    }

    /// Decodes and validates the magic of a handshake.
    ///
    /// Trailing bytes beyond the handshake are ignored.
    ///
    /// # Errors
    /// Returns [`Error::BufferTooShort`] for a short read and
    /// [`Error::BadMagic`] when the prefix does not match.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::ENCODED_LENGTH {
            return Err(Error::too_short(Self::ENCODED_LENGTH, buf.len()));
        }
        let mut found = [0u8; 8];
        found.copy_from_slice(&buf[..8]);
        if found != MAGIC {
            return Err(Error::BadMagic { found });
        }
        Ok(Self {
            app_id: u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]),
            peer_id: PeerId::new(i16::from_le_bytes([buf[12], buf[13]])),
        })
    }
}
