//! Record header and record types.
//!
//! Every message on a lanhub TCP link is a [`RecordHeader`] followed by
//! `payload_size` raw payload bytes.

use crate::error::{Error, Result};
use crate::peer::PeerId;
use bytes::{BufMut, Bytes};

/// Header that precedes every record (12 bytes).
///
/// # Wire Format
/// ```text
/// +0:  typeTag     (u32, 4 bytes)
/// +4:  payloadSize (i32, 4 bytes)
/// +8:  from        (i16, 2 bytes)
/// +10: to          (i16, 2 bytes)
/// ```
///
/// All fields are little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Record type identifier, usually produced by [`crate::type_tag`].
    pub type_tag: u32,
    /// Number of payload bytes following the header.
    pub payload_size: i32,
    /// Sender of the record.
    pub from: PeerId,
    /// Destination, or [`PeerId::BROADCAST`].
    pub to: PeerId,
}

impl RecordHeader {
    /// Encoded length of the record header in bytes.
    pub const ENCODED_LENGTH: usize = 12;

    /// Creates a new record header.
    ///
    /// # Arguments
    /// * `type_tag` - Record type identifier
    /// * `payload_size` - Number of payload bytes
    /// * `from` - Sender id
    /// * `to` - Destination id
    #[must_use]
    pub const fn new(type_tag: u32, payload_size: i32, from: PeerId, to: PeerId) -> Self {
        Self {
            type_tag,
            payload_size,
            from,
            to,
        }
    }

    /// Decodes a header from the start of `buf`.
    ///
    /// # Errors
    /// Returns [`Error::BufferTooShort`] if fewer than 12 bytes are available.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::ENCODED_LENGTH {
            return Err(Error::too_short(Self::ENCODED_LENGTH, buf.len()));
        }
        Ok(Self {
            type_tag: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            payload_size: i32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
            from: PeerId::new(i16::from_le_bytes([buf[8], buf[9]])),
            to: PeerId::new(i16::from_le_bytes([buf[10], buf[11]])),
        })
    }

    /// Appends the encoded header to `dst`.
    pub fn encode<B: BufMut>(&self, dst: &mut B) {
        dst.put_u32_le(self.type_tag);
        dst.put_i32_le(self.payload_size);
        dst.put_i16_le(self.from.raw());
        dst.put_i16_le(self.to.raw());
    }

    /// Returns the payload length, rejecting negative sizes.
    ///
    /// # Errors
    /// Returns [`Error::InvalidPayloadSize`] for a negative size.
    pub fn payload_len(&self) -> Result<usize> {
        usize::try_from(self.payload_size).map_err(|_| Error::InvalidPayloadSize(self.payload_size))
    }

    /// Returns the total record size (header + payload).
    ///
    /// # Errors
    /// Returns [`Error::InvalidPayloadSize`] for a negative size.
    pub fn record_size(&self) -> Result<usize> {
        Ok(Self::ENCODED_LENGTH + self.payload_len()?)
    }

    /// Returns true if the record is addressed to every peer.
    #[must_use]
    pub const fn is_broadcast(&self) -> bool {
        self.to.is_broadcast() || !self.to.is_assigned()
    }
}

/// A decoded record: header plus owned payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Decoded header.
    pub header: RecordHeader,
    /// Payload bytes.
    pub payload: Bytes,
}

impl Record {
    /// Creates a record, deriving `payload_size` from the payload.
    ///
    /// # Panics
    /// Panics if the payload is larger than `i32::MAX` bytes.
    #[must_use]
    pub fn new(type_tag: u32, from: PeerId, to: PeerId, payload: Bytes) -> Self {
        let payload_size = i32::try_from(payload.len()).expect("payload exceeds i32::MAX");
        Self {
            header: RecordHeader::new(type_tag, payload_size, from, to),
            payload,
        }
    }

    /// Returns the encoded size of the record.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        RecordHeader::ENCODED_LENGTH + self.payload.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_encode_decode() {
        let header = RecordHeader::new(0xDEAD_BEEF, 24, PeerId::new(3), PeerId::BROADCAST);
        let mut buf = Vec::new();
        header.encode(&mut buf);

        assert_eq!(buf.len(), RecordHeader::ENCODED_LENGTH);
        assert_eq!(&buf[0..4], &0xDEAD_BEEFu32.to_le_bytes());
        assert_eq!(RecordHeader::decode(&buf).unwrap(), header);
    }

    #[test]
    fn test_header_too_short() {
        let err = RecordHeader::decode(&[0u8; 11]).unwrap_err();
        assert_eq!(err, Error::too_short(12, 11));
    }

    #[test]
    fn test_negative_payload_size() {
        let header = RecordHeader::new(1, -5, PeerId::HUB, PeerId::BROADCAST);
        assert_eq!(header.payload_len(), Err(Error::InvalidPayloadSize(-5)));
        assert!(header.record_size().is_err());
    }

    #[test]
    fn test_broadcast_detection() {
        assert!(RecordHeader::new(1, 0, PeerId::HUB, PeerId::BROADCAST).is_broadcast());
        assert!(RecordHeader::new(1, 0, PeerId::HUB, PeerId::UNASSIGNED).is_broadcast());
        assert!(!RecordHeader::new(1, 0, PeerId::HUB, PeerId::new(2)).is_broadcast());
    }

    #[test]
    fn test_record_new() {
        let record = Record::new(7, PeerId::new(1), PeerId::HUB, Bytes::from_static(b"abc"));
        assert_eq!(record.header.payload_size, 3);
        assert_eq!(record.encoded_len(), 15);
    }
}
