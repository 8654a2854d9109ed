//! Record framing codec for TCP.
//!
//! Records are self-delimiting: the 12-byte [`RecordHeader`] carries the
//! payload size, so no separate length prefix is needed.
//!
//! Frame format: `[RecordHeader (12 bytes, little-endian)][payload]`

use crate::error::TransportError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use lanhub_core::{FixedBuffer, PeerId, Record, RecordHeader};
use tokio_util::codec::{Decoder, Encoder};

/// Framing codec for lanhub records.
#[derive(Debug, Clone, Copy)]
pub struct RecordCodec {
    max_payload: usize,
}

impl RecordCodec {
    /// Creates a codec that accepts payloads up to `max_payload` bytes.
    ///
    /// # Arguments
    /// * `max_payload` - Maximum allowed payload size in bytes
    #[must_use]
    pub fn new(max_payload: usize) -> Self {
        Self { max_payload }
    }

    /// Creates a codec sized for a session buffer of `capacity` bytes.
    ///
    /// A record larger than the buffer could never be completed, so the
    /// payload limit is the capacity minus one header.
    #[must_use]
    pub fn for_buffer(capacity: usize) -> Self {
        Self::new(capacity.saturating_sub(RecordHeader::ENCODED_LENGTH))
    }

    /// Returns the maximum payload size.
    #[must_use]
    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    /// Decodes every complete record currently in `src` into `out`, in order.
    ///
    /// Consumed bytes are removed from the front of `src`; an incomplete
    /// trailing record stays buffered until more bytes arrive.
    ///
    /// # Errors
    /// Returns an error if a header is malformed or declares an oversized
    /// payload. Records decoded before the bad header are already in `out`;
    /// the stream cannot be resynchronised past it.
    pub fn decode_stream(
        &mut self,
        src: &mut BytesMut,
        out: &mut Vec<Record>,
    ) -> Result<(), TransportError> {
        while let Some(record) = self.decode(src)? {
            out.push(record);
        }
        Ok(())
    }

    /// Same as [`RecordCodec::decode_stream`], reading from a session buffer.
    ///
    /// # Errors
    /// Returns an error on the first malformed or oversized header, with the
    /// records before it already in `out`.
    pub fn decode_buffer(
        &mut self,
        src: &mut FixedBuffer,
        out: &mut Vec<Record>,
    ) -> Result<(), TransportError> {
        while let Some((header, length)) = self.frame(src.as_slice())? {
            let start = RecordHeader::ENCODED_LENGTH;
            let payload = Bytes::copy_from_slice(&src.as_slice()[start..start + length]);
            src.consume(start + length);
            out.push(Record { header, payload });
        }
        Ok(())
    }

    /// Returns the header and payload length of the first record in `src`
    /// once it is complete.
    fn frame(&self, src: &[u8]) -> Result<Option<(RecordHeader, usize)>, TransportError> {
        // Need the full header before anything else
        if src.len() < RecordHeader::ENCODED_LENGTH {
            return Ok(None);
        }

        let header = RecordHeader::decode(src)?;
        let length = header
            .payload_len()
            .map_err(|e| TransportError::invalid_frame(e.to_string()))?;

        if length > self.max_payload {
            return Err(TransportError::frame_too_large(length, self.max_payload));
        }

        // Session buffers have a fixed capacity, so never reserve here
        if src.len() < RecordHeader::ENCODED_LENGTH + length {
            return Ok(None);
        }
        Ok(Some((header, length)))
    }
}

impl Default for RecordCodec {
    fn default() -> Self {
        Self::for_buffer(16 * 1024)
    }
}

impl Decoder for RecordCodec {
    type Item = Record;
    type Error = TransportError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some((header, length)) = self.frame(src)? else {
            return Ok(None);
        };

        src.advance(RecordHeader::ENCODED_LENGTH);
        let payload = src.split_to(length).freeze();

        Ok(Some(Record { header, payload }))
    }
}

impl Encoder<&Record> for RecordCodec {
    type Error = TransportError;

    fn encode(&mut self, item: &Record, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.payload.len() > self.max_payload {
            return Err(TransportError::frame_too_large(
                item.payload.len(),
                self.max_payload,
            ));
        }
        encode_record(&item.header, &item.payload, dst)
    }
}

/// Appends one record to `dst`.
///
/// # Errors
/// Returns [`TransportError::InvalidFrame`] if the header's payload size does
/// not match `payload`.
pub fn encode_record(
    header: &RecordHeader,
    payload: &[u8],
    dst: &mut BytesMut,
) -> Result<(), TransportError> {
    let declared = header
        .payload_len()
        .map_err(|e| TransportError::invalid_frame(e.to_string()))?;
    if declared != payload.len() {
        return Err(TransportError::invalid_frame(format!(
            "header declares {} payload bytes, got {}",
            declared,
            payload.len()
        )));
    }

    dst.reserve(RecordHeader::ENCODED_LENGTH + payload.len());
    header.encode(dst);
    dst.put_slice(payload);
    Ok(())
}

/// Encodes a single record into a fresh buffer.
///
/// # Errors
/// Returns [`TransportError::FrameTooLarge`] if the payload does not fit the
/// 32-bit size field.
pub fn encode(
    type_tag: u32,
    from: PeerId,
    to: PeerId,
    payload: &[u8],
) -> Result<Bytes, TransportError> {
    let size = i32::try_from(payload.len())
        .map_err(|_| TransportError::frame_too_large(payload.len(), i32::MAX as usize))?;
    let header = RecordHeader::new(type_tag, size, from, to);

    let mut dst = BytesMut::with_capacity(RecordHeader::ENCODED_LENGTH + payload.len());
    encode_record(&header, payload, &mut dst)?;
    Ok(dst.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lanhub_core::type_tag;

    const CHAT: u32 = type_tag("chat");
    const POSITION: u32 = type_tag("position");

    #[test]
    fn test_two_records_in_one_read() {
        let mut codec = RecordCodec::new(1024);
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&encode(CHAT, PeerId::new(1), PeerId::BROADCAST, b"hello").unwrap());
        buf.extend_from_slice(
            &encode(POSITION, PeerId::new(2), PeerId::new(1), &[1, 2, 3, 4, 5, 6]).unwrap(),
        );

        let mut records = Vec::new();
        codec.decode_stream(&mut buf, &mut records).unwrap();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].header.type_tag, CHAT);
        assert_eq!(records[0].header.from, PeerId::new(1));
        assert_eq!(records[0].header.to, PeerId::BROADCAST);
        assert_eq!(&records[0].payload[..], b"hello");

        assert_eq!(records[1].header.type_tag, POSITION);
        assert_eq!(records[1].header.to, PeerId::new(1));
        assert_eq!(&records[1].payload[..], &[1, 2, 3, 4, 5, 6]);

        assert!(buf.is_empty());
    }

    #[test]
    fn test_record_split_across_reads() {
        let mut codec = RecordCodec::new(1024);
        let wire = encode(CHAT, PeerId::HUB, PeerId::BROADCAST, b"split payload").unwrap();
        let mut buf = BytesMut::new();

        let mut records = Vec::new();

        // Partial header
        buf.extend_from_slice(&wire[..7]);
        codec.decode_stream(&mut buf, &mut records).unwrap();
        assert!(records.is_empty());
        assert_eq!(buf.len(), 7);

        // Header complete, payload still short
        buf.extend_from_slice(&wire[7..16]);
        codec.decode_stream(&mut buf, &mut records).unwrap();
        assert!(records.is_empty());
        assert_eq!(buf.len(), 16);

        buf.extend_from_slice(&wire[16..]);
        codec.decode_stream(&mut buf, &mut records).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(&records[0].payload[..], b"split payload");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_trailing_partial_record_is_kept() {
        let mut codec = RecordCodec::new(1024);
        let first = encode(CHAT, PeerId::HUB, PeerId::BROADCAST, b"one").unwrap();
        let second = encode(CHAT, PeerId::HUB, PeerId::BROADCAST, b"two").unwrap();
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&first);
        buf.extend_from_slice(&second[..5]);

        let mut records = Vec::new();
        codec.decode_stream(&mut buf, &mut records).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(&buf[..], &second[..5]);
    }

    #[test]
    fn test_empty_payload() {
        let mut codec = RecordCodec::new(16);
        let mut buf = BytesMut::from(&encode(CHAT, PeerId::HUB, PeerId::BROADCAST, b"").unwrap()[..]);

        let record = codec.decode(&mut buf).unwrap().unwrap();
        assert!(record.payload.is_empty());
        assert_eq!(record.header.payload_size, 0);
    }

    #[test]
    fn test_frame_too_large() {
        let mut codec = RecordCodec::new(8);
        let mut buf = BytesMut::new();
        RecordHeader::new(CHAT, 64, PeerId::HUB, PeerId::BROADCAST).encode(&mut buf);

        assert!(matches!(
            codec.decode(&mut buf),
            Err(TransportError::FrameTooLarge { size: 64, max: 8 })
        ));
    }

    #[test]
    fn test_negative_size_is_invalid() {
        let mut codec = RecordCodec::new(1024);
        let mut buf = BytesMut::new();
        RecordHeader::new(CHAT, -1, PeerId::HUB, PeerId::BROADCAST).encode(&mut buf);

        assert!(matches!(
            codec.decode(&mut buf),
            Err(TransportError::InvalidFrame { .. })
        ));
    }

    #[test]
    fn test_encoder_rejects_oversized_payload() {
        let mut codec = RecordCodec::new(4);
        let record = Record::new(CHAT, PeerId::HUB, PeerId::BROADCAST, Bytes::from_static(b"too long"));
        let mut buf = BytesMut::new();

        assert!(codec.encode(&record, &mut buf).is_err());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_encoder_matches_encode() {
        let mut codec = RecordCodec::new(64);
        let record = Record::new(CHAT, PeerId::new(4), PeerId::new(2), Bytes::from_static(b"hi"));
        let mut buf = BytesMut::new();
        codec.encode(&record, &mut buf).unwrap();

        let expected = encode(CHAT, PeerId::new(4), PeerId::new(2), b"hi").unwrap();
        assert_eq!(&buf[..], &expected[..]);
    }

    #[test]
    fn test_for_buffer_limit() {
        assert_eq!(RecordCodec::for_buffer(1024).max_payload(), 1012);
        assert_eq!(RecordCodec::for_buffer(4).max_payload(), 0);
    }

    #[test]
    fn test_records_before_bad_header_are_kept() {
        let mut codec = RecordCodec::new(64);
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&encode(CHAT, PeerId::new(1), PeerId::BROADCAST, b"one").unwrap());
        buf.extend_from_slice(&encode(CHAT, PeerId::new(1), PeerId::BROADCAST, b"two").unwrap());
        RecordHeader::new(CHAT, 4096, PeerId::new(1), PeerId::BROADCAST).encode(&mut buf);

        let mut records = Vec::new();
        let result = codec.decode_stream(&mut buf, &mut records);
        assert!(matches!(
            result,
            Err(TransportError::FrameTooLarge { size: 4096, max: 64 })
        ));
        assert_eq!(records.len(), 2);
        assert_eq!(&records[1].payload[..], b"two");
    }

    #[test]
    fn test_decode_buffer_keeps_partial_tail() {
        let mut codec = RecordCodec::for_buffer(64);
        let first = encode(POSITION, PeerId::new(2), PeerId::HUB, &[9, 8, 7]).unwrap();
        let second = encode(CHAT, PeerId::new(2), PeerId::BROADCAST, b"later").unwrap();
        let mut buf = FixedBuffer::new(64);
        buf.try_extend(&first).unwrap();
        buf.try_extend(&second[..14]).unwrap();

        let mut records = Vec::new();
        codec.decode_buffer(&mut buf, &mut records).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].header.type_tag, POSITION);
        assert_eq!(&records[0].payload[..], &[9, 8, 7]);
        assert_eq!(buf.as_slice(), &second[..14]);

        buf.try_extend(&second[14..]).unwrap();
        codec.decode_buffer(&mut buf, &mut records).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(&records[1].payload[..], b"later");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_buffer_stops_at_negative_size() {
        let mut codec = RecordCodec::for_buffer(64);
        let mut buf = FixedBuffer::new(64);
        buf.try_extend(&encode(CHAT, PeerId::new(3), PeerId::HUB, b"ok").unwrap())
            .unwrap();
        let mut bad = BytesMut::new();
        RecordHeader::new(CHAT, -5, PeerId::new(3), PeerId::HUB).encode(&mut bad);
        buf.try_extend(&bad).unwrap();

        let mut records = Vec::new();
        let result = codec.decode_buffer(&mut buf, &mut records);
        assert!(matches!(result, Err(TransportError::InvalidFrame { .. })));
        assert_eq!(records.len(), 1);
        assert_eq!(&records[0].payload[..], b"ok");
    }
}
