//! Input builders for framing benchmarks.

use bytes::BytesMut;
use lanhub_core::{PeerId, RecordHeader};
use lanhub_transport::tcp::encode_record;

/// Builds a byte stream of `count` records, each carrying `payload_len`
/// bytes, as a hub would receive them from one peer.
///
/// # Panics
/// Panics if `payload_len` does not fit the wire size field.
#[must_use]
pub fn record_stream(type_tag: u32, count: usize, payload_len: usize) -> BytesMut {
    let size = i32::try_from(payload_len).expect("payload length exceeds i32::MAX");
    let payload = vec![0xA5u8; payload_len];
    let mut stream = BytesMut::with_capacity(count * (RecordHeader::ENCODED_LENGTH + payload_len));

    for i in 0..count {
        let to = if i % 2 == 0 {
            PeerId::BROADCAST
        } else {
            PeerId::new(2)
        };
        let header = RecordHeader::new(type_tag, size, PeerId::new(1), to);
        encode_record(&header, &payload, &mut stream).expect("header matches payload");
    }
    stream
}
