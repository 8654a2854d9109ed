//! Fixed-capacity byte buffers for session I/O.
//!
//! A [`FixedBuffer`] accumulates bytes up to a hard capacity. Appends that do
//! not fit are rejected as a whole, so framing already in the buffer is never
//! corrupted by a partial write. Bytes only ever leave from the front, so
//! the buffered length never exceeds the capacity.

use crate::error::{Error, Result};
use crate::header::RecordHeader;
use bytes::{Buf, BytesMut};
use std::io::{self, Read, Write};

/// Byte accumulation buffer with a fixed logical capacity.
#[derive(Debug, Default)]
pub struct FixedBuffer {
    data: BytesMut,
    capacity: usize,
}

impl FixedBuffer {
    /// Creates an empty buffer that will hold at most `capacity` bytes.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    /// Returns the fixed capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of buffered bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if no bytes are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the number of bytes that can still be appended.
    #[must_use]
    pub fn spare(&self) -> usize {
        self.capacity - self.data.len()
    }

    /// Returns true if no more bytes can be appended.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.spare() == 0
    }

    /// Returns the buffered bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Appends `src` as a whole or not at all.
    ///
    /// # Errors
    /// Returns [`Error::BufferOverflow`] if `src` does not fit; the buffer is
    /// left unchanged.
    pub fn try_extend(&mut self, src: &[u8]) -> Result<()> {
        if src.len() > self.spare() {
            return Err(Error::BufferOverflow {
                requested: src.len(),
                available: self.spare(),
            });
        }
        self.data.extend_from_slice(src);
        Ok(())
    }

    /// Appends one encoded record, header then payload, as a whole or not at
    /// all.
    ///
    /// # Errors
    /// Returns [`Error::PayloadMismatch`] if the header's payload size does not
    /// match `payload`, or [`Error::BufferOverflow`] if the record does not
    /// fit. The buffer is left unchanged in both cases.
    pub fn try_extend_record(&mut self, header: &RecordHeader, payload: &[u8]) -> Result<()> {
        if header.payload_len().ok() != Some(payload.len()) {
            return Err(Error::PayloadMismatch {
                declared: header.payload_size,
                actual: payload.len(),
            });
        }
        let requested = RecordHeader::ENCODED_LENGTH + payload.len();
        if requested > self.spare() {
            return Err(Error::BufferOverflow {
                requested,
                available: self.spare(),
            });
        }
        header.encode(&mut self.data);
        self.data.extend_from_slice(payload);
        Ok(())
    }

    /// Discards the first `n` bytes.
    pub fn consume(&mut self, n: usize) {
        self.data.advance(n.min(self.data.len()));
    }

    /// Drops all buffered bytes.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Performs a single read from `reader` into the spare capacity.
    ///
    /// Returns the number of bytes read; `Ok(0)` means either end of stream or
    /// a full buffer, so callers check [`FixedBuffer::is_full`] first.
    ///
    /// # Errors
    /// Propagates the reader's error, including `WouldBlock`.
    pub fn read_from<R: Read + ?Sized>(&mut self, reader: &mut R) -> io::Result<usize> {
        let start = self.data.len();
        self.data.resize(self.capacity, 0);
        let result = reader.read(&mut self.data[start..]);
        let filled = match &result {
            Ok(n) => *n,
            Err(_) => 0,
        };
        self.data.truncate(start + filled);
        result
    }

    /// Performs a single write of all buffered bytes to `writer`.
    ///
    /// Written bytes are removed from the front; an unsent tail stays buffered
    /// for the next attempt.
    ///
    /// # Errors
    /// Propagates the writer's error, including `WouldBlock`.
    pub fn write_to<W: Write + ?Sized>(&mut self, writer: &mut W) -> io::Result<usize> {
        let written = writer.write(&self.data)?;
        self.data.advance(written);
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::PeerId;

    /// Writer that accepts at most `limit` bytes per call.
    struct Trickle {
        limit: usize,
        sink: Vec<u8>,
    }

    impl Write for Trickle {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let n = buf.len().min(self.limit);
            self.sink.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_extend_within_capacity() {
        let mut buf = FixedBuffer::new(8);
        buf.try_extend(b"abcd").unwrap();
        assert_eq!(buf.len(), 4);
        assert_eq!(buf.spare(), 4);
        assert_eq!(buf.as_slice(), b"abcd");
    }

    #[test]
    fn test_overflow_leaves_contents_intact() {
        let mut buf = FixedBuffer::new(8);
        buf.try_extend(b"abcdef").unwrap();

        let err = buf.try_extend(b"xyz").unwrap_err();
        assert_eq!(
            err,
            Error::BufferOverflow {
                requested: 3,
                available: 2
            }
        );
        assert_eq!(buf.as_slice(), b"abcdef");

        buf.try_extend(b"gh").unwrap();
        assert!(buf.is_full());
    }

    #[test]
    fn test_read_from_respects_capacity() {
        let mut buf = FixedBuffer::new(4);
        let mut src: &[u8] = b"0123456789";

        assert_eq!(buf.read_from(&mut src).unwrap(), 4);
        assert!(buf.is_full());
        assert_eq!(buf.as_slice(), b"0123");
        assert_eq!(src, b"456789");
    }

    #[test]
    fn test_read_from_appends_after_existing() {
        let mut buf = FixedBuffer::new(16);
        buf.try_extend(b"ab").unwrap();
        let mut src: &[u8] = b"cd";

        assert_eq!(buf.read_from(&mut src).unwrap(), 2);
        assert_eq!(buf.as_slice(), b"abcd");
    }

    #[test]
    fn test_short_write_keeps_tail() {
        let mut buf = FixedBuffer::new(16);
        buf.try_extend(b"hello world").unwrap();
        let mut writer = Trickle {
            limit: 5,
            sink: Vec::new(),
        };

        assert_eq!(buf.write_to(&mut writer).unwrap(), 5);
        assert_eq!(buf.as_slice(), b" world");

        buf.write_to(&mut writer).unwrap();
        buf.write_to(&mut writer).unwrap();
        assert!(buf.is_empty());
        assert_eq!(writer.sink, b"hello world");
    }

    #[test]
    fn test_consume_and_clear() {
        let mut buf = FixedBuffer::new(8);
        buf.try_extend(b"abcdef").unwrap();
        buf.consume(2);
        assert_eq!(buf.as_slice(), b"cdef");
        assert_eq!(buf.spare(), 4);

        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), 8);
    }

    #[test]
    fn test_extend_record_is_all_or_nothing() {
        let mut buf = FixedBuffer::new(24);
        let header = RecordHeader::new(0xC0FFEE, 4, PeerId::new(1), PeerId::BROADCAST);

        buf.try_extend_record(&header, b"ping").unwrap();
        assert_eq!(buf.len(), 16);
        assert_eq!(RecordHeader::decode(buf.as_slice()).unwrap(), header);
        assert_eq!(&buf.as_slice()[12..], b"ping");

        let err = buf.try_extend_record(&header, b"ping").unwrap_err();
        assert_eq!(
            err,
            Error::BufferOverflow {
                requested: 16,
                available: 8
            }
        );
        assert_eq!(buf.len(), 16);
    }

    #[test]
    fn test_extend_record_rejects_size_mismatch() {
        let mut buf = FixedBuffer::new(64);
        let header = RecordHeader::new(0xC0FFEE, 10, PeerId::HUB, PeerId::new(2));

        assert_eq!(
            buf.try_extend_record(&header, b"short"),
            Err(Error::PayloadMismatch {
                declared: 10,
                actual: 5
            })
        );
        assert!(buf.is_empty());
    }
}
