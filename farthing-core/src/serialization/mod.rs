//! Byte-level consensus encoding.
//!
//! The wire format is a fixed little-endian layout (ports are the one
//! big-endian exception), so this module provides a thin cursor-style
//! reader and writer instead of a general serialization framework.
//! Running out of bytes is an ordinary [`DecodeError::UnexpectedEnd`],
//! never a panic; the framer relies on that to detect partial reads.

mod compact;

pub use compact::CompactSize;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::DecodeError;

/// Growable buffer writer for consensus encoding.
#[derive(Debug, Default)]
pub struct ByteWriter {
    buf: BytesMut,
}

impl ByteWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self { buf: BytesMut::new() }
    }

    /// Create a writer with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self { buf: BytesMut::with_capacity(capacity) }
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Write a single byte.
    pub fn write_u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    /// Write a little-endian u16.
    pub fn write_u16_le(&mut self, v: u16) {
        self.buf.put_u16_le(v);
    }

    /// Write a big-endian u16 (used only for ports in network addresses).
    pub fn write_u16_be(&mut self, v: u16) {
        self.buf.put_u16(v);
    }

    /// Write a little-endian u32.
    pub fn write_u32_le(&mut self, v: u32) {
        self.buf.put_u32_le(v);
    }

    /// Write a little-endian i32.
    pub fn write_i32_le(&mut self, v: i32) {
        self.buf.put_i32_le(v);
    }

    /// Write a little-endian u64.
    pub fn write_u64_le(&mut self, v: u64) {
        self.buf.put_u64_le(v);
    }

    /// Write a little-endian i64.
    pub fn write_i64_le(&mut self, v: i64) {
        self.buf.put_i64_le(v);
    }

    /// Write raw bytes as-is.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    /// Write a CompactSize-prefixed byte string.
    pub fn write_var_bytes(&mut self, bytes: &[u8]) {
        CompactSize(bytes.len() as u64).encode(self);
        self.write_bytes(bytes);
    }

    /// Consume the writer and return the written bytes.
    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Cursor-style reader over a byte slice.
#[derive(Debug)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Create a reader positioned at the start of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Take the next `n` bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::UnexpectedEnd);
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    /// Take the next `N` bytes as a fixed-size array.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    /// Take all unread bytes.
    pub fn read_rest(&mut self) -> &'a [u8] {
        let out = &self.buf[self.pos..];
        self.pos = self.buf.len();
        out
    }

    /// Read a single byte.
    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Read a little-endian u16.
    pub fn read_u16_le(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    /// Read a big-endian u16 (used only for ports in network addresses).
    pub fn read_u16_be(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    /// Read a little-endian u32.
    pub fn read_u32_le(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    /// Read a little-endian i32.
    pub fn read_i32_le(&mut self) -> Result<i32, DecodeError> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    /// Read a little-endian u64.
    pub fn read_u64_le(&mut self) -> Result<u64, DecodeError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    /// Read a little-endian i64.
    pub fn read_i64_le(&mut self) -> Result<i64, DecodeError> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    /// Read a CompactSize-prefixed byte string, rejecting lengths over `max`.
    pub fn read_var_bytes(&mut self, max: u64, field: &'static str) -> Result<&'a [u8], DecodeError> {
        let len = CompactSize::decode(self)?.0;
        if len > max {
            return Err(DecodeError::OversizedField { field, value: len, max });
        }
        self.read_bytes(len as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_reader_roundtrip() {
        let mut w = ByteWriter::new();
        w.write_u8(0xab);
        w.write_u16_le(0x1234);
        w.write_u16_be(0x1234);
        w.write_u32_le(0xdeadbeef);
        w.write_i32_le(-7);
        w.write_u64_le(u64::MAX);
        w.write_i64_le(i64::MIN);
        let bytes = w.into_bytes();

        let mut r = ByteReader::new(&bytes);
        assert_eq!(r.read_u8().unwrap(), 0xab);
        assert_eq!(r.read_u16_le().unwrap(), 0x1234);
        assert_eq!(r.read_u16_be().unwrap(), 0x1234);
        assert_eq!(r.read_u32_le().unwrap(), 0xdeadbeef);
        assert_eq!(r.read_i32_le().unwrap(), -7);
        assert_eq!(r.read_u64_le().unwrap(), u64::MAX);
        assert_eq!(r.read_i64_le().unwrap(), i64::MIN);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_port_is_big_endian() {
        let mut w = ByteWriter::new();
        w.write_u16_be(8333);
        assert_eq!(&w.into_bytes()[..], &[0x20, 0x8d]);
    }

    #[test]
    fn test_reader_short_input() {
        let mut r = ByteReader::new(&[1, 2, 3]);
        assert_eq!(r.read_u32_le(), Err(DecodeError::UnexpectedEnd));
        // A failed read consumes nothing
        assert_eq!(r.remaining(), 3);
        assert_eq!(r.read_bytes(3).unwrap(), &[1, 2, 3]);
    }

    #[test]
    fn test_var_bytes_limit() {
        let mut w = ByteWriter::new();
        w.write_var_bytes(&[0u8; 10]);
        let bytes = w.into_bytes();

        let mut r = ByteReader::new(&bytes);
        let err = r.read_var_bytes(9, "blob").unwrap_err();
        assert!(matches!(err, DecodeError::OversizedField { field: "blob", value: 10, max: 9 }));
    }
}
