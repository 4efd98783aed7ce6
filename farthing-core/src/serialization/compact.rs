//! CompactSize varints.
//!
//! Lengths and counts on the wire use the CompactSize encoding:
//! values below 0xfd are a single byte; larger values use a marker
//! byte (0xfd/0xfe/0xff) followed by a little-endian u16/u32/u64.
//! Decoding rejects over-long encodings so every value has exactly
//! one byte representation.

use crate::error::DecodeError;
use crate::serialization::{ByteReader, ByteWriter};

/// A CompactSize-encoded unsigned integer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct CompactSize(pub u64);

impl CompactSize {
    /// Number of bytes this value occupies on the wire.
    pub fn encoded_len(self) -> usize {
        match self.0 {
            0..=0xfc => 1,
            0xfd..=0xffff => 3,
            0x1_0000..=0xffff_ffff => 5,
            _ => 9,
        }
    }

    /// Append the encoding to `writer`.
    pub fn encode(self, writer: &mut ByteWriter) {
        match self.0 {
            v @ 0..=0xfc => writer.write_u8(v as u8),
            v @ 0xfd..=0xffff => {
                writer.write_u8(0xfd);
                writer.write_u16_le(v as u16);
            }
            v @ 0x1_0000..=0xffff_ffff => {
                writer.write_u8(0xfe);
                writer.write_u32_le(v as u32);
            }
            v => {
                writer.write_u8(0xff);
                writer.write_u64_le(v);
            }
        }
    }

    /// Decode a canonical CompactSize from `reader`.
    pub fn decode(reader: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let first = reader.read_u8()?;
        let value = match first {
            0xfd => {
                let v = u64::from(reader.read_u16_le()?);
                if v < 0xfd {
                    return Err(DecodeError::NonCanonicalVarint);
                }
                v
            }
            0xfe => {
                let v = u64::from(reader.read_u32_le()?);
                if v <= 0xffff {
                    return Err(DecodeError::NonCanonicalVarint);
                }
                v
            }
            0xff => {
                let v = reader.read_u64_le()?;
                if v <= 0xffff_ffff {
                    return Err(DecodeError::NonCanonicalVarint);
                }
                v
            }
            v => u64::from(v),
        };
        Ok(Self(value))
    }
}

impl From<u64> for CompactSize {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

impl From<CompactSize> for u64 {
    fn from(v: CompactSize) -> u64 {
        v.0
    }
}
