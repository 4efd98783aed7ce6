//! Block header and raw block/transaction types.
//!
//! The protocol engine treats block and transaction bodies as opaque
//! consensus blobs: it frames them, hashes them, and hands them to the
//! blockchain/mempool collaborators. Only the 80-byte header has a
//! field-level codec here, because header chains drive sync.

use bytes::Bytes;

use crate::crypto::sha256d;
use crate::error::DecodeError;
use crate::serialization::{ByteReader, ByteWriter};

/// An 80-byte block header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    /// Block version.
    pub version: i32,
    /// Double-SHA256 hash of the previous block header.
    pub prev_hash: [u8; 32],
    /// Merkle root of the block's transactions.
    pub merkle_root: [u8; 32],
    /// Block timestamp (Unix seconds).
    pub time: u32,
    /// Compact difficulty target.
    pub bits: u32,
    /// Proof-of-work nonce.
    pub nonce: u32,
}

impl BlockHeader {
    /// Serialized size of a header on the wire.
    pub const SIZE: usize = 80;

    /// Append the 80-byte encoding to `writer`.
    pub fn encode(&self, writer: &mut ByteWriter) {
        writer.write_i32_le(self.version);
        writer.write_bytes(&self.prev_hash);
        writer.write_bytes(&self.merkle_root);
        writer.write_u32_le(self.time);
        writer.write_u32_le(self.bits);
        writer.write_u32_le(self.nonce);
    }

    /// Decode an 80-byte header from `reader`.
    pub fn decode(reader: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            version: reader.read_i32_le()?,
            prev_hash: reader.read_array()?,
            merkle_root: reader.read_array()?,
            time: reader.read_u32_le()?,
            bits: reader.read_u32_le()?,
            nonce: reader.read_u32_le()?,
        })
    }

    /// Compute the block hash: double SHA-256 of the 80-byte encoding.
    pub fn hash(&self) -> [u8; 32] {
        let mut w = ByteWriter::with_capacity(Self::SIZE);
        self.encode(&mut w);
        sha256d(&w.into_bytes())
    }
}

/// A framed block: decoded header plus the undecoded transaction bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawBlock {
    /// The block header.
    pub header: BlockHeader,
    /// Serialized transactions (CompactSize count followed by each
    /// transaction), left for the blockchain collaborator to parse.
    pub txdata: Bytes,
}

impl RawBlock {
    /// Block hash, taken from the header.
    pub fn hash(&self) -> [u8; 32] {
        self.header.hash()
    }

    /// Total serialized size.
    pub fn size(&self) -> usize {
        BlockHeader::SIZE + self.txdata.len()
    }
}

/// A serialized transaction, opaque to the protocol engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawTransaction(pub Bytes);

impl RawTransaction {
    /// The serialized bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Serialized size.
    pub fn size(&self) -> usize {
        self.0.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_header() -> BlockHeader {
        BlockHeader {
            version: 1,
            prev_hash: [0x11; 32],
            merkle_root: [0x22; 32],
            time: 1700000000,
            bits: 0x1d00ffff,
            nonce: 0x2d_b4d116,
        }
    }

    #[test]
    fn test_header_roundtrip() {
        let header = test_header();
        let mut w = ByteWriter::new();
        header.encode(&mut w);
        let bytes = w.into_bytes();
        assert_eq!(bytes.len(), BlockHeader::SIZE);

        let mut r = ByteReader::new(&bytes);
        assert_eq!(BlockHeader::decode(&mut r).unwrap(), header);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_genesis_block_hash() {
        // Mainnet genesis header
        let raw = hex::decode(
            "0100000000000000000000000000000000000000000000000000000000000000\
             000000003ba3edfd7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa\
             4b1e5e4a29ab5f49ffff001d1dac2b7c",
        )
        .unwrap();
        let mut r = ByteReader::new(&raw);
        let header = BlockHeader::decode(&mut r).unwrap();

        let mut expected = hex::decode(
            "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f",
        )
        .unwrap();
        expected.reverse(); // hashes display in reverse byte order
        assert_eq!(header.hash().to_vec(), expected);
    }

    #[test]
    fn test_truncated_header() {
        let mut r = ByteReader::new(&[0u8; 79]);
        assert_eq!(BlockHeader::decode(&mut r), Err(DecodeError::UnexpectedEnd));
    }
}
