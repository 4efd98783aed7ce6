//! # Farthing Core
//!
//! Consensus encoding primitives shared by the farthing node crates:
//! - Little-endian byte reader/writer for the fixed wire layout
//! - CompactSize varints
//! - Double-SHA256 hashing for checksums and block header hashes
//! - Block header, raw block, and raw transaction types
//!
//! Everything here is deterministic byte-level plumbing; protocol
//! behavior lives in `farthing-p2p`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod block;
pub mod crypto;
pub mod error;
pub mod serialization;

// Re-export commonly used types at crate root
pub use block::{BlockHeader, RawBlock, RawTransaction};
pub use crypto::{checksum, sha256, sha256d};
pub use error::DecodeError;
pub use serialization::{ByteReader, ByteWriter, CompactSize};
