//! P2P error types.

use farthing_core::DecodeError;
use thiserror::Error;

/// P2P-specific errors.
#[derive(Debug, Error)]
pub enum P2pError {
    /// A message header was structurally invalid.
    #[error("malformed message header: {0}")]
    MalformedHeader(&'static str),

    /// The payload checksum did not match the header's claim.
    #[error("checksum mismatch for '{command}': expected {expected:02x?}, got {actual:02x?}")]
    ChecksumMismatch {
        /// Command the header named.
        command: String,
        /// Checksum carried in the header.
        expected: [u8; 4],
        /// Checksum computed over the payload.
        actual: [u8; 4],
    },

    /// A payload failed to decode.
    #[error("failed to decode '{command}' payload: {source}")]
    PayloadDecode {
        /// Command the header named.
        command: String,
        /// The underlying decode failure.
        source: DecodeError,
    },

    /// The peer's protocol version is below the supported minimum.
    #[error("unsupported protocol version {version} (minimum: {minimum})")]
    UnsupportedVersion {
        /// Version the peer advertised.
        version: i32,
        /// Lowest version this engine speaks.
        minimum: i32,
    },

    /// An operation referenced a connection the engine doesn't know.
    #[error("unknown connection: {0}")]
    UnknownConnection(u64),
}

/// Result type for P2P operations.
pub type P2pResult<T> = Result<T, P2pError>;
