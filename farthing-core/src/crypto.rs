//! SHA-256 hashing utilities.

use sha2::{Digest, Sha256};

/// Compute SHA-256 of the input data.
#[inline]
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute double SHA-256 (`SHA256(SHA256(data))`) of the input data.
///
/// Used for block header hashes and message checksums.
#[inline]
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// Compute the 4-byte message checksum: the first four bytes of the
/// double SHA-256 of the payload.
#[inline]
pub fn checksum(payload: &[u8]) -> [u8; 4] {
    let hash = sha256d(payload);
    [hash[0], hash[1], hash[2], hash[3]]
}
