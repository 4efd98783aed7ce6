//! Collaborator contracts.
//!
//! Chain validation, address persistence, and mempool policy live
//! outside this crate. The reply engine consumes them through these
//! narrow traits; implementations are expected to answer quickly and
//! push any slow work off the caller's thread themselves.

use farthing_core::{BlockHeader, RawBlock, RawTransaction};

use crate::protocol::NetworkAddressWithTime;

/// What the chain made of a batch of received headers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeadersOutcome {
    /// All headers connected and were stored.
    Accepted,
    /// The headers did not connect to any known block.
    Unknown,
    /// At least one header failed validation.
    Invalid,
}

/// The blockchain consumed by the reply engine.
pub trait Blockchain: Send + Sync {
    /// Height of the best known chain tip.
    fn current_height(&self) -> i32;

    /// Height of the block whose hash is `prev_hash`, if known.
    fn find_height(&self, prev_hash: &[u8; 32]) -> Option<i32>;

    /// Compact difficulty target the next block must meet.
    fn next_difficulty_target(&self) -> u32;

    /// Validate and store a full block. `false` means the block was
    /// rejected.
    fn process_block(&self, block: &RawBlock) -> bool;

    /// Validate and store a batch of headers.
    fn process_headers(&self, headers: &[BlockHeader]) -> HeadersOutcome;

    /// Block locator for a getheaders request: headers sampled from
    /// the tip backwards, densest near the tip.
    fn header_locator(&self) -> Vec<BlockHeader>;

    /// Headers the requester is missing, given its locator hashes and
    /// stop hash. At most one message's worth.
    fn missing_headers(&self, known_hashes: &[[u8; 32]], stop_hash: &[u8; 32])
        -> Vec<BlockHeader>;
}

/// The peer address book consumed by the reply engine.
pub trait AddressBook: Send + Sync {
    /// Addresses persisted from an earlier run, if any. Used by the
    /// node at startup, not by the reply engine.
    fn read_persisted(&self) -> Option<Vec<NetworkAddressWithTime>>;

    /// Up to `max` gossip-worthy addresses, best first.
    fn query_candidates(&self, max: usize) -> Vec<NetworkAddressWithTime>;

    /// Record addresses learned from peer gossip.
    fn insert(&self, addresses: &[NetworkAddressWithTime]);
}

/// The mempool consumed by the reply engine.
pub trait Mempool: Send + Sync {
    /// Try to accept a relayed transaction. `false` means it was
    /// rejected or already known.
    fn try_add(&self, tx: &RawTransaction) -> bool;
}
