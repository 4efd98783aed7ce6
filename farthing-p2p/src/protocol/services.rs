//! Node service flags.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Bitfield of services a node advertises in its version message and
/// in address gossip.
///
/// Unknown bits are preserved rather than rejected; peers are free to
/// advertise services this engine has never heard of.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ServiceFlags(pub u64);

impl ServiceFlags {
    /// No services.
    pub const NONE: ServiceFlags = ServiceFlags(0);
    /// Full node serving the whole chain.
    pub const NETWORK: ServiceFlags = ServiceFlags(1 << 0);
    /// Answers UTXO queries (BIP 64).
    pub const GETUTXO: ServiceFlags = ServiceFlags(1 << 1);
    /// Supports bloom-filtered connections (BIP 111).
    pub const BLOOM: ServiceFlags = ServiceFlags(1 << 2);
    /// Supports segregated witness (BIP 144).
    pub const WITNESS: ServiceFlags = ServiceFlags(1 << 3);
    /// Supports Xtreme Thinblocks.
    pub const XTHIN: ServiceFlags = ServiceFlags(1 << 4);
    /// Serves compact block filters (BIP 157).
    pub const COMPACT_FILTERS: ServiceFlags = ServiceFlags(1 << 6);
    /// Serves only the last two days of blocks (BIP 159).
    pub const NETWORK_LIMITED: ServiceFlags = ServiceFlags(1 << 10);

    /// Whether every flag in `other` is set in `self`.
    pub fn contains(self, other: ServiceFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether any flag in `other` is set in `self`.
    pub fn intersects(self, other: ServiceFlags) -> bool {
        self.0 & other.0 != 0
    }

    /// Whether the node can serve historical blocks (full or limited).
    ///
    /// This is the gate for choosing a headers-sync peer.
    pub fn has_history(self) -> bool {
        self.intersects(ServiceFlags::NETWORK | ServiceFlags::NETWORK_LIMITED)
    }
}

impl BitOr for ServiceFlags {
    type Output = ServiceFlags;

    fn bitor(self, rhs: ServiceFlags) -> ServiceFlags {
        ServiceFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for ServiceFlags {
    fn bitor_assign(&mut self, rhs: ServiceFlags) {
        self.0 |= rhs.0;
    }
}

impl From<u64> for ServiceFlags {
    fn from(bits: u64) -> Self {
        ServiceFlags(bits)
    }
}

impl fmt::Display for ServiceFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_and_intersects() {
        let flags = ServiceFlags::NETWORK | ServiceFlags::WITNESS;
        assert_eq!(flags.0, 9);
        assert!(flags.contains(ServiceFlags::NETWORK));
        assert!(!flags.contains(ServiceFlags::NETWORK | ServiceFlags::BLOOM));
        assert!(flags.intersects(ServiceFlags::WITNESS | ServiceFlags::BLOOM));
        assert!(!flags.intersects(ServiceFlags::BLOOM));
    }

    #[test]
    fn test_has_history() {
        assert!(ServiceFlags::NETWORK.has_history());
        assert!(ServiceFlags::NETWORK_LIMITED.has_history());
        assert!((ServiceFlags::NETWORK | ServiceFlags::NETWORK_LIMITED).has_history());
        assert!(!(ServiceFlags::BLOOM | ServiceFlags::WITNESS | ServiceFlags::XTHIN).has_history());
        assert!(!ServiceFlags::NONE.has_history());
    }

    #[test]
    fn test_unknown_bits_preserved() {
        let flags = ServiceFlags::from(1 << 40 | 1);
        assert!(flags.contains(ServiceFlags::NETWORK));
        assert_eq!(flags.0, 1 << 40 | 1);
    }
}
