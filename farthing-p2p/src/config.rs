//! Network parameters and client policy.

use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use crate::protocol::ServiceFlags;

/// The protocol version this engine speaks.
pub const PROTOCOL_VERSION: i32 = 70015;

/// Lowest peer protocol version the engine will talk to.
pub const MIN_PROTOCOL_VERSION: i32 = 31800;

/// Ping messages carry a nonce for versions strictly above this (BIP 31).
pub const BIP31_VERSION: i32 = 60000;

/// `sendheaders` is understood at or above this version (BIP 130).
pub const BIP130_VERSION: i32 = 70012;

/// `feefilter` is understood at or above this version (BIP 133).
pub const BIP133_VERSION: i32 = 70013;

/// Maximum payload size a header may claim (32 MiB).
pub const MAX_PAYLOAD_SIZE: u32 = 0x0200_0000;

/// Maximum addresses in one `addr` message.
pub const MAX_ADDR_PER_MESSAGE: usize = 1000;

/// Most addresses fetched from the address book for one getaddr reply
/// (chunked into `addr` messages of at most [`MAX_ADDR_PER_MESSAGE`]).
pub const MAX_GETADDR_RESULTS: usize = 2500;

/// Maximum entries in one `inv` message.
pub const MAX_INV_PER_MESSAGE: usize = 50_000;

/// Maximum headers in one `headers` message.
pub const MAX_HEADERS_PER_MESSAGE: usize = 2000;

/// Default ceiling on a peer's requested fee filter, in sat/kvB.
/// Anything above is treated as a refusal to relay dressed up as a fee.
pub const DEFAULT_MAX_FEE_FILTER: u64 = 10_000_000;

/// Default misbehavior score at which a peer is disconnected.
pub const DEFAULT_BAN_THRESHOLD: u32 = 100;

/// Default user agent string.
pub const DEFAULT_USER_AGENT: &str = "/farthing:0.1.0/";

/// Which Bitcoin network the engine is speaking on.
///
/// Resolved once at engine construction; the magic bytes are injected
/// into the codec rather than looked up per message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Network {
    /// Main network.
    #[default]
    Mainnet,
    /// Test network (testnet3).
    Testnet,
    /// Local regression-test network.
    Regtest,
}

impl Network {
    /// The 4-byte magic prefix for message headers on this network.
    pub fn magic(self) -> [u8; 4] {
        match self {
            Network::Mainnet => [0xf9, 0xbe, 0xb4, 0xd9],
            Network::Testnet => [0x0b, 0x11, 0x09, 0x07],
            Network::Regtest => [0xfa, 0xbf, 0xb5, 0xda],
        }
    }

    /// Default P2P port for this network.
    pub fn default_port(self) -> u16 {
        match self {
            Network::Mainnet => 8333,
            Network::Testnet => 18333,
            Network::Regtest => 18444,
        }
    }
}

/// Client-wide policy read by the reply engine.
///
/// One instance is shared across all connections. The engine never
/// mutates it; the two runtime-variable fields (initial-sync flag and
/// the externally visible address) are interior-mutable so the owning
/// node can update them without tearing down connections.
#[derive(Debug)]
pub struct ClientPolicy {
    /// Which network the engine speaks on.
    pub network: Network,
    /// Our protocol version.
    pub protocol_version: i32,
    /// Services we advertise.
    pub services: ServiceFlags,
    /// Our user agent string.
    pub user_agent: String,
    /// Whether we relay transactions.
    pub relay: bool,
    /// Port we are reachable on.
    pub port: u16,
    /// Minimum mempool fee rate in sat/B; 0 disables the feefilter
    /// settings message.
    pub min_fee_rate: u64,
    /// Ceiling on a peer's requested fee filter, in sat/kvB.
    pub max_fee_filter: u64,
    /// Misbehavior score at which a peer is disconnected.
    pub ban_threshold: u32,
    /// Whether the local chain is behind and headers-first sync is running.
    catching_up: AtomicBool,
    /// Our externally reachable IP, once learned.
    own_ip: RwLock<Option<IpAddr>>,
}

impl Default for ClientPolicy {
    fn default() -> Self {
        Self {
            network: Network::Mainnet,
            protocol_version: PROTOCOL_VERSION,
            services: ServiceFlags::NETWORK | ServiceFlags::WITNESS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            relay: true,
            port: Network::Mainnet.default_port(),
            min_fee_rate: 0,
            max_fee_filter: DEFAULT_MAX_FEE_FILTER,
            ban_threshold: DEFAULT_BAN_THRESHOLD,
            catching_up: AtomicBool::new(false),
            own_ip: RwLock::new(None),
        }
    }
}

impl ClientPolicy {
    /// Create a policy for the given network with default settings.
    pub fn new(network: Network) -> Self {
        Self {
            network,
            port: network.default_port(),
            ..Default::default()
        }
    }

    /// Set the advertised protocol version.
    pub fn with_protocol_version(mut self, version: i32) -> Self {
        self.protocol_version = version;
        self
    }

    /// Set the advertised service flags.
    pub fn with_services(mut self, services: ServiceFlags) -> Self {
        self.services = services;
        self
    }

    /// Set the user agent string.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Enable or disable transaction relay.
    pub fn with_relay(mut self, relay: bool) -> Self {
        self.relay = relay;
        self
    }

    /// Set the reachable port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the minimum mempool fee rate (sat/B).
    pub fn with_min_fee_rate(mut self, rate: u64) -> Self {
        self.min_fee_rate = rate;
        self
    }

    /// Set the initial-sync flag at construction time.
    pub fn with_catching_up(self, catching_up: bool) -> Self {
        self.catching_up.store(catching_up, Ordering::Relaxed);
        self
    }

    /// Set the externally reachable IP at construction time.
    pub fn with_own_ip(self, ip: IpAddr) -> Self {
        *self.own_ip.write().expect("own_ip lock poisoned") = Some(ip);
        self
    }

    /// Whether headers-first initial sync is in progress.
    pub fn is_catching_up(&self) -> bool {
        self.catching_up.load(Ordering::Relaxed)
    }

    /// Flip the initial-sync flag (called by the owning node).
    pub fn set_catching_up(&self, catching_up: bool) {
        self.catching_up.store(catching_up, Ordering::Relaxed);
    }

    /// Our externally reachable IP, if known.
    pub fn own_ip(&self) -> Option<IpAddr> {
        *self.own_ip.read().expect("own_ip lock poisoned")
    }

    /// Record the externally reachable IP (called by the owning node).
    pub fn set_own_ip(&self, ip: IpAddr) {
        *self.own_ip.write().expect("own_ip lock poisoned") = Some(ip);
    }
}
