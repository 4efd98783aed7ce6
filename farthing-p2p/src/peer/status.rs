//! Peer status: everything the reply engine knows about one peer.

use std::net::{IpAddr, SocketAddr};
use std::time::Instant;

use tracing::debug;

use crate::peer::handshake::HandshakeState;
use crate::protocol::ServiceFlags;

/// Score added for a small violation (spam-ish, tolerable).
pub const SMALL_VIOLATION: u32 = 10;

/// Score added for a medium violation (clear protocol misuse).
pub const MEDIUM_VIOLATION: u32 = 20;

/// Score added for a big violation; disconnects immediately.
pub const BIG_VIOLATION: u32 = 100;

/// The reply engine's view of per-peer state.
///
/// The engine only ever sees this trait, never a concrete peer, so
/// its dispatch logic can be exercised against a scripted status in
/// tests.
pub trait NodeStatus {
    /// Current handshake state.
    fn handshake(&self) -> HandshakeState;
    /// Advance the handshake state.
    fn set_handshake(&mut self, state: HandshakeState);

    /// Negotiated protocol version (minimum of ours and the peer's).
    fn protocol_version(&self) -> i32;
    /// Record the negotiated protocol version.
    fn set_protocol_version(&mut self, version: i32);

    /// Services the peer advertised in its version message.
    fn services(&self) -> ServiceFlags;
    /// Record the peer's advertised services.
    fn set_services(&mut self, services: ServiceFlags);

    /// Whether the peer asked for transaction relay.
    fn relay(&self) -> bool;
    /// Record (or clamp) the peer's relay preference.
    fn set_relay(&mut self, relay: bool);

    /// The peer's minimum fee rate for relayed transactions (sat/kvB).
    fn fee_filter(&self) -> u64;
    /// Record the peer's fee filter.
    fn set_fee_filter(&mut self, rate: u64);

    /// Whether the peer asked for header announcements.
    fn send_headers(&self) -> bool;
    /// Record the peer's sendheaders request.
    fn set_send_headers(&mut self);

    /// Record the peer's compact-block preference and version.
    fn set_compact_blocks(&mut self, announce: bool, version: u64);

    /// Whether we already answered a getaddr on this connection.
    fn addr_sent(&self) -> bool;
    /// Mark the one-shot getaddr reply as spent.
    fn mark_addr_sent(&mut self);

    /// Store the nonce of a ping we sent, awaiting its pong.
    fn set_expected_pong(&mut self, nonce: u64);
    /// Check a received pong nonce against the outstanding ping.
    /// Clears the outstanding nonce and returns `true` on a match.
    fn check_pong(&mut self, nonce: u64) -> bool;

    /// The peer's IP address.
    fn ip(&self) -> IpAddr;
    /// The peer's port.
    fn port(&self) -> u16;

    /// Record activity on this connection (called for every received
    /// message, valid or not).
    fn update_time(&mut self);

    /// Record a small violation.
    fn add_small_violation(&mut self);
    /// Record a medium violation.
    fn add_medium_violation(&mut self);
    /// Record a big violation; flags disconnect unconditionally.
    fn add_big_violation(&mut self);

    /// Accumulated misbehavior score.
    fn violation_score(&self) -> u32;

    /// Flag the connection for disconnect without touching the score.
    fn signal_disconnect(&mut self);
    /// Whether the owner should drop this connection.
    fn should_disconnect(&self) -> bool;
}

/// Owned per-connection peer state.
#[derive(Debug)]
pub struct PeerStatus {
    remote: SocketAddr,
    ban_threshold: u32,
    handshake: HandshakeState,
    protocol_version: i32,
    services: ServiceFlags,
    relay: bool,
    fee_filter: u64,
    send_headers: bool,
    compact_announce: bool,
    compact_version: u64,
    addr_sent: bool,
    expected_pong: Option<u64>,
    violation_score: u32,
    disconnect: bool,
    last_activity: Option<Instant>,
}

impl PeerStatus {
    /// Fresh state for a connection to `remote`.
    pub fn new(remote: SocketAddr, ban_threshold: u32) -> Self {
        Self {
            remote,
            ban_threshold,
            handshake: HandshakeState::None,
            protocol_version: 0,
            services: ServiceFlags::NONE,
            relay: false,
            fee_filter: 0,
            send_headers: false,
            compact_announce: false,
            compact_version: 0,
            addr_sent: false,
            expected_pong: None,
            violation_score: 0,
            disconnect: false,
            last_activity: None,
        }
    }

    /// The peer's socket address.
    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    /// The peer's compact-block preference, if announced.
    pub fn compact_blocks(&self) -> (bool, u64) {
        (self.compact_announce, self.compact_version)
    }

    /// When this peer was last heard from.
    pub fn last_activity(&self) -> Option<Instant> {
        self.last_activity
    }

    fn penalize(&mut self, points: u32) {
        self.violation_score = self.violation_score.saturating_add(points);
        if self.violation_score >= self.ban_threshold {
            debug!(
                peer = %self.remote,
                score = self.violation_score,
                "violation score passed ban threshold"
            );
            self.disconnect = true;
        }
    }
}

impl NodeStatus for PeerStatus {
    fn handshake(&self) -> HandshakeState {
        self.handshake
    }

    fn set_handshake(&mut self, state: HandshakeState) {
        self.handshake = state;
    }

    fn protocol_version(&self) -> i32 {
        self.protocol_version
    }

    fn set_protocol_version(&mut self, version: i32) {
        self.protocol_version = version;
    }

    fn services(&self) -> ServiceFlags {
        self.services
    }

    fn set_services(&mut self, services: ServiceFlags) {
        self.services = services;
    }

    fn relay(&self) -> bool {
        self.relay
    }

    fn set_relay(&mut self, relay: bool) {
        self.relay = relay;
    }

    fn fee_filter(&self) -> u64 {
        self.fee_filter
    }

    fn set_fee_filter(&mut self, rate: u64) {
        self.fee_filter = rate;
    }

    fn send_headers(&self) -> bool {
        self.send_headers
    }

    fn set_send_headers(&mut self) {
        self.send_headers = true;
    }

    fn set_compact_blocks(&mut self, announce: bool, version: u64) {
        self.compact_announce = announce;
        self.compact_version = version;
    }

    fn addr_sent(&self) -> bool {
        self.addr_sent
    }

    fn mark_addr_sent(&mut self) {
        self.addr_sent = true;
    }

    fn set_expected_pong(&mut self, nonce: u64) {
        self.expected_pong = Some(nonce);
    }

    fn check_pong(&mut self, nonce: u64) -> bool {
        match self.expected_pong {
            Some(expected) if expected == nonce => {
                self.expected_pong = None;
                true
            }
            _ => false,
        }
    }

    fn ip(&self) -> IpAddr {
        self.remote.ip()
    }

    fn port(&self) -> u16 {
        self.remote.port()
    }

    fn update_time(&mut self) {
        self.last_activity = Some(Instant::now());
    }

    fn add_small_violation(&mut self) {
        self.penalize(SMALL_VIOLATION);
    }

    fn add_medium_violation(&mut self) {
        self.penalize(MEDIUM_VIOLATION);
    }

    fn add_big_violation(&mut self) {
        self.penalize(BIG_VIOLATION);
        self.disconnect = true;
    }

    fn violation_score(&self) -> u32 {
        self.violation_score
    }

    fn signal_disconnect(&mut self) {
        self.disconnect = true;
    }

    fn should_disconnect(&self) -> bool {
        self.disconnect
    }
}
