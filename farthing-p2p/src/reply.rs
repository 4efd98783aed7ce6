//! The reply engine: decides what, if anything, each received message
//! gets back, and keeps per-peer state honest while doing it.
//!
//! Every received message updates the peer's activity timestamp, even
//! ones that turn out to be violations. Until the handshake finishes,
//! everything except version and verack is refused with a medium
//! violation. Misbehavior accumulates on the peer's score; the engine
//! never drops a connection itself, it only flags the peer so the
//! owner can.

use std::sync::Arc;

use tracing::{debug, trace};

use farthing_core::BlockHeader;

use crate::chain::{AddressBook, Blockchain, HeadersOutcome, Mempool};
use crate::config::{
    ClientPolicy, BIP130_VERSION, BIP133_VERSION, BIP31_VERSION, MAX_ADDR_PER_MESSAGE,
    MAX_GETADDR_RESULTS, MAX_HEADERS_PER_MESSAGE, MIN_PROTOCOL_VERSION,
};
use crate::peer::{HandshakeState, NodeStatus};
use crate::protocol::{
    GetHeadersPayload, Message, NetworkAddress, NetworkAddressWithTime, Payload, SendCmpctPayload,
    ServiceFlags, VersionPayload,
};

/// Source of nonces for pings and version messages.
///
/// Injectable so tests can pin the nonce and byte-compare replies.
pub trait NonceSource: Send + Sync {
    /// Produce a fresh nonce.
    fn next_nonce(&self) -> u64;
}

/// Production nonce source backed by the thread-local RNG.
#[derive(Debug, Default)]
pub struct RandomNonce;

impl NonceSource for RandomNonce {
    fn next_nonce(&self) -> u64 {
        rand::random()
    }
}

/// Source of the current time, injectable for the same reason.
pub trait TimeSource: Send + Sync {
    /// Current Unix time in seconds.
    fn now(&self) -> i64;
}

/// Production clock backed by the system time.
#[derive(Debug, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now(&self) -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

/// Per-message reply decisions, shared by all connections.
///
/// Holds no per-peer state itself; everything peer-specific arrives
/// through the [`NodeStatus`] argument.
pub struct ReplyEngine {
    policy: Arc<ClientPolicy>,
    blockchain: Arc<dyn Blockchain>,
    address_book: Arc<dyn AddressBook>,
    mempool: Arc<dyn Mempool>,
    nonces: Box<dyn NonceSource>,
    clock: Box<dyn TimeSource>,
}

impl ReplyEngine {
    /// Create an engine with the production nonce source and clock.
    pub fn new(
        policy: Arc<ClientPolicy>,
        blockchain: Arc<dyn Blockchain>,
        address_book: Arc<dyn AddressBook>,
        mempool: Arc<dyn Mempool>,
    ) -> Self {
        Self {
            policy,
            blockchain,
            address_book,
            mempool,
            nonces: Box::new(RandomNonce),
            clock: Box::new(SystemClock),
        }
    }

    /// Replace the nonce source (tests).
    pub fn with_nonce_source(mut self, nonces: Box<dyn NonceSource>) -> Self {
        self.nonces = nonces;
        self
    }

    /// Replace the clock (tests).
    pub fn with_clock(mut self, clock: Box<dyn TimeSource>) -> Self {
        self.clock = clock;
        self
    }

    /// The version message that opens a handshake from our side.
    pub fn version_message(&self, status: &dyn NodeStatus) -> Message {
        Message::new(Payload::Version(VersionPayload {
            version: self.policy.protocol_version,
            services: self.policy.services,
            timestamp: self.clock.now(),
            receiver: NetworkAddress {
                services: ServiceFlags::NONE,
                ip: status.ip(),
                port: status.port(),
            },
            transmitter: NetworkAddress::unspecified(self.policy.services),
            nonce: self.nonces.next_nonce(),
            user_agent: self.policy.user_agent.clone(),
            start_height: self.blockchain.current_height(),
            relay: self.policy.relay,
        }))
    }

    /// Decide the replies (possibly none) to one received message,
    /// updating `status` along the way.
    pub fn reply(&self, status: &mut dyn NodeStatus, message: &Message) -> Vec<Message> {
        status.update_time();
        trace!(command = message.command_str(), "handling message");

        match &message.payload {
            Payload::Version(v) => return self.check_version(status, v),
            Payload::Verack => return self.check_verack(status),
            _ => {}
        }

        if !status.handshake().is_finished() {
            debug!(command = message.command_str(), "message before handshake finished");
            status.add_medium_violation();
            return Vec::new();
        }

        match &message.payload {
            Payload::Version(_) | Payload::Verack => unreachable!("handled above"),

            // legacy/informational, never acted on
            Payload::Alert(_) | Payload::Reject(_) => Vec::new(),

            Payload::Ping(nonce) => vec![Message::new(Payload::Pong(*nonce))],

            Payload::Pong(nonce) => {
                if !status.check_pong(*nonce) {
                    status.add_small_violation();
                }
                Vec::new()
            }

            Payload::GetAddr => self.answer_getaddr(status),

            Payload::Addr(addresses) => {
                self.address_book.insert(addresses);
                Vec::new()
            }

            Payload::Inv(entries) => {
                if !self.policy.relay && entries.iter().any(|e| e.kind.is_tx()) {
                    debug!("tx inventory from peer while relay is disabled");
                    status.add_big_violation();
                }
                Vec::new()
            }

            Payload::Tx(tx) => {
                if self.policy.relay {
                    let _ = self.mempool.try_add(tx);
                } else {
                    debug!("transaction from peer while relay is disabled");
                    status.add_big_violation();
                }
                Vec::new()
            }

            Payload::Block(block) => {
                if !self.blockchain.process_block(block) {
                    status.add_medium_violation();
                }
                Vec::new()
            }

            Payload::FeeFilter(rate) => {
                if *rate > self.policy.max_fee_filter {
                    debug!(rate, "fee filter over sanity ceiling, disabling relay to peer");
                    status.set_relay(false);
                    status.add_medium_violation();
                } else if !status.relay() {
                    status.add_small_violation();
                } else {
                    status.set_fee_filter(*rate);
                }
                Vec::new()
            }

            Payload::SendCmpct(SendCmpctPayload { announce, version }) => {
                status.set_compact_blocks(*announce, *version);
                Vec::new()
            }

            Payload::SendHeaders => {
                if status.send_headers() {
                    status.add_small_violation();
                } else {
                    status.set_send_headers();
                }
                Vec::new()
            }

            Payload::GetHeaders(request) => {
                let headers = self
                    .blockchain
                    .missing_headers(&request.locator_hashes, &request.stop_hash);
                if headers.is_empty() {
                    Vec::new()
                } else {
                    vec![Message::new(Payload::Headers(headers))]
                }
            }

            Payload::Headers(headers) => self.accept_headers(status, headers),

            // forward compatibility: unknown commands are not errors
            Payload::Unknown { .. } => Vec::new(),
        }
    }

    fn check_version(&self, status: &mut dyn NodeStatus, v: &VersionPayload) -> Vec<Message> {
        if v.version < MIN_PROTOCOL_VERSION {
            debug!(version = v.version, "peer protocol version below minimum, disconnecting");
            status.signal_disconnect();
            return Vec::new();
        }

        match status.handshake() {
            HandshakeState::None => {
                self.record_peer_version(status, v);
                status.set_handshake(HandshakeState::ReceivedAndReplied);
                vec![Message::new(Payload::Verack), self.version_message(status)]
            }
            HandshakeState::Sent => {
                self.record_peer_version(status, v);
                status.set_handshake(HandshakeState::SentAndReceived);
                vec![Message::new(Payload::Verack)]
            }
            HandshakeState::SentAndConfirmed => {
                self.record_peer_version(status, v);
                status.set_handshake(HandshakeState::Finished);
                let mut replies = vec![Message::new(Payload::Verack)];
                replies.extend(self.settings_batch(status));
                replies
            }
            HandshakeState::ReceivedAndReplied
            | HandshakeState::SentAndReceived
            | HandshakeState::Finished => {
                debug!("unexpected version message");
                status.add_medium_violation();
                Vec::new()
            }
        }
    }

    fn check_verack(&self, status: &mut dyn NodeStatus) -> Vec<Message> {
        match status.handshake() {
            HandshakeState::Sent => {
                status.set_handshake(HandshakeState::SentAndConfirmed);
                Vec::new()
            }
            HandshakeState::ReceivedAndReplied | HandshakeState::SentAndReceived => {
                status.set_handshake(HandshakeState::Finished);
                self.settings_batch(status)
            }
            HandshakeState::None | HandshakeState::SentAndConfirmed | HandshakeState::Finished => {
                debug!("unexpected verack message");
                status.add_medium_violation();
                Vec::new()
            }
        }
    }

    fn record_peer_version(&self, status: &mut dyn NodeStatus, v: &VersionPayload) {
        status.set_protocol_version(v.version.min(self.policy.protocol_version));
        status.set_services(v.services);
        status.set_relay(v.relay);

        // the receiver address the peer echoes back is how we learn
        // our own externally visible IP
        let seen_ip = v.receiver.ip;
        if !seen_ip.is_loopback() && !seen_ip.is_unspecified() {
            self.policy.set_own_ip(seen_ip);
        }
    }

    /// Messages sent right after the handshake completes, in fixed
    /// order: ping, then sendheaders or getheaders, then feefilter,
    /// then our own address.
    fn settings_batch(&self, status: &mut dyn NodeStatus) -> Vec<Message> {
        let version = status.protocol_version();
        let mut batch = Vec::new();

        if version > BIP31_VERSION {
            let nonce = self.nonces.next_nonce();
            status.set_expected_pong(nonce);
            batch.push(Message::new(Payload::Ping(nonce)));
        }

        if self.policy.is_catching_up() {
            if status.services().has_history() {
                let locator = self.blockchain.header_locator();
                batch.push(Message::new(Payload::GetHeaders(GetHeadersPayload::from_locator(
                    self.policy.protocol_version,
                    &locator,
                    None,
                ))));
            } else {
                // a peer that can't serve history is useless mid-sync
                debug!("peer has no history to sync from, disconnecting");
                status.signal_disconnect();
                return batch;
            }
        } else if version >= BIP130_VERSION {
            batch.push(Message::new(Payload::SendHeaders));
        }

        if self.policy.relay && version >= BIP133_VERSION && self.policy.min_fee_rate > 0 {
            // policy keeps sat/B, the wire wants sat/kvB
            batch.push(Message::new(Payload::FeeFilter(self.policy.min_fee_rate * 1000)));
        }

        if self.policy.relay {
            if let Some(ip) = self.policy.own_ip() {
                if !ip.is_loopback() && !ip.is_unspecified() {
                    batch.push(Message::new(Payload::Addr(vec![NetworkAddressWithTime {
                        time: self.clock.now() as u32,
                        services: self.policy.services,
                        ip,
                        port: self.policy.port,
                    }])));
                }
            }
        }

        batch
    }

    fn answer_getaddr(&self, status: &mut dyn NodeStatus) -> Vec<Message> {
        if status.addr_sent() {
            return Vec::new();
        }
        let candidates = self.address_book.query_candidates(MAX_GETADDR_RESULTS);
        if candidates.is_empty() {
            return Vec::new();
        }
        status.mark_addr_sent();
        candidates
            .chunks(MAX_ADDR_PER_MESSAGE)
            .map(|chunk| Message::new(Payload::Addr(chunk.to_vec())))
            .collect()
    }

    fn accept_headers(&self, status: &mut dyn NodeStatus, headers: &[BlockHeader]) -> Vec<Message> {
        if headers.is_empty() {
            return Vec::new();
        }
        match self.blockchain.process_headers(headers) {
            HeadersOutcome::Invalid => {
                status.add_medium_violation();
                Vec::new()
            }
            // re-anchor from our own locator when the batch didn't
            // connect, or keep pulling when the peer filled a batch
            HeadersOutcome::Unknown => vec![self.next_getheaders()],
            HeadersOutcome::Accepted if headers.len() == MAX_HEADERS_PER_MESSAGE => {
                vec![self.next_getheaders()]
            }
            HeadersOutcome::Accepted => Vec::new(),
        }
    }

    fn next_getheaders(&self) -> Message {
        let locator = self.blockchain.header_locator();
        Message::new(Payload::GetHeaders(GetHeadersPayload::from_locator(
            self.policy.protocol_version,
            &locator,
            None,
        )))
    }
}
