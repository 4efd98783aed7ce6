//! End-to-end engine scenarios over encoded wire bytes.

use std::sync::Arc;

use bytes::Bytes;

use farthing_core::{BlockHeader, RawBlock, RawTransaction};
use farthing_p2p::chain::{AddressBook, Blockchain, HeadersOutcome, Mempool};
use farthing_p2p::config::{ClientPolicy, Network};
use farthing_p2p::protocol::{
    Message, NetworkAddress, NetworkAddressWithTime, Payload, ServiceFlags, VersionPayload,
};
use farthing_p2p::reply::{NonceSource, ReplyEngine, TimeSource};
use farthing_p2p::{ConnectionId, Engine, HandshakeState, NodeStatus};

const MAGIC: [u8; 4] = [0x0b, 0x11, 0x09, 0x07];
const NONCE: u64 = 0x0158_a8e8_ba5f_3ed3;

struct FixedNonce;

impl NonceSource for FixedNonce {
    fn next_nonce(&self) -> u64 {
        NONCE
    }
}

struct FixedClock;

impl TimeSource for FixedClock {
    fn now(&self) -> i64 {
        456
    }
}

struct StubChain;

impl Blockchain for StubChain {
    fn current_height(&self) -> i32 {
        12345
    }
    fn find_height(&self, _prev_hash: &[u8; 32]) -> Option<i32> {
        None
    }
    fn next_difficulty_target(&self) -> u32 {
        0x1d00ffff
    }
    fn process_block(&self, _block: &RawBlock) -> bool {
        true
    }
    fn process_headers(&self, _headers: &[BlockHeader]) -> HeadersOutcome {
        HeadersOutcome::Accepted
    }
    fn header_locator(&self) -> Vec<BlockHeader> {
        Vec::new()
    }
    fn missing_headers(&self, _known: &[[u8; 32]], _stop: &[u8; 32]) -> Vec<BlockHeader> {
        Vec::new()
    }
}

struct StubBook {
    candidates: Vec<NetworkAddressWithTime>,
}

impl AddressBook for StubBook {
    fn read_persisted(&self) -> Option<Vec<NetworkAddressWithTime>> {
        None
    }
    fn query_candidates(&self, max: usize) -> Vec<NetworkAddressWithTime> {
        self.candidates.iter().take(max).cloned().collect()
    }
    fn insert(&self, _addresses: &[NetworkAddressWithTime]) {}
}

struct StubPool;

impl Mempool for StubPool {
    fn try_add(&self, _tx: &RawTransaction) -> bool {
        true
    }
}

fn candidate(i: u16) -> NetworkAddressWithTime {
    NetworkAddressWithTime {
        time: u32::from(i),
        services: ServiceFlags::NETWORK,
        ip: std::net::IpAddr::V4(std::net::Ipv4Addr::new(10, 0, (i >> 8) as u8, i as u8)),
        port: 8333,
    }
}

fn build_engine(candidates: Vec<NetworkAddressWithTime>) -> Engine {
    let policy = Arc::new(ClientPolicy::new(Network::Testnet));
    let reply = ReplyEngine::new(
        Arc::clone(&policy),
        Arc::new(StubChain),
        Arc::new(StubBook { candidates }),
        Arc::new(StubPool),
    )
    .with_nonce_source(Box::new(FixedNonce))
    .with_clock(Box::new(FixedClock));
    Engine::with_reply_engine(policy, reply)
}

fn peer_version(version: i32) -> Bytes {
    Message::new(Payload::Version(VersionPayload {
        version,
        services: ServiceFlags::NETWORK,
        timestamp: 100,
        receiver: NetworkAddress {
            services: ServiceFlags::NONE,
            ip: "203.0.113.7".parse().unwrap(),
            port: 18333,
        },
        transmitter: NetworkAddress::unspecified(ServiceFlags::NETWORK),
        nonce: 11,
        user_agent: "/peer:1.0/".to_string(),
        start_height: 200,
        relay: true,
    }))
    .encode(MAGIC)
}

fn drain_messages(engine: &mut Engine, id: ConnectionId) -> Vec<Message> {
    let mut bytes = Vec::new();
    while let Some(chunk) = engine.drain_send(id, 33).unwrap() {
        bytes.extend_from_slice(&chunk);
    }
    let mut messages = Vec::new();
    let mut rest = &bytes[..];
    while !rest.is_empty() {
        let (msg, consumed) = Message::decode(rest, MAGIC).unwrap();
        messages.push(msg);
        rest = &rest[consumed..];
    }
    messages
}

/// Runs the peer-spoke-first handshake to completion and drains the
/// replies produced along the way.
fn finish_handshake(engine: &mut Engine, id: ConnectionId) -> Vec<Message> {
    engine.feed(id, &peer_version(70015)).unwrap();
    let mut messages = drain_messages(engine, id);
    engine.feed(id, &Message::new(Payload::Verack).encode(MAGIC)).unwrap();
    messages.extend(drain_messages(engine, id));
    messages
}

#[test]
fn test_inbound_handshake_to_finished() {
    let mut engine = build_engine(Vec::new());
    let id = engine.add_connection("203.0.113.99:18333".parse().unwrap());

    let messages = finish_handshake(&mut engine, id);

    // peer's version gets verack + our version, their verack completes
    // the handshake and triggers the settings batch
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0], Message::new(Payload::Verack));
    match &messages[1].payload {
        Payload::Version(v) => {
            assert_eq!(v.version, 70015);
            assert_eq!(v.start_height, 12345);
            assert_eq!(v.nonce, NONCE);
            // the receiver field names the peer as we see it
            assert_eq!(v.receiver.ip, "203.0.113.99".parse::<std::net::IpAddr>().unwrap());
        }
        other => panic!("unexpected payload: {other:?}"),
    }
    assert_eq!(messages[2], Message::new(Payload::Ping(NONCE)));
    assert_eq!(messages[3], Message::new(Payload::SendHeaders));

    let status = engine.peer_status(id).unwrap();
    assert_eq!(status.handshake(), HandshakeState::Finished);
    assert!(!engine.wants_disconnect(id).unwrap());
}

#[test]
fn test_low_version_peer_is_disconnected_silently() {
    let mut engine = build_engine(Vec::new());
    let id = engine.add_connection("203.0.113.99:18333".parse().unwrap());

    engine.feed(id, &peer_version(1)).unwrap();

    assert!(engine.wants_disconnect(id).unwrap());
    assert!(!engine.has_pending_send(id).unwrap());
    assert_eq!(engine.peer_status(id).unwrap().handshake(), HandshakeState::None);
    assert_eq!(engine.peer_status(id).unwrap().violation_score(), 0);
}

#[test]
fn test_outbound_handshake_to_finished() {
    let mut engine = build_engine(Vec::new());
    let id = engine.add_connection("203.0.113.99:18333".parse().unwrap());

    engine.start_handshake(id).unwrap();
    let opening = drain_messages(&mut engine, id);
    assert_eq!(opening.len(), 1);
    assert!(matches!(opening[0].payload, Payload::Version(_)));

    engine.feed(id, &Message::new(Payload::Verack).encode(MAGIC)).unwrap();
    assert_eq!(engine.peer_status(id).unwrap().handshake(), HandshakeState::SentAndConfirmed);

    engine.feed(id, &peer_version(70015)).unwrap();
    let finishing = drain_messages(&mut engine, id);
    assert_eq!(engine.peer_status(id).unwrap().handshake(), HandshakeState::Finished);
    assert_eq!(finishing[0], Message::new(Payload::Verack));
    assert_eq!(finishing[1], Message::new(Payload::Ping(NONCE)));
    assert_eq!(finishing[2], Message::new(Payload::SendHeaders));
}

#[test]
fn test_ping_answered_after_handshake() {
    let mut engine = build_engine(Vec::new());
    let id = engine.add_connection("203.0.113.99:18333".parse().unwrap());
    finish_handshake(&mut engine, id);

    engine.feed(id, &Message::new(Payload::Ping(98765)).encode(MAGIC)).unwrap();
    let replies = drain_messages(&mut engine, id);
    assert_eq!(replies, vec![Message::new(Payload::Pong(98765))]);
}

#[test]
fn test_getaddr_chunking_and_one_shot() {
    let candidates: Vec<_> = (0..1002).map(candidate).collect();
    let mut engine = build_engine(candidates.clone());
    let id = engine.add_connection("203.0.113.99:18333".parse().unwrap());
    finish_handshake(&mut engine, id);

    engine.feed(id, &Message::new(Payload::GetAddr).encode(MAGIC)).unwrap();
    let replies = drain_messages(&mut engine, id);
    assert_eq!(replies.len(), 2);
    match (&replies[0].payload, &replies[1].payload) {
        (Payload::Addr(first), Payload::Addr(second)) => {
            assert_eq!(first.len(), 1000);
            assert_eq!(second.len(), 2);
            // original relative order, split only by the batch limit
            assert_eq!(first[..], candidates[..1000]);
            assert_eq!(second[..], candidates[1000..]);
        }
        other => panic!("unexpected payloads: {other:?}"),
    }

    // a second getaddr finds the one-shot spent
    engine.feed(id, &Message::new(Payload::GetAddr).encode(MAGIC)).unwrap();
    assert!(drain_messages(&mut engine, id).is_empty());
    assert_eq!(engine.peer_status(id).unwrap().violation_score(), 0);
}

#[test]
fn test_feefilter_ceiling_scenario() {
    let mut engine = build_engine(Vec::new());
    let id = engine.add_connection("203.0.113.99:18333".parse().unwrap());
    finish_handshake(&mut engine, id);

    // at the ceiling: stored, no violation
    engine.feed(id, &Message::new(Payload::FeeFilter(10_000_000)).encode(MAGIC)).unwrap();
    {
        let status = engine.peer_status(id).unwrap();
        assert_eq!(status.fee_filter(), 10_000_000);
        assert_eq!(status.violation_score(), 0);
        assert!(status.relay());
    }

    // above the ceiling: relay-to flag clamped, one medium violation
    engine.feed(id, &Message::new(Payload::FeeFilter(10_000_001)).encode(MAGIC)).unwrap();
    let status = engine.peer_status(id).unwrap();
    assert!(!status.relay());
    assert_eq!(status.violation_score(), 20);
}

#[test]
fn test_reset_clears_everything() {
    let mut engine = build_engine(Vec::new());
    let id = engine.add_connection("203.0.113.99:18333".parse().unwrap());
    finish_handshake(&mut engine, id);
    engine.feed(id, &Message::new(Payload::Ping(1)).encode(MAGIC)).unwrap();
    assert!(engine.has_pending_send(id).unwrap());

    engine.reset(id).unwrap();
    assert!(!engine.has_pending_send(id).unwrap());
    let status = engine.peer_status(id).unwrap();
    assert_eq!(status.handshake(), HandshakeState::None);
    assert_eq!(status.violation_score(), 0);
}

#[test]
fn test_garbage_then_message_still_frames() {
    let mut engine = build_engine(Vec::new());
    let id = engine.add_connection("203.0.113.99:18333".parse().unwrap());

    let mut bytes = vec![0x00, 0x01, 0x02];
    bytes.extend_from_slice(&peer_version(70015));
    engine.feed(id, &bytes).unwrap();

    let replies = drain_messages(&mut engine, id);
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0], Message::new(Payload::Verack));
    assert!(matches!(replies[1].payload, Payload::Version(_)));
}
