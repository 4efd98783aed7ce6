//! The connection-facing surface of the protocol engine.
//!
//! Whoever owns the sockets feeds raw received bytes in and drains
//! encoded bytes out, one connection at a time. Each connection gets
//! its own framer, send queue, and peer status; the shared
//! [`ReplyEngine`] decides replies. Nothing here blocks, so the
//! methods are safe to call from I/O completion callbacks.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info};

use crate::chain::{AddressBook, Blockchain, Mempool};
use crate::config::ClientPolicy;
use crate::error::{P2pError, P2pResult};
use crate::peer::{HandshakeState, NodeStatus, PeerStatus};
use crate::protocol::{
    FrameOutcome, Framer, Message, Payload, RejectCode, RejectPayload, SendQueue,
};
use crate::reply::ReplyEngine;

/// Opaque identifier for one connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

struct Connection {
    status: PeerStatus,
    framer: Framer,
    send: SendQueue,
}

/// The protocol engine: all connections, one policy, one reply brain.
pub struct Engine {
    policy: Arc<ClientPolicy>,
    reply: ReplyEngine,
    connections: HashMap<ConnectionId, Connection>,
    next_id: u64,
}

impl Engine {
    /// Create an engine over the given policy and collaborators.
    pub fn new(
        policy: Arc<ClientPolicy>,
        blockchain: Arc<dyn Blockchain>,
        address_book: Arc<dyn AddressBook>,
        mempool: Arc<dyn Mempool>,
    ) -> Self {
        let reply = ReplyEngine::new(Arc::clone(&policy), blockchain, address_book, mempool);
        Self::with_reply_engine(policy, reply)
    }

    /// Create an engine around a pre-built reply engine (tests inject
    /// deterministic nonce and clock sources this way).
    pub fn with_reply_engine(policy: Arc<ClientPolicy>, reply: ReplyEngine) -> Self {
        Self { policy, reply, connections: HashMap::new(), next_id: 0 }
    }

    /// Register a new connection to `remote` and return its id.
    pub fn add_connection(&mut self, remote: SocketAddr) -> ConnectionId {
        let id = ConnectionId(self.next_id);
        self.next_id += 1;
        let magic = self.policy.network.magic();
        self.connections.insert(
            id,
            Connection {
                status: PeerStatus::new(remote, self.policy.ban_threshold),
                framer: Framer::new(magic),
                send: SendQueue::new(magic),
            },
        );
        info!(%id, peer = %remote, "connection registered");
        id
    }

    /// Queue our version message, opening the handshake from our side.
    pub fn start_handshake(&mut self, id: ConnectionId) -> P2pResult<()> {
        let (reply, conn) = self.reply_and_connection(id)?;
        if conn.status.handshake() != HandshakeState::None {
            return Ok(());
        }
        let version = reply.version_message(&conn.status);
        conn.status.set_handshake(HandshakeState::Sent);
        conn.send.push(version);
        Ok(())
    }

    /// Feed bytes received from the peer. Complete messages are
    /// dispatched to the reply engine and any replies are queued for
    /// sending; malformed frames produce reject messages.
    pub fn feed(&mut self, id: ConnectionId, bytes: &[u8]) -> P2pResult<()> {
        let (reply_engine, conn) = self.reply_and_connection(id)?;
        for outcome in conn.framer.feed(bytes) {
            match outcome {
                FrameOutcome::Message(message) => {
                    for reply in reply_engine.reply(&mut conn.status, &message) {
                        conn.send.push(reply);
                    }
                }
                FrameOutcome::BadMessage { command, error } => {
                    debug!(%id, %command, %error, "rejecting undecodable message");
                    conn.status.add_small_violation();
                    conn.send.push(reject_message(&command, &error));
                }
                FrameOutcome::BadHeader { command, error } => {
                    debug!(%id, %command, %error, "rejecting malformed header");
                    conn.send.push(reject_message(&command, &error));
                }
            }
        }
        Ok(())
    }

    /// Take up to `max_len` bytes of queued outbound data, or `None`
    /// when nothing is waiting.
    pub fn drain_send(&mut self, id: ConnectionId, max_len: usize) -> P2pResult<Option<Bytes>> {
        Ok(self.connection_mut(id)?.send.next_chunk(max_len))
    }

    /// Whether outbound bytes are waiting for this connection.
    pub fn has_pending_send(&self, id: ConnectionId) -> P2pResult<bool> {
        Ok(self.connection(id)?.send.has_pending())
    }

    /// Whether the reply engine wants this connection dropped (ban
    /// threshold passed, unsupported version, or useless sync peer).
    pub fn wants_disconnect(&self, id: ConnectionId) -> P2pResult<bool> {
        Ok(self.connection(id)?.status.should_disconnect())
    }

    /// Read-only view of a connection's peer status.
    pub fn peer_status(&self, id: ConnectionId) -> P2pResult<&PeerStatus> {
        Ok(&self.connection(id)?.status)
    }

    /// Clear all per-connection state for reuse: buffers, queue,
    /// handshake, and violation score.
    pub fn reset(&mut self, id: ConnectionId) -> P2pResult<()> {
        let ban_threshold = self.policy.ban_threshold;
        let conn = self.connection_mut(id)?;
        conn.framer.reset();
        conn.send.reset();
        conn.status = PeerStatus::new(conn.status.remote(), ban_threshold);
        Ok(())
    }

    /// Forget a connection entirely.
    pub fn remove(&mut self, id: ConnectionId) -> P2pResult<()> {
        self.connections
            .remove(&id)
            .map(|_| info!(%id, "connection removed"))
            .ok_or(P2pError::UnknownConnection(id.0))
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    fn connection(&self, id: ConnectionId) -> P2pResult<&Connection> {
        self.connections.get(&id).ok_or(P2pError::UnknownConnection(id.0))
    }

    fn connection_mut(&mut self, id: ConnectionId) -> P2pResult<&mut Connection> {
        self.connections.get_mut(&id).ok_or(P2pError::UnknownConnection(id.0))
    }

    /// Split-borrow helper: the reply engine and one connection are
    /// disjoint fields, but the borrow checker needs to see that.
    fn reply_and_connection(
        &mut self,
        id: ConnectionId,
    ) -> P2pResult<(&ReplyEngine, &mut Connection)> {
        let Self { reply, connections, .. } = self;
        let conn = connections.get_mut(&id).ok_or(P2pError::UnknownConnection(id.0))?;
        Ok((reply, conn))
    }
}

fn reject_message(command: &str, error: &P2pError) -> Message {
    let body = RejectPayload::new(command, RejectCode::Malformed, error.to_string());
    Message::new(Payload::Reject(body.to_bytes()))
}
