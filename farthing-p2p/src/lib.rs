//! Bitcoin P2P wire-protocol engine.
//!
//! This crate owns the adversarial part of running a node: turning an
//! untrusted byte stream into protocol messages, walking the
//! version/verack handshake, and deciding replies while scoring
//! misbehavior. It does no socket I/O and validates no consensus
//! rules; the socket owner calls [`Engine::feed`] and
//! [`Engine::drain_send`], and chain, address book, and mempool are
//! reached through the traits in [`chain`].
//!
//! Layering, bottom up:
//! - [`protocol`] — wire codec, typed payloads, stream framer
//! - [`peer`] — per-connection handshake and status tracking
//! - [`reply`] — per-message reply decisions
//! - [`engine`] — the per-connection facade over all of the above

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod chain;
pub mod config;
pub mod engine;
pub mod error;
pub mod peer;
pub mod protocol;
pub mod reply;

pub use chain::{AddressBook, Blockchain, HeadersOutcome, Mempool};
pub use config::{ClientPolicy, Network};
pub use engine::{ConnectionId, Engine};
pub use error::{P2pError, P2pResult};
pub use peer::{HandshakeState, NodeStatus, PeerStatus};
pub use protocol::{Message, Payload};
pub use reply::ReplyEngine;
