//! Per-connection peer state.
//!
//! Every connection owns exactly one [`PeerStatus`]; nothing here is
//! shared across connections, so no locking is needed. The reply
//! engine reaches the state through the [`NodeStatus`] trait, which
//! keeps its decision logic testable against a scripted peer.

pub mod handshake;
pub mod status;

pub use handshake::HandshakeState;
pub use status::{NodeStatus, PeerStatus};
