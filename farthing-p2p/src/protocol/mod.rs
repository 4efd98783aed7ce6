//! The P2P wire protocol: typed payloads, the message codec, and the
//! per-connection stream framer.
//!
//! Layering, bottom up:
//! - [`services`] — the service-flag bitfield advertised in handshakes
//! - [`payloads`] — one typed variant per protocol command, each owning
//!   its binary encode/decode contract
//! - [`message`] — the 24-byte header (magic, command, length,
//!   checksum) wrapped around a payload
//! - [`framing`] — reassembly of messages from arbitrary TCP read
//!   boundaries, plus the outbound send queue

pub mod framing;
pub mod message;
pub mod payloads;
pub mod services;

pub use framing::{FrameOutcome, Framer, SendQueue};
pub use message::{Message, MessageHeader};
pub use payloads::{
    GetHeadersPayload, InvKind, Inventory, NetworkAddress, NetworkAddressWithTime, Payload,
    PayloadKind, RejectCode, RejectPayload, SendCmpctPayload, VersionPayload,
};
pub use services::ServiceFlags;
