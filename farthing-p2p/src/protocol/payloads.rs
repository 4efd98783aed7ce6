//! Typed message payloads.
//!
//! Each protocol command maps 1:1 to a [`Payload`] variant, and each
//! variant owns its binary field layout. Commands this engine has never
//! heard of decode into [`Payload::Unknown`] with the raw bytes kept,
//! so framing stays forward-compatible.

use std::net::{IpAddr, Ipv6Addr};

use bytes::Bytes;

use farthing_core::{BlockHeader, CompactSize, DecodeError, RawBlock, RawTransaction};
use farthing_core::{ByteReader, ByteWriter};

use crate::config::{MAX_ADDR_PER_MESSAGE, MAX_HEADERS_PER_MESSAGE, MAX_INV_PER_MESSAGE};
use crate::protocol::services::ServiceFlags;

/// Maximum user agent length in bytes.
pub const MAX_USER_AGENT_SIZE: u64 = 100;

/// Maximum block locator hashes in a `getheaders` request.
pub const MAX_LOCATOR_HASHES: usize = 101;

/// Parse the printable prefix of a zero-padded 12-byte command field.
///
/// Returns `None` when the field is not ASCII-graphic followed by
/// zero padding only.
pub(crate) fn parse_command(command: &[u8; 12]) -> Option<&str> {
    let end = command.iter().position(|&b| b == 0).unwrap_or(12);
    if end == 0 {
        return None;
    }
    let (name, padding) = command.split_at(end);
    if !padding.iter().all(|&b| b == 0) {
        return None;
    }
    if !name.iter().all(|&b| b.is_ascii_graphic()) {
        return None;
    }
    // all-ASCII by construction
    std::str::from_utf8(name).ok()
}

/// Zero-pad a command name into the 12-byte header field.
pub(crate) fn pad_command(name: &str) -> [u8; 12] {
    debug_assert!(name.len() <= 12);
    let mut out = [0u8; 12];
    out[..name.len()].copy_from_slice(name.as_bytes());
    out
}

fn write_ip(writer: &mut ByteWriter, ip: IpAddr) {
    let octets = match ip {
        IpAddr::V4(v4) => v4.to_ipv6_mapped().octets(),
        IpAddr::V6(v6) => v6.octets(),
    };
    writer.write_bytes(&octets);
}

fn read_ip(reader: &mut ByteReader<'_>) -> Result<IpAddr, DecodeError> {
    let octets: [u8; 16] = reader.read_array()?;
    let v6 = Ipv6Addr::from(octets);
    Ok(match v6.to_ipv4_mapped() {
        Some(v4) => IpAddr::V4(v4),
        None => IpAddr::V6(v6),
    })
}

/// A network address as embedded in version messages (no timestamp).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NetworkAddress {
    /// Services the addressed node advertises.
    pub services: ServiceFlags,
    /// IP address; IPv4 travels v4-mapped inside 16 bytes.
    pub ip: IpAddr,
    /// Port, big-endian on the wire.
    pub port: u16,
}

impl NetworkAddress {
    /// Serialized size on the wire.
    pub const SIZE: usize = 26;

    /// An unroutable all-zero address (used as a placeholder).
    pub fn unspecified(services: ServiceFlags) -> Self {
        Self { services, ip: IpAddr::V6(Ipv6Addr::UNSPECIFIED), port: 0 }
    }

    /// Append the 26-byte encoding to `writer`.
    pub fn encode(&self, writer: &mut ByteWriter) {
        writer.write_u64_le(self.services.0);
        write_ip(writer, self.ip);
        writer.write_u16_be(self.port);
    }

    /// Decode a 26-byte address from `reader`.
    pub fn decode(reader: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            services: ServiceFlags(reader.read_u64_le()?),
            ip: read_ip(reader)?,
            port: reader.read_u16_be()?,
        })
    }
}

/// A network address with a last-seen timestamp, as gossiped in `addr`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NetworkAddressWithTime {
    /// Last time this address was seen (Unix seconds).
    pub time: u32,
    /// Services the addressed node advertises.
    pub services: ServiceFlags,
    /// IP address.
    pub ip: IpAddr,
    /// Port.
    pub port: u16,
}

impl NetworkAddressWithTime {
    /// Serialized size on the wire.
    pub const SIZE: usize = 30;

    /// Append the 30-byte encoding to `writer`.
    pub fn encode(&self, writer: &mut ByteWriter) {
        writer.write_u32_le(self.time);
        writer.write_u64_le(self.services.0);
        write_ip(writer, self.ip);
        writer.write_u16_be(self.port);
    }

    /// Decode a 30-byte timestamped address from `reader`.
    pub fn decode(reader: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            time: reader.read_u32_le()?,
            services: ServiceFlags(reader.read_u64_le()?),
            ip: read_ip(reader)?,
            port: reader.read_u16_be()?,
        })
    }
}

/// The `version` payload opening a handshake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionPayload {
    /// Protocol version of the transmitting node.
    pub version: i32,
    /// Services of the transmitting node.
    pub services: ServiceFlags,
    /// Transmitting node's clock (Unix seconds).
    pub timestamp: i64,
    /// Address of the receiving node as seen by the transmitter.
    pub receiver: NetworkAddress,
    /// Address of the transmitting node.
    pub transmitter: NetworkAddress,
    /// Random nonce for self-connection detection.
    pub nonce: u64,
    /// User agent (BIP 14 style), at most 100 bytes.
    pub user_agent: String,
    /// Height of the transmitter's best chain, clamped to >= 0.
    pub start_height: i32,
    /// Whether the transmitter wants transaction relay. Absent on the
    /// wire means `true` for pre-BIP 37 compatibility.
    pub relay: bool,
}

impl VersionPayload {
    /// Append the encoding to `writer`.
    pub fn encode(&self, writer: &mut ByteWriter) {
        writer.write_i32_le(self.version);
        writer.write_u64_le(self.services.0);
        writer.write_i64_le(self.timestamp);
        self.receiver.encode(writer);
        self.transmitter.encode(writer);
        writer.write_u64_le(self.nonce);
        writer.write_var_bytes(self.user_agent.as_bytes());
        writer.write_i32_le(self.start_height.max(0));
        writer.write_u8(u8::from(self.relay));
    }

    /// Decode a version payload from `reader`.
    pub fn decode(reader: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let version = reader.read_i32_le()?;
        let services = ServiceFlags(reader.read_u64_le()?);
        let timestamp = reader.read_i64_le()?;
        let receiver = NetworkAddress::decode(reader)?;
        let transmitter = NetworkAddress::decode(reader)?;
        let nonce = reader.read_u64_le()?;

        let ua_bytes = reader.read_var_bytes(MAX_USER_AGENT_SIZE, "user agent")?;
        let user_agent = std::str::from_utf8(ua_bytes)
            .map_err(|_| DecodeError::InvalidValue { field: "user agent", reason: "not valid UTF-8" })?
            .to_string();

        let start_height = reader.read_i32_le()?.max(0);

        let relay = if reader.remaining() == 0 {
            true
        } else {
            match reader.read_u8()? {
                0 => false,
                1 => true,
                _ => {
                    return Err(DecodeError::InvalidValue { field: "relay", reason: "must be 0 or 1" })
                }
            }
        };

        Ok(Self {
            version,
            services,
            timestamp,
            receiver,
            transmitter,
            nonce,
            user_agent,
            start_height,
            relay,
        })
    }
}

/// Inventory item type in `inv` announcements.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvKind {
    /// A transaction.
    Tx,
    /// A block.
    Block,
    /// A bloom-filtered block.
    FilteredBlock,
    /// A compact block.
    CompactBlock,
    /// A transaction with witness data.
    WitnessTx,
    /// A block with witness data.
    WitnessBlock,
    /// A type code this engine does not recognize.
    Other(u32),
}

impl InvKind {
    /// Wire value for this type.
    pub fn to_u32(self) -> u32 {
        match self {
            InvKind::Tx => 1,
            InvKind::Block => 2,
            InvKind::FilteredBlock => 3,
            InvKind::CompactBlock => 4,
            InvKind::WitnessTx => 0x4000_0001,
            InvKind::WitnessBlock => 0x4000_0002,
            InvKind::Other(v) => v,
        }
    }

    /// Map a wire value to its type.
    pub fn from_u32(value: u32) -> Self {
        match value {
            1 => InvKind::Tx,
            2 => InvKind::Block,
            3 => InvKind::FilteredBlock,
            4 => InvKind::CompactBlock,
            0x4000_0001 => InvKind::WitnessTx,
            0x4000_0002 => InvKind::WitnessBlock,
            v => InvKind::Other(v),
        }
    }

    /// Whether this announces a transaction (plain or witness).
    pub fn is_tx(self) -> bool {
        matches!(self, InvKind::Tx | InvKind::WitnessTx)
    }
}

/// One entry of an `inv` message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Inventory {
    /// What is being announced.
    pub kind: InvKind,
    /// Hash of the announced item.
    pub hash: [u8; 32],
}

impl Inventory {
    /// Append the 36-byte encoding to `writer`.
    pub fn encode(&self, writer: &mut ByteWriter) {
        writer.write_u32_le(self.kind.to_u32());
        writer.write_bytes(&self.hash);
    }

    /// Decode a 36-byte entry from `reader`.
    pub fn decode(reader: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            kind: InvKind::from_u32(reader.read_u32_le()?),
            hash: reader.read_array()?,
        })
    }
}

/// The `getheaders` payload requesting a header range.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GetHeadersPayload {
    /// Protocol version of the requester.
    pub version: i32,
    /// Block locator: header hashes from the tip backwards.
    pub locator_hashes: Vec<[u8; 32]>,
    /// Stop at this header, or all-zero for "as many as allowed".
    pub stop_hash: [u8; 32],
}

impl GetHeadersPayload {
    /// Build a request from locator headers (hashed here) with an
    /// optional stop hash.
    pub fn from_locator(version: i32, locator: &[BlockHeader], stop_hash: Option<[u8; 32]>) -> Self {
        Self {
            version,
            locator_hashes: locator.iter().map(BlockHeader::hash).collect(),
            stop_hash: stop_hash.unwrap_or([0u8; 32]),
        }
    }

    /// Append the encoding to `writer`.
    pub fn encode(&self, writer: &mut ByteWriter) {
        writer.write_i32_le(self.version);
        CompactSize(self.locator_hashes.len() as u64).encode(writer);
        for hash in &self.locator_hashes {
            writer.write_bytes(hash);
        }
        writer.write_bytes(&self.stop_hash);
    }

    /// Decode a `getheaders` payload from `reader`.
    pub fn decode(reader: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let version = reader.read_i32_le()?;
        let count = CompactSize::decode(reader)?.0;
        if count > MAX_LOCATOR_HASHES as u64 {
            return Err(DecodeError::OversizedField {
                field: "locator hashes",
                value: count,
                max: MAX_LOCATOR_HASHES as u64,
            });
        }
        let mut locator_hashes = Vec::with_capacity(count as usize);
        for _ in 0..count {
            locator_hashes.push(reader.read_array()?);
        }
        let stop_hash = reader.read_array()?;
        Ok(Self { version, locator_hashes, stop_hash })
    }
}

/// Compact-block preference announced via `sendcmpct` (BIP 152).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SendCmpctPayload {
    /// Whether blocks should be announced as compact blocks.
    pub announce: bool,
    /// Compact block protocol version.
    pub version: u64,
}

impl SendCmpctPayload {
    /// Append the 9-byte encoding to `writer`.
    pub fn encode(&self, writer: &mut ByteWriter) {
        writer.write_u8(u8::from(self.announce));
        writer.write_u64_le(self.version);
    }

    /// Decode a `sendcmpct` payload from `reader`.
    pub fn decode(reader: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let announce = match reader.read_u8()? {
            0 => false,
            1 => true,
            _ => {
                return Err(DecodeError::InvalidValue { field: "announce", reason: "must be 0 or 1" })
            }
        };
        Ok(Self { announce, version: reader.read_u64_le()? })
    }
}

/// Machine-readable category of a `reject` message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectCode {
    /// The message could not be decoded.
    Malformed,
    /// The item was invalid (bad block, bad signature, ...).
    Invalid,
    /// The item or protocol feature is obsolete.
    Obsolete,
    /// The item was already received.
    Duplicate,
    /// The transaction is non-standard.
    NonStandard,
    /// An output was below the dust threshold.
    Dust,
    /// The fee was insufficient.
    InsufficientFee,
    /// The block conflicts with a checkpoint.
    Checkpoint,
    /// A code this engine does not recognize.
    Other(u8),
}

impl RejectCode {
    /// Wire value for this code.
    pub fn to_u8(self) -> u8 {
        match self {
            RejectCode::Malformed => 0x01,
            RejectCode::Invalid => 0x10,
            RejectCode::Obsolete => 0x11,
            RejectCode::Duplicate => 0x12,
            RejectCode::NonStandard => 0x40,
            RejectCode::Dust => 0x41,
            RejectCode::InsufficientFee => 0x42,
            RejectCode::Checkpoint => 0x43,
            RejectCode::Other(v) => v,
        }
    }

    /// Map a wire value to its code.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x01 => RejectCode::Malformed,
            0x10 => RejectCode::Invalid,
            0x11 => RejectCode::Obsolete,
            0x12 => RejectCode::Duplicate,
            0x40 => RejectCode::NonStandard,
            0x41 => RejectCode::Dust,
            0x42 => RejectCode::InsufficientFee,
            0x43 => RejectCode::Checkpoint,
            v => RejectCode::Other(v),
        }
    }
}

/// A `reject` message body.
///
/// Received rejects are kept as raw bytes and ignored; this struct
/// exists for the rejects the engine itself emits (and for tests that
/// want to look inside them).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RejectPayload {
    /// Command of the message being rejected.
    pub message: String,
    /// Category of the rejection.
    pub code: RejectCode,
    /// Human-readable reason.
    pub reason: String,
    /// Optional extra data (e.g. the hash of a rejected block or tx).
    pub data: Vec<u8>,
}

impl RejectPayload {
    /// Build a rejection for `command` with the given code and reason.
    pub fn new(command: impl Into<String>, code: RejectCode, reason: impl Into<String>) -> Self {
        Self { message: command.into(), code, reason: reason.into(), data: Vec::new() }
    }

    /// Encode to raw payload bytes.
    pub fn to_bytes(&self) -> Bytes {
        let mut w = ByteWriter::new();
        w.write_var_bytes(self.message.as_bytes());
        w.write_u8(self.code.to_u8());
        w.write_var_bytes(self.reason.as_bytes());
        w.write_bytes(&self.data);
        w.into_bytes()
    }

    /// Decode from raw payload bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut r = ByteReader::new(bytes);
        let message = std::str::from_utf8(r.read_var_bytes(12, "rejected command")?)
            .map_err(|_| DecodeError::InvalidValue { field: "rejected command", reason: "not valid UTF-8" })?
            .to_string();
        let code = RejectCode::from_u8(r.read_u8()?);
        let reason = std::str::from_utf8(r.read_var_bytes(111, "reject reason")?)
            .map_err(|_| DecodeError::InvalidValue { field: "reject reason", reason: "not valid UTF-8" })?
            .to_string();
        let data = r.read_rest().to_vec();
        Ok(Self { message, code, reason, data })
    }
}

/// Tag identifying a payload variant, derived from the command field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    /// `version`
    Version,
    /// `verack`
    Verack,
    /// `ping`
    Ping,
    /// `pong`
    Pong,
    /// `addr`
    Addr,
    /// `getaddr`
    GetAddr,
    /// `inv`
    Inv,
    /// `getheaders`
    GetHeaders,
    /// `headers`
    Headers,
    /// `block`
    Block,
    /// `tx`
    Tx,
    /// `feefilter`
    FeeFilter,
    /// `sendcmpct`
    SendCmpct,
    /// `sendheaders`
    SendHeaders,
    /// `reject`
    Reject,
    /// `alert`
    Alert,
    /// Anything else.
    Unknown,
}

impl PayloadKind {
    /// Command name for this kind (`"unknown"` for [`PayloadKind::Unknown`]).
    pub fn command(self) -> &'static str {
        match self {
            PayloadKind::Version => "version",
            PayloadKind::Verack => "verack",
            PayloadKind::Ping => "ping",
            PayloadKind::Pong => "pong",
            PayloadKind::Addr => "addr",
            PayloadKind::GetAddr => "getaddr",
            PayloadKind::Inv => "inv",
            PayloadKind::GetHeaders => "getheaders",
            PayloadKind::Headers => "headers",
            PayloadKind::Block => "block",
            PayloadKind::Tx => "tx",
            PayloadKind::FeeFilter => "feefilter",
            PayloadKind::SendCmpct => "sendcmpct",
            PayloadKind::SendHeaders => "sendheaders",
            PayloadKind::Reject => "reject",
            PayloadKind::Alert => "alert",
            PayloadKind::Unknown => "unknown",
        }
    }

    /// Map a 12-byte command field to its kind.
    pub fn from_command(command: &[u8; 12]) -> Self {
        match parse_command(command) {
            Some("version") => PayloadKind::Version,
            Some("verack") => PayloadKind::Verack,
            Some("ping") => PayloadKind::Ping,
            Some("pong") => PayloadKind::Pong,
            Some("addr") => PayloadKind::Addr,
            Some("getaddr") => PayloadKind::GetAddr,
            Some("inv") => PayloadKind::Inv,
            Some("getheaders") => PayloadKind::GetHeaders,
            Some("headers") => PayloadKind::Headers,
            Some("block") => PayloadKind::Block,
            Some("tx") => PayloadKind::Tx,
            Some("feefilter") => PayloadKind::FeeFilter,
            Some("sendcmpct") => PayloadKind::SendCmpct,
            Some("sendheaders") => PayloadKind::SendHeaders,
            Some("reject") => PayloadKind::Reject,
            Some("alert") => PayloadKind::Alert,
            _ => PayloadKind::Unknown,
        }
    }
}

/// A decoded message payload.
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(clippy::large_enum_variant)]
pub enum Payload {
    /// Handshake opener.
    Version(VersionPayload),
    /// Handshake acknowledgement.
    Verack,
    /// Keepalive probe with a nonce.
    Ping(u64),
    /// Keepalive answer echoing the nonce.
    Pong(u64),
    /// Gossip of known peer addresses.
    Addr(Vec<NetworkAddressWithTime>),
    /// Request for peer addresses.
    GetAddr,
    /// Inventory announcement.
    Inv(Vec<Inventory>),
    /// Request for block headers.
    GetHeaders(GetHeadersPayload),
    /// Block headers response.
    Headers(Vec<BlockHeader>),
    /// A full block.
    Block(RawBlock),
    /// A transaction.
    Tx(RawTransaction),
    /// Minimum fee rate for relay, in sat/kvB.
    FeeFilter(u64),
    /// Compact-block preference.
    SendCmpct(SendCmpctPayload),
    /// Request to announce blocks via `headers` instead of `inv`.
    SendHeaders,
    /// A rejection notice; received bodies are kept raw and ignored.
    Reject(Bytes),
    /// Legacy alert; always kept raw and ignored.
    Alert(Bytes),
    /// A command this engine does not know; raw bytes preserved.
    Unknown {
        /// The header's command field.
        command: [u8; 12],
        /// The raw payload bytes.
        data: Bytes,
    },
}

impl Payload {
    /// The tag for this payload.
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::Version(_) => PayloadKind::Version,
            Payload::Verack => PayloadKind::Verack,
            Payload::Ping(_) => PayloadKind::Ping,
            Payload::Pong(_) => PayloadKind::Pong,
            Payload::Addr(_) => PayloadKind::Addr,
            Payload::GetAddr => PayloadKind::GetAddr,
            Payload::Inv(_) => PayloadKind::Inv,
            Payload::GetHeaders(_) => PayloadKind::GetHeaders,
            Payload::Headers(_) => PayloadKind::Headers,
            Payload::Block(_) => PayloadKind::Block,
            Payload::Tx(_) => PayloadKind::Tx,
            Payload::FeeFilter(_) => PayloadKind::FeeFilter,
            Payload::SendCmpct(_) => PayloadKind::SendCmpct,
            Payload::SendHeaders => PayloadKind::SendHeaders,
            Payload::Reject(_) => PayloadKind::Reject,
            Payload::Alert(_) => PayloadKind::Alert,
            Payload::Unknown { .. } => PayloadKind::Unknown,
        }
    }

    /// The 12-byte command field for this payload.
    pub fn command(&self) -> [u8; 12] {
        match self {
            Payload::Unknown { command, .. } => *command,
            other => pad_command(other.kind().command()),
        }
    }

    /// Append the payload bytes (header excluded) to `writer`.
    pub fn encode_to(&self, writer: &mut ByteWriter) {
        match self {
            Payload::Version(v) => v.encode(writer),
            Payload::Verack | Payload::GetAddr | Payload::SendHeaders => {}
            Payload::Ping(nonce) | Payload::Pong(nonce) => writer.write_u64_le(*nonce),
            Payload::Addr(addrs) => {
                CompactSize(addrs.len() as u64).encode(writer);
                for addr in addrs {
                    addr.encode(writer);
                }
            }
            Payload::Inv(entries) => {
                CompactSize(entries.len() as u64).encode(writer);
                for entry in entries {
                    entry.encode(writer);
                }
            }
            Payload::GetHeaders(gh) => gh.encode(writer),
            Payload::Headers(headers) => {
                CompactSize(headers.len() as u64).encode(writer);
                for header in headers {
                    header.encode(writer);
                    // headers messages carry an always-zero tx count
                    CompactSize(0).encode(writer);
                }
            }
            Payload::Block(block) => {
                block.header.encode(writer);
                writer.write_bytes(&block.txdata);
            }
            Payload::Tx(tx) => writer.write_bytes(tx.as_bytes()),
            Payload::FeeFilter(rate) => writer.write_u64_le(*rate),
            Payload::SendCmpct(sc) => sc.encode(writer),
            Payload::Reject(raw) | Payload::Alert(raw) => writer.write_bytes(raw),
            Payload::Unknown { data, .. } => writer.write_bytes(data),
        }
    }

    /// Decode the payload bytes for a framed message.
    ///
    /// `command` is the raw header field, kept verbatim for unknown
    /// commands. Trailing bytes beyond a variant's fields are
    /// tolerated, matching the network's lenient decoders.
    pub fn decode(kind: PayloadKind, command: [u8; 12], bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut r = ByteReader::new(bytes);
        let payload = match kind {
            PayloadKind::Version => Payload::Version(VersionPayload::decode(&mut r)?),
            PayloadKind::Verack => Payload::Verack,
            PayloadKind::Ping => Payload::Ping(r.read_u64_le()?),
            PayloadKind::Pong => Payload::Pong(r.read_u64_le()?),
            PayloadKind::Addr => {
                let count = CompactSize::decode(&mut r)?.0;
                if count > MAX_ADDR_PER_MESSAGE as u64 {
                    return Err(DecodeError::OversizedField {
                        field: "addresses",
                        value: count,
                        max: MAX_ADDR_PER_MESSAGE as u64,
                    });
                }
                let mut addrs = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    addrs.push(NetworkAddressWithTime::decode(&mut r)?);
                }
                Payload::Addr(addrs)
            }
            PayloadKind::GetAddr => Payload::GetAddr,
            PayloadKind::Inv => {
                let count = CompactSize::decode(&mut r)?.0;
                if count > MAX_INV_PER_MESSAGE as u64 {
                    return Err(DecodeError::OversizedField {
                        field: "inventory entries",
                        value: count,
                        max: MAX_INV_PER_MESSAGE as u64,
                    });
                }
                let mut entries = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    entries.push(Inventory::decode(&mut r)?);
                }
                Payload::Inv(entries)
            }
            PayloadKind::GetHeaders => Payload::GetHeaders(GetHeadersPayload::decode(&mut r)?),
            PayloadKind::Headers => {
                let count = CompactSize::decode(&mut r)?.0;
                if count > MAX_HEADERS_PER_MESSAGE as u64 {
                    return Err(DecodeError::OversizedField {
                        field: "headers",
                        value: count,
                        max: MAX_HEADERS_PER_MESSAGE as u64,
                    });
                }
                let mut headers = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    headers.push(BlockHeader::decode(&mut r)?);
                    // per-header tx count, always present, value unused
                    CompactSize::decode(&mut r)?;
                }
                Payload::Headers(headers)
            }
            PayloadKind::Block => {
                let header = BlockHeader::decode(&mut r)?;
                let txdata = Bytes::copy_from_slice(r.read_rest());
                Payload::Block(RawBlock { header, txdata })
            }
            PayloadKind::Tx => Payload::Tx(RawTransaction(Bytes::copy_from_slice(r.read_rest()))),
            PayloadKind::FeeFilter => Payload::FeeFilter(r.read_u64_le()?),
            PayloadKind::SendCmpct => Payload::SendCmpct(SendCmpctPayload::decode(&mut r)?),
            PayloadKind::SendHeaders => Payload::SendHeaders,
            PayloadKind::Reject => Payload::Reject(Bytes::copy_from_slice(bytes)),
            PayloadKind::Alert => Payload::Alert(Bytes::copy_from_slice(bytes)),
            PayloadKind::Unknown => {
                Payload::Unknown { command, data: Bytes::copy_from_slice(bytes) }
            }
        };
        Ok(payload)
    }
}
