//! The message envelope: a 24-byte header wrapped around payload bytes.

use bytes::Bytes;

use farthing_core::checksum;
use farthing_core::{ByteReader, ByteWriter, DecodeError};

use crate::config::MAX_PAYLOAD_SIZE;
use crate::error::{P2pError, P2pResult};
use crate::protocol::payloads::{parse_command, Payload, PayloadKind};

/// The fixed-size header preceding every payload on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessageHeader {
    /// Network magic bytes.
    pub magic: [u8; 4],
    /// ASCII command name, zero-padded to 12 bytes.
    pub command: [u8; 12],
    /// Payload length in bytes.
    pub length: u32,
    /// First four bytes of the double SHA-256 of the payload.
    pub checksum: [u8; 4],
}

impl MessageHeader {
    /// Serialized size of the header.
    pub const SIZE: usize = 24;

    /// Build a header for `payload` on the network identified by `magic`.
    pub fn for_payload(magic: [u8; 4], command: [u8; 12], payload: &[u8]) -> Self {
        Self { magic, command, length: payload.len() as u32, checksum: checksum(payload) }
    }

    /// Append the 24-byte encoding to `writer`.
    pub fn encode(&self, writer: &mut ByteWriter) {
        writer.write_bytes(&self.magic);
        writer.write_bytes(&self.command);
        writer.write_u32_le(self.length);
        writer.write_bytes(&self.checksum);
    }

    /// Decode the raw header fields without judging their validity.
    ///
    /// Validity is a separate step ([`MessageHeader::validate`]) because
    /// the framer wants the decoded command even from a header it is
    /// about to reject.
    pub fn decode(reader: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            magic: reader.read_array()?,
            command: reader.read_array()?,
            length: reader.read_u32_le()?,
            checksum: reader.read_array()?,
        })
    }

    /// Check structural validity against the expected network magic.
    pub fn validate(&self, magic: [u8; 4]) -> P2pResult<()> {
        if self.magic != magic {
            return Err(P2pError::MalformedHeader("wrong network magic"));
        }
        if self.length > MAX_PAYLOAD_SIZE {
            return Err(P2pError::MalformedHeader("payload length over maximum"));
        }
        if parse_command(&self.command).is_none() {
            return Err(P2pError::MalformedHeader("unprintable command field"));
        }
        Ok(())
    }

    /// The command name, if the field is well formed.
    pub fn command_str(&self) -> Option<&str> {
        parse_command(&self.command)
    }

    /// Best-effort command name for reporting, `"unknown"` when the
    /// field is garbage.
    pub fn recovered_command(&self) -> &str {
        self.command_str().unwrap_or("unknown")
    }
}

/// A complete protocol message.
///
/// The header is derived, not stored: length and checksum always match
/// the payload by construction, and the magic is supplied at encode
/// time by whoever knows the network.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    /// The typed payload.
    pub payload: Payload,
}

impl Message {
    /// Wrap a payload in a message.
    pub fn new(payload: Payload) -> Self {
        Self { payload }
    }

    /// The command name for logging.
    pub fn command_str(&self) -> &'static str {
        self.payload.kind().command()
    }

    /// Serialize header plus payload for the network with the given magic.
    pub fn encode(&self, magic: [u8; 4]) -> Bytes {
        let mut body = ByteWriter::new();
        self.payload.encode_to(&mut body);
        let body = body.into_bytes();

        let header = MessageHeader::for_payload(magic, self.payload.command(), &body);
        let mut w = ByteWriter::with_capacity(MessageHeader::SIZE + body.len());
        header.encode(&mut w);
        w.write_bytes(&body);
        w.into_bytes()
    }

    /// Assemble a message from a validated header and its payload bytes,
    /// verifying the checksum and decoding the typed payload.
    pub fn from_wire(header: &MessageHeader, payload: &[u8]) -> P2pResult<Self> {
        let actual = checksum(payload);
        if actual != header.checksum {
            return Err(P2pError::ChecksumMismatch {
                command: header.recovered_command().to_string(),
                expected: header.checksum,
                actual,
            });
        }
        let kind = PayloadKind::from_command(&header.command);
        let payload = Payload::decode(kind, header.command, payload).map_err(|source| {
            P2pError::PayloadDecode { command: header.recovered_command().to_string(), source }
        })?;
        Ok(Self { payload })
    }

    /// Decode one message from the start of `bytes`, returning it with
    /// the number of bytes consumed. Test and tooling convenience; the
    /// engine itself frames through [`crate::protocol::Framer`].
    pub fn decode(bytes: &[u8], magic: [u8; 4]) -> P2pResult<(Self, usize)> {
        let mut r = ByteReader::new(bytes);
        let header = MessageHeader::decode(&mut r)
            .map_err(|_| P2pError::MalformedHeader("incomplete header"))?;
        header.validate(magic)?;
        let payload = r
            .read_bytes(header.length as usize)
            .map_err(|_| P2pError::MalformedHeader("incomplete payload"))?;
        let message = Message::from_wire(&header, payload)?;
        Ok((message, MessageHeader::SIZE + header.length as usize))
    }
}
