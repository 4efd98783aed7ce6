//! Stream framing: reassembling messages from arbitrary TCP read
//! boundaries, and chunking outbound messages for bounded writes.
//!
//! The framer is transport-free. The owning connection feeds it raw
//! received bytes and drains [`FrameOutcome`]s; what to do about a bad
//! frame (reject, penalize, disconnect) is the reply engine's call.

use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};
use tracing::{debug, trace};

use farthing_core::ByteReader;

use crate::error::P2pError;
use crate::protocol::message::{Message, MessageHeader};

/// One result of feeding bytes to the [`Framer`].
#[derive(Debug)]
pub enum FrameOutcome {
    /// A complete, checksum-verified, decoded message.
    Message(Message),
    /// A frame dropped for a bad checksum or an undecodable payload.
    /// Only this frame was discarded; framing continues behind it.
    BadMessage {
        /// Command named by the frame's header.
        command: String,
        /// What went wrong.
        error: P2pError,
    },
    /// A structurally invalid header. The receive buffer was discarded
    /// because frame boundaries can no longer be trusted.
    BadHeader {
        /// Best-effort command recovered from the header.
        command: String,
        /// What went wrong.
        error: P2pError,
    },
}

/// Reassembles protocol messages from a byte stream.
///
/// Incomplete frames are stashed until more bytes arrive; feeding the
/// same byte sequence in different chunkings yields the same outcomes.
#[derive(Debug)]
pub struct Framer {
    magic: [u8; 4],
    pending: BytesMut,
}

impl Framer {
    /// Create a framer expecting the given network magic.
    pub fn new(magic: [u8; 4]) -> Self {
        Self { magic, pending: BytesMut::new() }
    }

    /// Number of stashed bytes awaiting completion.
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    /// Drop all stashed bytes.
    pub fn reset(&mut self) {
        self.pending.clear();
    }

    /// Feed received bytes and extract every completable frame.
    ///
    /// Iterative by design: a single read may carry many pipelined
    /// messages, and recursion depth must not depend on peer behavior.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<FrameOutcome> {
        self.pending.extend_from_slice(chunk);
        let mut outcomes = Vec::new();

        loop {
            if !self.align_to_magic() {
                break;
            }
            if self.pending.len() < MessageHeader::SIZE {
                break;
            }

            let header = {
                let mut r = ByteReader::new(&self.pending);
                // 24 bytes are present, this cannot fail
                MessageHeader::decode(&mut r).expect("header bytes present")
            };

            if let Err(error) = header.validate(self.magic) {
                let command = header.recovered_command().to_string();
                debug!(%command, %error, "discarding receive buffer after malformed header");
                self.pending.clear();
                outcomes.push(FrameOutcome::BadHeader { command, error });
                break;
            }

            let frame_len = MessageHeader::SIZE + header.length as usize;
            if self.pending.len() < frame_len {
                break;
            }

            let frame = self.pending.split_to(frame_len);
            let payload = &frame[MessageHeader::SIZE..];
            match Message::from_wire(&header, payload) {
                Ok(message) => outcomes.push(FrameOutcome::Message(message)),
                Err(error) => {
                    let command = header.recovered_command().to_string();
                    debug!(%command, %error, "dropping undecodable frame");
                    outcomes.push(FrameOutcome::BadMessage { command, error });
                }
            }
        }

        outcomes
    }

    /// Drop bytes until the buffer starts with the network magic.
    ///
    /// Returns `false` when no full magic is present; in that case only
    /// a trailing prefix of the magic is kept, so a magic sequence
    /// split across reads still frames correctly.
    fn align_to_magic(&mut self) -> bool {
        if self.pending.starts_with(&self.magic) {
            return true;
        }

        if let Some(at) = find(&self.pending, &self.magic) {
            trace!(skipped = at, "skipped garbage before magic");
            let _ = self.pending.split_to(at);
            return true;
        }

        // keep the longest tail that could be the start of a magic
        let keep = (1..self.magic.len())
            .rev()
            .find(|&n| self.pending.len() >= n && self.pending.ends_with(&self.magic[..n]))
            .unwrap_or(0);
        let skipped = self.pending.len() - keep;
        if skipped > 0 {
            trace!(skipped, "skipped garbage, no magic found");
            let _ = self.pending.split_to(skipped);
        }
        false
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Outbound queue that serializes messages and hands them out in
/// chunks no larger than the transport's write budget.
#[derive(Debug)]
pub struct SendQueue {
    magic: [u8; 4],
    queue: VecDeque<Message>,
    cursor: Option<SendCursor>,
}

#[derive(Debug)]
struct SendCursor {
    encoded: Bytes,
    offset: usize,
}

impl SendQueue {
    /// Create an empty queue for the given network magic.
    pub fn new(magic: [u8; 4]) -> Self {
        Self { magic, queue: VecDeque::new(), cursor: None }
    }

    /// Enqueue a message for sending.
    pub fn push(&mut self, message: Message) {
        trace!(command = message.command_str(), "queueing outbound message");
        self.queue.push_back(message);
    }

    /// Whether any bytes remain to be sent.
    pub fn has_pending(&self) -> bool {
        self.cursor.is_some() || !self.queue.is_empty()
    }

    /// Take up to `max_len` bytes of the next serialized message.
    ///
    /// A message is drained fully before the next one starts; `None`
    /// means the queue is empty (or `max_len` is zero).
    pub fn next_chunk(&mut self, max_len: usize) -> Option<Bytes> {
        if max_len == 0 {
            return None;
        }
        if self.cursor.is_none() {
            let message = self.queue.pop_front()?;
            self.cursor = Some(SendCursor { encoded: message.encode(self.magic), offset: 0 });
        }

        let cursor = self.cursor.as_mut().expect("cursor set above");
        let end = (cursor.offset + max_len).min(cursor.encoded.len());
        let chunk = cursor.encoded.slice(cursor.offset..end);
        cursor.offset = end;
        if cursor.offset == cursor.encoded.len() {
            self.cursor = None;
        }
        Some(chunk)
    }

    /// Drop everything queued and any half-sent message.
    pub fn reset(&mut self) {
        self.queue.clear();
        self.cursor = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Network;
    use crate::protocol::payloads::Payload;

    const MAGIC: [u8; 4] = [0x0b, 0x11, 0x09, 0x07];

    fn encoded(payload: Payload) -> Bytes {
        Message::new(payload).encode(MAGIC)
    }

    fn messages(outcomes: Vec<FrameOutcome>) -> Vec<Message> {
        outcomes
            .into_iter()
            .map(|o| match o {
                FrameOutcome::Message(m) => m,
                other => panic!("unexpected outcome: {other:?}"),
            })
            .collect()
    }

    #[test]
    fn test_whole_message_in_one_feed() {
        let mut framer = Framer::new(MAGIC);
        let got = messages(framer.feed(&encoded(Payload::Ping(42))));
        assert_eq!(got, vec![Message::new(Payload::Ping(42))]);
        assert_eq!(framer.buffered(), 0);
    }

    #[test]
    fn test_pipelined_messages_in_one_feed() {
        let mut bytes = encoded(Payload::Ping(1)).to_vec();
        bytes.extend_from_slice(&encoded(Payload::Verack));
        bytes.extend_from_slice(&encoded(Payload::Pong(2)));

        let mut framer = Framer::new(MAGIC);
        let got = messages(framer.feed(&bytes));
        assert_eq!(
            got,
            vec![
                Message::new(Payload::Ping(1)),
                Message::new(Payload::Verack),
                Message::new(Payload::Pong(2)),
            ]
        );
    }

    #[test]
    fn test_every_split_point_yields_same_messages() {
        let mut bytes = encoded(Payload::Ping(7)).to_vec();
        bytes.extend_from_slice(&encoded(Payload::Pong(8)));

        for split in 0..=bytes.len() {
            let mut framer = Framer::new(MAGIC);
            let mut got = messages(framer.feed(&bytes[..split]));
            got.extend(messages(framer.feed(&bytes[split..])));
            assert_eq!(
                got,
                vec![Message::new(Payload::Ping(7)), Message::new(Payload::Pong(8))],
                "split at {split}"
            );
            assert_eq!(framer.buffered(), 0, "split at {split}");
        }
    }

    #[test]
    fn test_garbage_before_magic_is_skipped() {
        let mut bytes = vec![0xde, 0xad, 0xbe, 0xef, 0x00];
        bytes.extend_from_slice(&encoded(Payload::Ping(9)));

        let mut framer = Framer::new(MAGIC);
        let got = messages(framer.feed(&bytes));
        assert_eq!(got, vec![Message::new(Payload::Ping(9))]);
    }

    #[test]
    fn test_magic_split_across_garbage_boundary() {
        // garbage, then the first two magic bytes, end of read
        let mut framer = Framer::new(MAGIC);
        assert!(framer.feed(&[0xaa, 0xbb, MAGIC[0], MAGIC[1]]).is_empty());
        // only the potential magic prefix is retained
        assert_eq!(framer.buffered(), 2);

        let rest = &encoded(Payload::Ping(3))[2..];
        let got = messages(framer.feed(rest));
        assert_eq!(got, vec![Message::new(Payload::Ping(3))]);
    }

    #[test]
    fn test_pure_garbage_is_dropped_silently() {
        let mut framer = Framer::new(MAGIC);
        assert!(framer.feed(&[0x01, 0x02, 0x03, 0x04, 0x05, 0x06]).is_empty());
        assert_eq!(framer.buffered(), 0);
    }

    #[test]
    fn test_bad_checksum_drops_only_that_frame() {
        let mut bad = encoded(Payload::Ping(1)).to_vec();
        let last = bad.len() - 1;
        bad[last] ^= 0xff;
        bad.extend_from_slice(&encoded(Payload::Pong(2)));

        let mut framer = Framer::new(MAGIC);
        let outcomes = framer.feed(&bad);
        assert_eq!(outcomes.len(), 2);
        match &outcomes[0] {
            FrameOutcome::BadMessage { command, error } => {
                assert_eq!(command, "ping");
                assert!(matches!(error, P2pError::ChecksumMismatch { .. }));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        match &outcomes[1] {
            FrameOutcome::Message(m) => assert_eq!(*m, Message::new(Payload::Pong(2))),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_malformed_header_clears_buffer() {
        // valid magic, then a length over the 32 MiB cap
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(b"ping\0\0\0\0\0\0\0\0");
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 4]);
        bytes.extend_from_slice(&encoded(Payload::Verack));

        let mut framer = Framer::new(MAGIC);
        let outcomes = framer.feed(&bytes);
        assert_eq!(outcomes.len(), 1);
        match &outcomes[0] {
            FrameOutcome::BadHeader { command, .. } => assert_eq!(command, "ping"),
            other => panic!("unexpected outcome: {other:?}"),
        }
        // everything behind the bad header is gone too
        assert_eq!(framer.buffered(), 0);

        // the framer recovers on the next feed
        let got = messages(framer.feed(&encoded(Payload::Verack)));
        assert_eq!(got, vec![Message::new(Payload::Verack)]);
    }

    #[test]
    fn test_unprintable_command_reports_unknown() {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&[0xff; 12]);
        bytes.extend_from_slice(&[0u8; 8]);

        let mut framer = Framer::new(MAGIC);
        let outcomes = framer.feed(&bytes);
        assert_eq!(outcomes.len(), 1);
        match &outcomes[0] {
            FrameOutcome::BadHeader { command, .. } => assert_eq!(command, "unknown"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_send_queue_chunks_in_order() {
        let mut queue = SendQueue::new(MAGIC);
        queue.push(Message::new(Payload::Ping(1)));
        queue.push(Message::new(Payload::Verack));

        let first = encoded(Payload::Ping(1));
        let second = encoded(Payload::Verack);

        let mut drained = Vec::new();
        while let Some(chunk) = queue.next_chunk(10) {
            assert!(chunk.len() <= 10);
            drained.extend_from_slice(&chunk);
        }
        assert!(!queue.has_pending());

        let mut expected = first.to_vec();
        expected.extend_from_slice(&second);
        assert_eq!(drained, expected);
    }

    #[test]
    fn test_send_queue_zero_budget() {
        let mut queue = SendQueue::new(MAGIC);
        queue.push(Message::new(Payload::Ping(1)));
        assert!(queue.next_chunk(0).is_none());
        assert!(queue.has_pending());
    }

    #[test]
    fn test_send_queue_reset_discards_partial_message() {
        let mut queue = SendQueue::new(MAGIC);
        queue.push(Message::new(Payload::Ping(1)));
        let _ = queue.next_chunk(4);
        queue.reset();
        assert!(!queue.has_pending());
        assert!(queue.next_chunk(1024).is_none());
    }
}
