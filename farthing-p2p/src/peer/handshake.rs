//! Handshake progress tracking.

/// Where the version/verack exchange with a peer stands.
///
/// The exchange is symmetric; which side spoke first decides the path
/// taken to [`HandshakeState::Finished`]:
///
/// - we spoke first: `None` -> `Sent` -> `SentAndConfirmed` (their
///   verack) or `SentAndReceived` (their version) -> `Finished`
/// - they spoke first: `None` -> `ReceivedAndReplied` -> `Finished`
///
/// `Finished` is terminal; any further version or verack is a
/// protocol violation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HandshakeState {
    /// No version message exchanged yet.
    #[default]
    None,
    /// We sent our version; nothing received back.
    Sent,
    /// Peer's version arrived first; we replied with verack plus our
    /// own version and now await their verack.
    ReceivedAndReplied,
    /// We sent our version and the peer acked it; their version is
    /// still outstanding.
    SentAndConfirmed,
    /// Both versions are exchanged and our verack is out; their verack
    /// is still outstanding.
    SentAndReceived,
    /// Handshake complete; all message types flow.
    Finished,
}

impl HandshakeState {
    /// Whether the handshake is complete.
    pub fn is_finished(self) -> bool {
        self == HandshakeState::Finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_none() {
        assert_eq!(HandshakeState::default(), HandshakeState::None);
        assert!(!HandshakeState::None.is_finished());
        assert!(HandshakeState::Finished.is_finished());
    }
}
