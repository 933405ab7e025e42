//! Handshake state of the trainer side.

use std::fmt;

/// Who owns the payload region, from this side's point of view.
///
/// ```text
///            give_control            wait_for_peer (peer released)
///   Idle ─────────────────► PeerOwns ────────────────────────────► Idle
///     │                        │
///     │ close / fatal error    │ timeout / peer inactive / fatal error
///     ▼                        ▼
///  Terminated ◄────────────────┘
/// ```
///
/// The shared blocked flags are advisory; this local state is what gates
/// every payload access.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HandshakeState {
    /// This side owns the payload; the peer is blocked.
    Idle,
    /// The peer owns the payload; this side must wait.
    PeerOwns,
    /// The session is over and its regions are released.
    Terminated,
}

impl HandshakeState {
    /// Whether payload reads and writes are permitted.
    pub fn owns_payload(self) -> bool {
        self == Self::Idle
    }
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "the trainer owns the payload"),
            Self::PeerOwns => write!(f, "the peer owns the payload"),
            Self::Terminated => write!(f, "the session is terminated"),
        }
    }
}
