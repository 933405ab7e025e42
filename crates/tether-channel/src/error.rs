//! Channel-level error taxonomy.

use std::time::Duration;

use tether_core::{RegionError, VersionMismatch};
use thiserror::Error;

use crate::config::ConfigError;
use crate::state::HandshakeState;

/// Errors returned by [`Channel`](crate::Channel) operations.
///
/// `Timeout` and `PeerTerminated` end the session: the channel has already
/// released its regions when they are returned, and a new channel must be
/// opened. `InvalidState` reports a call made out of protocol order and
/// leaves the channel untouched.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// The peer did not hand control back within the configured timeout.
    #[error("peer did not respond within {elapsed:?} ({iterations} polls)")]
    Timeout {
        /// Time spent waiting, as measured at the last deadline check.
        elapsed: Duration,
        /// Poll iterations performed.
        iterations: u64,
    },
    /// The peer cleared its active flag.
    #[error("peer terminated the session")]
    PeerTerminated {
        /// Protocol mismatch found while diagnosing the termination, if any.
        version_mismatch: Option<VersionMismatch>,
    },
    /// An operation was called in a state that does not permit it.
    #[error("{operation} is not allowed while {state}")]
    InvalidState {
        /// The rejected operation.
        operation: &'static str,
        /// State the channel was in.
        state: HandshakeState,
    },
    /// Every generated identity was already taken.
    #[error("no free session identity after {attempts} attempts")]
    IdentityExhausted {
        /// Candidates tried.
        attempts: u32,
    },
    /// The configuration failed validation.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    /// A region backend failed.
    #[error("region failure: {0}")]
    Region(#[from] RegionError),
}

impl ChannelError {
    /// Whether the error reports the end of the session by the peer.
    ///
    /// Region failures may also end the session when they interrupt a
    /// grow or a recovery; [`Channel::state`](crate::Channel::state) is
    /// authoritative.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::PeerTerminated { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_state_names_operation_and_state() {
        let e = ChannelError::InvalidState {
            operation: "give_control",
            state: HandshakeState::PeerOwns,
        };
        assert_eq!(
            e.to_string(),
            "give_control is not allowed while the peer owns the payload"
        );
        assert!(!e.is_terminal());
    }

    #[test]
    fn region_errors_convert() {
        let e: ChannelError = RegionError::Detached { name: "x".into() }.into();
        assert!(matches!(e, ChannelError::Region(_)));
        assert!(!e.is_terminal());
    }

    #[test]
    fn peer_terminated_carries_diagnostic() {
        let mismatch = VersionMismatch {
            expected: (1, 0),
            found: (0, 9),
        };
        let e = ChannelError::PeerTerminated {
            version_mismatch: Some(mismatch),
        };
        assert!(e.is_terminal());
        assert!(matches!(
            e,
            ChannelError::PeerTerminated {
                version_mismatch: Some(m)
            } if m == mismatch
        ));
    }
}
