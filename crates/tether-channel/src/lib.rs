//! Shared-memory handshake channel between an RL trainer and a simulation.
//!
//! Provides [`Channel`], the trainer-side endpoint of a two-party session
//! carried over a control block and a growable payload region. The channel
//! implements the ownership handoff (`give_control` / `wait_for_peer`),
//! side-channel growth with generation bumps, stale-handle recovery when
//! the peer recreates the payload region, and teardown on timeout or peer
//! termination.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod channel;
pub mod config;
pub mod error;
pub mod identity;
pub mod metrics;
pub mod state;

pub use channel::Channel;
pub use config::{
    grown_capacity, needs_growth, ChannelConfig, ConfigError, PollStrategy,
    DEFAULT_SIDE_CHANNEL_CAPACITY, DEFAULT_TIMEOUT, DEFAULT_TIMEOUT_CHECK_INTERVAL,
};
pub use error::ChannelError;
pub use identity::{allocate_identity, allocate_identity_with};
pub use metrics::ChannelMetrics;
pub use state::HandshakeState;
