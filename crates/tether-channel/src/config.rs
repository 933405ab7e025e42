//! Channel configuration, validation, and error types.
//!
//! [`ChannelConfig`] is the builder-input for [`Channel::open`](crate::Channel::open).
//! [`validate()`](ChannelConfig::validate) checks structural invariants
//! before any region is allocated.

use std::time::Duration;

use tether_core::{PayloadLayout, SIDE_CHANNEL_PREFIX_BYTES};
use thiserror::Error;

/// How long [`wait_for_peer`](crate::Channel::wait_for_peer) tolerates an
/// unresponsive peer.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Poll iterations between two wall-clock checks in the wait loop.
pub const DEFAULT_TIMEOUT_CHECK_INTERVAL: u32 = 1000;

/// Side-channel capacity of a freshly opened channel: the bare length prefix.
pub const DEFAULT_SIDE_CHANNEL_CAPACITY: usize = SIDE_CHANNEL_PREFIX_BYTES;

/// Capacity a side channel grows to when a `len`-byte payload does not fit.
///
/// Doubling plus slack keeps repeated writes of similar size from
/// triggering a regrow each time.
///
/// ```
/// assert_eq!(tether_channel::grown_capacity(25), 70);
/// ```
pub fn grown_capacity(len: usize) -> usize {
    2 * len + 20
}

/// Whether a `len`-byte payload needs a larger side channel than `capacity`.
///
/// The comparison is inclusive: a payload exactly filling the space left
/// after the length prefix still triggers growth.
pub fn needs_growth(len: usize, capacity: usize) -> bool {
    len + SIDE_CHANNEL_PREFIX_BYTES >= capacity
}

// ── PollStrategy ───────────────────────────────────────────────────

/// What the wait loop does between two reads of the blocked flag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PollStrategy {
    /// Busy-spin with a CPU relax hint. Lowest latency.
    #[default]
    Spin,
    /// Yield the thread to the scheduler between reads.
    Yield,
}

impl PollStrategy {
    pub(crate) fn relax(self) {
        match self {
            Self::Spin => std::hint::spin_loop(),
            Self::Yield => std::thread::yield_now(),
        }
    }
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected during [`ChannelConfig::validate()`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The timeout is zero.
    #[error("timeout must be non-zero")]
    ZeroTimeout,
    /// The timeout-check interval is zero.
    #[error("timeout_check_interval must be at least 1")]
    ZeroCheckInterval,
    /// The initial side channel cannot hold its own length prefix.
    #[error("initial side channel capacity {configured} is below the {minimum}-byte prefix")]
    SideChannelTooSmall {
        /// The configured capacity.
        configured: usize,
        /// Smallest accepted capacity.
        minimum: usize,
    },
    /// No identity attempts allowed.
    #[error("max_identity_attempts must be at least 1")]
    NoIdentityAttempts,
}

// ── ChannelConfig ──────────────────────────────────────────────────

/// Complete configuration for opening a channel.
#[derive(Clone, Debug)]
pub struct ChannelConfig {
    /// Use the well-known identity instead of a freshly generated one.
    /// Default: `false`.
    pub fixed_identity: bool,
    /// Peer response deadline for a single wait. Default: 30 s.
    pub timeout: Duration,
    /// Poll iterations between two deadline checks. Default: 1000.
    pub timeout_check_interval: u32,
    /// Behavior between two flag reads. Default: [`PollStrategy::Spin`].
    pub poll: PollStrategy,
    /// Side-channel capacity at open, length prefix included. Default: 4.
    pub initial_side_channel_capacity: usize,
    /// RL step-data capacity. Fixed for the life of the channel. Default: 0.
    pub rl_data_capacity: usize,
    /// Candidate identities tried before giving up. Default: 16.
    pub max_identity_attempts: u32,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            fixed_identity: false,
            timeout: DEFAULT_TIMEOUT,
            timeout_check_interval: DEFAULT_TIMEOUT_CHECK_INTERVAL,
            poll: PollStrategy::Spin,
            initial_side_channel_capacity: DEFAULT_SIDE_CHANNEL_CAPACITY,
            rl_data_capacity: 0,
            max_identity_attempts: 16,
        }
    }
}

impl ChannelConfig {
    /// Default configuration bound to the well-known identity.
    pub fn fixed() -> Self {
        Self {
            fixed_identity: true,
            ..Self::default()
        }
    }

    /// Validate all structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.timeout_check_interval == 0 {
            return Err(ConfigError::ZeroCheckInterval);
        }
        if self.initial_side_channel_capacity < SIDE_CHANNEL_PREFIX_BYTES {
            return Err(ConfigError::SideChannelTooSmall {
                configured: self.initial_side_channel_capacity,
                minimum: SIDE_CHANNEL_PREFIX_BYTES,
            });
        }
        if self.max_identity_attempts == 0 {
            return Err(ConfigError::NoIdentityAttempts);
        }
        Ok(())
    }

    /// Capacities the first payload region is created with.
    pub fn initial_layout(&self) -> PayloadLayout {
        PayloadLayout {
            side_channel_capacity: self.initial_side_channel_capacity,
            rl_data_capacity: self.rl_data_capacity,
        }
    }
}
