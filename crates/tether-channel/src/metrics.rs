//! Counters describing a channel's handshake activity.
//!
//! [`ChannelMetrics`] is updated in place by the channel and read through
//! [`Channel::metrics`](crate::Channel::metrics).

use std::time::Duration;

/// Cumulative handshake counters plus data about the most recent wait.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelMetrics {
    /// Times control was handed to the peer.
    pub handoffs: u64,
    /// Of those, how many requested a reset.
    pub resets_requested: u64,
    /// Waits that ended with the peer handing control back.
    pub waits_completed: u64,
    /// Poll iterations of the most recent wait.
    pub last_wait_iterations: u64,
    /// Poll iterations over all waits.
    pub total_wait_iterations: u64,
    /// Clock time spent in the most recent wait.
    pub last_wait: Duration,
    /// Side-channel regrows performed by this side.
    pub side_channel_grows: u64,
    /// Stale payload handles replaced after the peer recreated the region.
    pub regenerations: u64,
}

impl ChannelMetrics {
    pub(crate) fn record_wait(&mut self, iterations: u64, elapsed: Duration) {
        self.last_wait_iterations = iterations;
        self.total_wait_iterations += iterations;
        self.last_wait = elapsed;
    }
}
