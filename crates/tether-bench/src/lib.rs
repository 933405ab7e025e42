//! Benchmark sessions and utilities for the Tether channel.
//!
//! - [`open_session`]: a channel over a fresh in-process namespace plus the
//!   peer handle for the other side
//! - [`LoopingPeer`]: a simulation stand-in that serves handoffs until stopped
//! - [`side_channel_message`]: deterministic payload bytes

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tether_channel::{Channel, ChannelConfig, ChannelError, PollStrategy};
use tether_test_utils::{InProcessProvider, PeerHandle, SegmentStore};

/// Channel configuration used by the benchmarks.
///
/// Yields between polls so the trainer and the peer thread make progress
/// on machines with few cores.
pub fn bench_config(initial_side_channel_capacity: usize) -> ChannelConfig {
    ChannelConfig {
        poll: PollStrategy::Yield,
        initial_side_channel_capacity,
        ..ChannelConfig::default()
    }
}

/// Open a channel on a fresh namespace.
///
/// Returns the namespace, the trainer's channel, and a handle for the
/// simulation side of the same session.
pub fn open_session(
    config: ChannelConfig,
) -> Result<(SegmentStore, Channel<InProcessProvider>, PeerHandle), ChannelError> {
    let store = SegmentStore::new();
    let channel = Channel::open(InProcessProvider::new(store.clone()), config)?;
    let peer = PeerHandle::new(store.clone(), channel.identity().clone());
    Ok((store, channel, peer))
}

/// Generate `len` deterministic bytes from `seed`.
pub fn side_channel_message(len: usize, seed: u64) -> Vec<u8> {
    let mut state = seed;
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (state >> 56) as u8
        })
        .collect()
}

/// Peer thread taking every turn it is handed until stopped.
pub struct LoopingPeer {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<u64>>,
}

impl LoopingPeer {
    /// Serve turns by running `on_turn` and handing control back.
    pub fn spawn<F>(peer: PeerHandle, mut on_turn: F) -> Self
    where
        F: FnMut(&PeerHandle) + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let thread = thread::spawn(move || {
            let mut turns = 0;
            while !flag.load(Ordering::Acquire) {
                if !peer.has_control() {
                    thread::yield_now();
                    continue;
                }
                on_turn(&peer);
                peer.hand_back();
                turns += 1;
            }
            turns
        });
        Self {
            stop,
            thread: Some(thread),
        }
    }

    /// Serve turns without touching the payload.
    pub fn echo(peer: PeerHandle) -> Self {
        Self::spawn(peer, |_| {})
    }

    /// Stop serving and return the number of turns taken.
    pub fn stop(mut self) -> u64 {
        self.shutdown()
    }

    fn shutdown(&mut self) -> u64 {
        self.stop.store(true, Ordering::Release);
        match self.thread.take() {
            Some(thread) => thread.join().unwrap_or(0),
            None => 0,
        }
    }
}

impl Drop for LoopingPeer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
