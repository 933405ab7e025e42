//! Integration test: an unresponsive peer hits the wait deadline.
//!
//! The clock advances a fixed step per reading, so the poll iteration at
//! which the deadline fires is fully determined by the check interval.

use std::time::Duration;

use tether_channel::{Channel, ChannelConfig, ChannelError, HandshakeState};
use tether_test_utils::{FakeClock, InProcessProvider, PeerHandle, Responder, SegmentStore};

fn open_with(
    store: &SegmentStore,
    config: ChannelConfig,
    clock: FakeClock,
) -> Channel<InProcessProvider, FakeClock> {
    Channel::open_with_clock(InProcessProvider::new(store.clone()), config, clock).unwrap()
}

#[test]
fn silent_peer_times_out_and_session_is_removed() {
    let store = SegmentStore::new();
    let clock = FakeClock::stepping(Duration::from_secs(1));
    let mut channel = open_with(&store, ChannelConfig::default(), clock);

    channel.give_control(false).unwrap();
    let err = channel.wait_for_peer().unwrap_err();

    // Readings: start = 0 s, then one per 1000 polls at 1 s, 2 s, ...
    // The 31st check is the first past 30 s.
    assert_eq!(
        err,
        ChannelError::Timeout {
            elapsed: Duration::from_secs(31),
            iterations: 30_000,
        }
    );
    assert!(err.is_terminal());
    assert_eq!(channel.state(), HandshakeState::Terminated);
    assert!(!channel.is_active());
    assert_eq!(store.segment_count(), 0);
    assert_eq!(channel.metrics().last_wait_iterations, 30_000);
    assert_eq!(channel.metrics().waits_completed, 0);
}

#[test]
fn deadline_is_only_checked_every_interval() {
    let store = SegmentStore::new();
    let config = ChannelConfig {
        timeout: Duration::from_secs(5),
        timeout_check_interval: 10,
        ..ChannelConfig::default()
    };
    let mut channel = open_with(&store, config, FakeClock::stepping(Duration::from_secs(1)));

    channel.give_control(false).unwrap();
    match channel.wait_for_peer() {
        Err(ChannelError::Timeout {
            elapsed,
            iterations,
        }) => {
            assert_eq!(elapsed, Duration::from_secs(6));
            assert_eq!(iterations, 50);
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[test]
fn timed_out_channel_rejects_further_use() {
    let store = SegmentStore::new();
    let mut channel = open_with(
        &store,
        ChannelConfig::default(),
        FakeClock::stepping(Duration::from_secs(60)),
    );
    channel.give_control(false).unwrap();
    assert!(channel.wait_for_peer().is_err());

    assert!(matches!(
        channel.give_control(false),
        Err(ChannelError::InvalidState {
            state: HandshakeState::Terminated,
            ..
        })
    ));
    assert!(matches!(
        channel.write_side_channel(b"late"),
        Err(ChannelError::InvalidState { .. })
    ));
    // Close after teardown has nothing left to do.
    channel.close();
    assert_eq!(store.segment_count(), 0);
}

#[test]
fn responsive_peer_beats_the_deadline() {
    let store = SegmentStore::new();
    let clock = FakeClock::frozen();
    let mut channel = open_with(&store, ChannelConfig::default(), clock.clone());
    let peer = PeerHandle::new(store.clone(), channel.identity().clone());
    let responder = Responder::echo(peer, 1, Duration::from_secs(10));

    channel.give_control(false).unwrap();
    channel.wait_for_peer().unwrap();

    assert_eq!(channel.metrics().last_wait, Duration::ZERO);
    assert_eq!(clock.peek(), Duration::ZERO);
    assert_eq!(responder.join().len(), 1);
}
