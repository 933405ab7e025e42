//! Integration test: the peer clears its active flag.
//!
//! A terminated session is torn down on the trainer side; a protocol
//! mismatch spotted while diagnosing it rides along with the error.

use std::time::Duration;

use tether_channel::{Channel, ChannelConfig, ChannelError, HandshakeState};
use tether_core::{Generation, VersionMismatch};
use tether_test_utils::{
    InProcessProvider, PeerHandle, Responder, SegmentStore, Turn, PROTOCOL_VERSION,
};

const PATIENCE: Duration = Duration::from_secs(10);

fn open(store: &SegmentStore) -> (Channel<InProcessProvider>, PeerHandle) {
    let channel =
        Channel::open(InProcessProvider::new(store.clone()), ChannelConfig::default()).unwrap();
    let peer = PeerHandle::new(store.clone(), channel.identity().clone());
    (channel, peer)
}

#[test]
fn peer_shutdown_during_turn_ends_session() {
    let store = SegmentStore::new();
    let (mut channel, peer) = open(&store);
    let turns = vec![
        Box::new(|_: &PeerHandle| {}) as Turn,
        Box::new(|peer: &PeerHandle| peer.deactivate()) as Turn,
    ];
    let responder = Responder::spawn(peer, turns, PATIENCE);

    channel.give_control(false).unwrap();
    channel.wait_for_peer().unwrap();
    channel.give_control(false).unwrap();
    let err = channel.wait_for_peer().unwrap_err();

    assert_eq!(
        err,
        ChannelError::PeerTerminated {
            version_mismatch: None
        }
    );
    assert!(err.is_terminal());
    assert_eq!(channel.state(), HandshakeState::Terminated);
    assert!(!channel.is_active());
    assert_eq!(store.segment_count(), 0);
    assert_eq!(responder.join().len(), 2);
}

#[test]
fn inactive_peer_is_noticed_without_polling() {
    let store = SegmentStore::new();
    let (mut channel, peer) = open(&store);
    peer.deactivate();
    assert!(!channel.is_active());

    channel.give_control(false).unwrap();
    let err = channel.wait_for_peer().unwrap_err();
    assert!(matches!(err, ChannelError::PeerTerminated { .. }));
    assert_eq!(channel.metrics().last_wait_iterations, 0);
}

#[test]
fn version_mismatch_is_attached_to_termination() {
    let store = SegmentStore::new();
    let (mut channel, peer) = open(&store);
    peer.set_version((2, 3));
    peer.deactivate();

    channel.give_control(false).unwrap();
    let err = channel.wait_for_peer().unwrap_err();
    assert_eq!(
        err,
        ChannelError::PeerTerminated {
            version_mismatch: Some(VersionMismatch {
                expected: PROTOCOL_VERSION,
                found: (2, 3),
            }),
        }
    );
    assert_eq!(store.segment_count(), 0);
}

#[test]
fn version_is_not_checked_while_peer_is_active() {
    let store = SegmentStore::new();
    let (mut channel, peer) = open(&store);
    peer.set_version((9, 9));
    let responder = Responder::echo(peer, 1, PATIENCE);

    channel.give_control(false).unwrap();
    channel.wait_for_peer().unwrap();
    assert_eq!(channel.state(), HandshakeState::Idle);
    responder.join();
}

#[test]
fn regrow_before_shutdown_is_not_followed() {
    let store = SegmentStore::new();
    let (mut channel, peer) = open(&store);
    let turns = vec![Box::new(|peer: &PeerHandle| {
        peer.regrow(64).unwrap();
        peer.deactivate();
    }) as Turn];
    let responder = Responder::spawn(peer, turns, PATIENCE);

    channel.give_control(false).unwrap();
    let err = channel.wait_for_peer().unwrap_err();
    responder.join();

    assert!(matches!(err, ChannelError::PeerTerminated { .. }));
    assert_eq!(channel.generation(), Generation(0));
    assert_eq!(channel.metrics().regenerations, 0);
}
