//! Integration test: the peer recreates the payload region during its turn.
//!
//! After each wait the trainer replays every generation it missed, one at
//! a time, removing the handle it held before attaching to the next.

use std::time::Duration;

use tether_channel::{Channel, ChannelConfig, ChannelError, HandshakeState};
use tether_core::{Generation, RegionError};
use tether_test_utils::fixtures::{decisions_for, grid_spec, terminals_for};
use tether_test_utils::{InProcessProvider, PeerHandle, Responder, SegmentStore, Turn};

const PATIENCE: Duration = Duration::from_secs(10);

fn open(store: &SegmentStore) -> (Channel<InProcessProvider>, PeerHandle) {
    let channel =
        Channel::open(InProcessProvider::new(store.clone()), ChannelConfig::default()).unwrap();
    let peer = PeerHandle::new(store.clone(), channel.identity().clone());
    (channel, peer)
}

fn run_turn(channel: &mut Channel<InProcessProvider>, peer: PeerHandle, turn: Turn) {
    let responder = Responder::spawn(peer, vec![turn], PATIENCE);
    channel.give_control(false).unwrap();
    channel.wait_for_peer().unwrap();
    assert_eq!(responder.join().len(), 1);
}

#[test]
fn single_regrow_is_followed() {
    let store = SegmentStore::new();
    let (mut channel, peer) = open(&store);
    let id = channel.identity().clone();

    run_turn(
        &mut channel,
        peer,
        Box::new(|peer: &PeerHandle| {
            peer.write_side_channel(b"a reply longer than the prefix").unwrap();
        }),
    );

    assert_eq!(channel.generation(), Generation(1));
    assert_eq!(store.payload_names(), vec![id.payload_name(Generation(1))]);
    assert_eq!(
        channel.read_and_clear_side_channel().unwrap(),
        b"a reply longer than the prefix".to_vec()
    );
    assert_eq!(channel.metrics().regenerations, 1);
}

#[test]
fn several_regrows_are_replayed_one_at_a_time() {
    let store = SegmentStore::new();
    let (mut channel, peer) = open(&store);
    let id = channel.identity().clone();
    let spec = grid_spec();

    run_turn(
        &mut channel,
        peer,
        Box::new(move |peer: &PeerHandle| {
            peer.register_behavior("grid", spec.clone()).unwrap();
            for capacity in [64, 128, 256] {
                peer.regrow(capacity).unwrap();
            }
            let decisions = decisions_for(&spec, &[1, 2]);
            let terminals = terminals_for(&spec, &[]);
            peer.publish_steps("grid", decisions, terminals).unwrap();
        }),
    );

    assert_eq!(channel.generation(), Generation(3));
    assert_eq!(channel.metrics().regenerations, 3);
    assert_eq!(channel.side_channel_capacity(), 256);
    // Every intermediate region was removed on the way.
    assert_eq!(store.payload_names(), vec![id.payload_name(Generation(3))]);
    let (decisions, terminals) = channel.read_steps("grid").unwrap();
    assert_eq!(decisions.agent_id, vec![1, 2]);
    assert!(terminals.is_empty());
}

#[test]
fn trainer_and_peer_growth_interleave() {
    let store = SegmentStore::new();
    let (mut channel, peer) = open(&store);
    let id = channel.identity().clone();

    channel.write_side_channel(&[5; 12]).unwrap();
    assert_eq!(channel.generation(), Generation(1));

    run_turn(
        &mut channel,
        peer,
        Box::new(|peer: &PeerHandle| {
            assert_eq!(peer.read_side_channel().unwrap(), vec![5; 12]);
            peer.remove_payload(Generation(0));
            peer.write_side_channel(&[6; 60]).unwrap();
        }),
    );

    assert_eq!(channel.generation(), Generation(2));
    assert_eq!(channel.side_channel_capacity(), 140);
    assert_eq!(store.payload_names(), vec![id.payload_name(Generation(2))]);
    assert_eq!(channel.read_and_clear_side_channel().unwrap(), vec![6; 60]);
    assert_eq!(channel.metrics().side_channel_grows, 1);
    assert_eq!(channel.metrics().regenerations, 1);
}

#[test]
fn up_to_date_handle_is_kept() {
    let store = SegmentStore::new();
    let (mut channel, peer) = open(&store);

    run_turn(&mut channel, peer, Box::new(|_: &PeerHandle| {}));

    assert_eq!(channel.generation(), Generation(0));
    assert_eq!(channel.metrics().regenerations, 0);
    assert_eq!(store.segment_count(), 2);
}

#[test]
fn missing_regenerated_region_closes_channel() {
    let store = SegmentStore::new();
    let (mut channel, peer) = open(&store);
    let responder = Responder::spawn(
        peer,
        vec![Box::new(|peer: &PeerHandle| {
            let next = peer.regrow(64).unwrap();
            peer.remove_payload(next);
        }) as Turn],
        PATIENCE,
    );

    channel.give_control(false).unwrap();
    let err = channel.wait_for_peer().unwrap_err();
    responder.join();

    assert!(matches!(
        err,
        ChannelError::Region(RegionError::AttachFailed { .. })
    ));
    assert_eq!(channel.state(), HandshakeState::Terminated);
}

#[test]
fn older_published_generation_keeps_current_handle() {
    let store = SegmentStore::new();
    let (mut channel, peer) = open(&store);
    let id = channel.identity().clone();
    channel.write_side_channel(&[3; 12]).unwrap();
    assert_eq!(channel.generation(), Generation(1));

    let control_store = store.clone();
    let control_name = id.as_str().to_owned();
    run_turn(
        &mut channel,
        peer,
        Box::new(move |_: &PeerHandle| {
            control_store.with_control(&control_name, |c| c.generation = Generation(0));
        }),
    );

    assert_eq!(channel.generation(), Generation(1));
    assert_eq!(channel.metrics().regenerations, 0);
    assert_eq!(channel.read_and_clear_side_channel().unwrap(), vec![3; 12]);
}
