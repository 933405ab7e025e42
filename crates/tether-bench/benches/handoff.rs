//! Criterion benchmarks for the give/wait handoff.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use tether_bench::{bench_config, open_session, LoopingPeer};
use tether_channel::PollStrategy;
use tether_core::ActionBatch;
use tether_test_utils::fixtures::{decisions_for, grid_spec, terminals_for};

/// Benchmark: one full round trip with a peer that does nothing.
fn bench_handoff_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("handoff_round_trip");
    for (label, poll) in [("yield", PollStrategy::Yield), ("spin", PollStrategy::Spin)] {
        let config = tether_channel::ChannelConfig {
            poll,
            ..bench_config(4)
        };
        let (_store, mut channel, peer) = open_session(config).unwrap();
        let looping = LoopingPeer::echo(peer);

        group.bench_function(label, |b| {
            b.iter(|| {
                channel.give_control(false).unwrap();
                channel.wait_for_peer().unwrap();
            });
        });

        looping.stop();
    }
    group.finish();
}

/// Benchmark: a training step with 32 agents on a discrete behavior.
///
/// Each turn the peer publishes fresh steps; the trainer reads them and
/// answers with one action per branch per agent.
fn bench_step_exchange(c: &mut Criterion) {
    let spec = grid_spec();
    let agents: Vec<i32> = (0..32).collect();
    let (_store, mut channel, peer) = open_session(bench_config(4)).unwrap();
    peer.register_behavior("grid", spec.clone()).unwrap();

    let peer_spec = spec.clone();
    let peer_agents = agents.clone();
    let looping = LoopingPeer::spawn(peer, move |peer| {
        let decisions = decisions_for(&peer_spec, &peer_agents);
        let terminals = terminals_for(&peer_spec, &[]);
        let _ = peer.publish_steps("grid", decisions, terminals);
    });

    let branches = spec.action_spec.discrete_size();
    let actions = ActionBatch::discrete(agents.len(), vec![1; agents.len() * branches]);

    c.bench_function("step_exchange_32_agents", |b| {
        b.iter(|| {
            channel.write_actions("grid", &actions).unwrap();
            channel.give_control(false).unwrap();
            channel.wait_for_peer().unwrap();
            black_box(channel.read_steps("grid").unwrap());
        });
    });

    looping.stop();
}

criterion_group!(benches, bench_handoff_round_trip, bench_step_exchange);
criterion_main!(benches);
