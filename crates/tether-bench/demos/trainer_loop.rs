//! End-to-end training loop example.
//!
//! Demonstrates: open channel → hand control to a simulated peer → read
//! steps and side-channel messages → write actions → reset → repeat.
//!
//! Run with `RUST_LOG=debug` to see every handoff and regrow.

use tether_bench::{bench_config, open_session, LoopingPeer};
use tether_core::ActionBatch;
use tether_test_utils::fixtures::{decisions_for, terminals_for, walker_spec};
use tracing::info;
use tracing_subscriber::EnvFilter;

const EPISODES: usize = 3;
const STEPS_PER_EPISODE: usize = 40;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    println!("=== Tether Trainer Loop Example ===\n");

    let (_store, mut channel, peer) = open_session(bench_config(4)).unwrap();
    println!("session identity: {}", channel.identity());

    // --- Simulated peer: 4 walkers, one finishes every 10 steps ---
    let spec = walker_spec();
    peer.register_behavior("walker", spec.clone()).unwrap();
    let mut step = 0usize;
    let looping = LoopingPeer::spawn(peer, move |peer| {
        if peer.take_reset() {
            step = 0;
        }
        step += 1;
        let done: Vec<i32> = if step % 10 == 0 { vec![0] } else { vec![] };
        let decisions = decisions_for(&spec, &[0, 1, 2, 3]);
        let terminals = terminals_for(&spec, &done);
        let _ = peer.publish_steps("walker", decisions, terminals);
        if step % 15 == 0 {
            // Messages grow over time, forcing the region to be recreated.
            let log = format!("step {step}: {}", "#".repeat(step * 4));
            let _ = peer.write_side_channel(log.as_bytes());
        }
    });

    for episode in 0..EPISODES {
        println!("\nEpisode {}: {STEPS_PER_EPISODE} steps", episode + 1);
        let mut total_reward = 0.0f32;
        let mut finished = 0usize;

        for step in 0..STEPS_PER_EPISODE {
            channel.give_control(step == 0).unwrap();
            channel.wait_for_peer().unwrap();

            let (decisions, terminals) = channel.read_steps("walker").unwrap();
            total_reward += decisions.reward.iter().sum::<f32>();
            finished += terminals.len();

            let message = channel.read_and_clear_side_channel().unwrap();
            if !message.is_empty() {
                info!(
                    bytes = message.len(),
                    generation = channel.generation().0,
                    "side channel message from peer"
                );
            }

            let actions = ActionBatch::continuous(
                decisions.len(),
                vec![0.5; decisions.len() * 2],
            );
            channel.write_actions("walker", &actions).unwrap();
        }

        println!(
            "  total_reward={total_reward:>8.3}, finished_agents={finished}, generation={}",
            channel.generation()
        );
    }

    let turns = looping.stop();
    let metrics = channel.metrics();
    println!("\npeer turns: {turns}");
    println!(
        "handoffs={}, resets={}, regenerations={}, total_wait_iterations={}",
        metrics.handoffs,
        metrics.resets_requested,
        metrics.regenerations,
        metrics.total_wait_iterations,
    );

    channel.close();
    println!("Done.");
}
