//! The remote side of a session, driven from tests.
//!
//! [`PeerHandle`] performs the simulation's half of the flag contract
//! directly against a [`SegmentStore`]. [`Responder`] runs a scripted
//! sequence of turns on a background thread, taking one turn each time
//! the trainer hands control over, and reports back over a channel.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver};
use tether_core::{
    ActionBatch, BehaviorSpec, DecisionSteps, Generation, PayloadLayout, RegionError, SessionId,
    TerminalSteps, SIDE_CHANNEL_PREFIX_BYTES,
};

use crate::store::{BehaviorData, ControlSegment, PayloadSegment, SegmentStore};

/// Simulation-side view of one session.
#[derive(Clone)]
pub struct PeerHandle {
    store: SegmentStore,
    identity: SessionId,
}

impl PeerHandle {
    /// Attach to the session `identity` in `store`.
    pub fn new(store: SegmentStore, identity: SessionId) -> Self {
        Self { store, identity }
    }

    /// The session this peer belongs to.
    pub fn identity(&self) -> &SessionId {
        &self.identity
    }

    fn control<T: Default>(&self, f: impl FnOnce(&mut ControlSegment) -> T) -> T {
        self.store
            .with_control(self.identity.as_str(), f)
            .unwrap_or_default()
    }

    fn current_payload_name(&self) -> String {
        self.identity.payload_name(self.generation())
    }

    fn payload<T>(
        &self,
        f: impl FnOnce(&mut PayloadSegment) -> Result<T, RegionError>,
    ) -> Result<T, RegionError> {
        let name = self.current_payload_name();
        self.store
            .with_payload(&name, f)
            .unwrap_or(Err(RegionError::Detached { name }))
    }

    // ── Flags ────────────────────────────────────────────────────

    /// Whether the trainer has handed control over.
    pub fn has_control(&self) -> bool {
        self.store
            .with_control(self.identity.as_str(), |c| !c.peer_blocked)
            .unwrap_or(false)
    }

    /// Whether the trainer is waiting on this peer.
    pub fn trainer_blocked(&self) -> bool {
        self.control(|c| c.trainer_blocked)
    }

    /// Read and clear the reset request.
    pub fn take_reset(&self) -> bool {
        self.control(|c| std::mem::take(&mut c.reset_requested))
    }

    /// Spin until the trainer hands control over or `timeout` passes.
    pub fn wait_for_control(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.has_control() {
            if Instant::now() > deadline {
                return false;
            }
            thread::yield_now();
        }
        true
    }

    /// Block this peer again and release the trainer.
    pub fn hand_back(&self) {
        self.control(|c| {
            c.peer_blocked = true;
            c.trainer_blocked = false;
        });
    }

    /// Clear the active flag, as a shutting-down simulation does.
    pub fn deactivate(&self) {
        self.control(|c| c.active = false);
    }

    /// Stamp a protocol version into the control block.
    pub fn set_version(&self, version: (u32, u32)) {
        self.control(|c| c.version = version);
    }

    // ── Generations ──────────────────────────────────────────────

    /// Generation published in the control block.
    pub fn generation(&self) -> Generation {
        self.control(|c| c.generation)
    }

    /// Side-channel capacity published in the control block.
    pub fn side_channel_capacity(&self) -> usize {
        self.control(|c| c.side_channel_capacity)
    }

    /// Recreate the payload region with a larger side channel.
    ///
    /// Publishes the next generation, creates its region carrying the RL
    /// data forward, then publishes the capacity. The previous region is
    /// left in place for the trainer to remove.
    pub fn regrow(&self, side_channel_capacity: usize) -> Result<Generation, RegionError> {
        let old_name = self.current_payload_name();
        let behaviors = self
            .store
            .with_payload(&old_name, |p| p.behaviors.clone())
            .unwrap_or_default();
        let rl_data_capacity = self.control(|c| c.rl_data_capacity);
        let next = self.control(|c| {
            c.generation = c.generation.next();
            c.generation
        });
        let mut segment = PayloadSegment::new(PayloadLayout {
            side_channel_capacity,
            rl_data_capacity,
        });
        segment.behaviors = behaviors;
        self.store
            .insert_payload(&self.identity.payload_name(next), segment)?;
        self.control(|c| c.side_channel_capacity = side_channel_capacity);
        Ok(next)
    }

    /// Remove the payload region of `generation`, as the simulation does
    /// for regions the trainer has replaced.
    pub fn remove_payload(&self, generation: Generation) -> bool {
        self.store
            .remove_payload(&self.identity.payload_name(generation))
    }

    // ── Payload ──────────────────────────────────────────────────

    /// Current side-channel content.
    pub fn read_side_channel(&self) -> Result<Vec<u8>, RegionError> {
        self.payload(|p| p.read_side_channel())
    }

    /// Write the side channel, regrowing the region first if needed.
    pub fn write_side_channel(&self, data: &[u8]) -> Result<(), RegionError> {
        if data.len() + SIDE_CHANNEL_PREFIX_BYTES >= self.side_channel_capacity() {
            self.regrow(2 * data.len() + 20)?;
        }
        self.payload(|p| p.write_side_channel(data))
    }

    /// Register `name` with no agents.
    pub fn register_behavior(&self, name: &str, spec: BehaviorSpec) -> Result<(), RegionError> {
        self.payload(|p| {
            p.behaviors.insert(name.into(), BehaviorData::new(spec));
            Ok(())
        })
    }

    /// Publish the step batches of `name`.
    pub fn publish_steps(
        &self,
        name: &str,
        decisions: DecisionSteps,
        terminals: TerminalSteps,
    ) -> Result<(), RegionError> {
        self.payload(|p| {
            let behavior = p
                .behaviors
                .get_mut(name)
                .ok_or_else(|| RegionError::UnknownBehavior { key: name.into() })?;
            behavior.decisions = decisions;
            behavior.terminals = terminals;
            Ok(())
        })
    }

    /// Actions last written by the trainer for `name`.
    pub fn actions(&self, name: &str) -> Option<ActionBatch> {
        self.payload(|p| Ok(p.behaviors.get(name).and_then(|b| b.actions.clone())))
            .ok()
            .flatten()
    }
}

/// One scripted peer turn, run while the peer owns the payload.
pub type Turn = Box<dyn FnOnce(&PeerHandle) + Send>;

/// What the peer observed during one turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnReport {
    /// Zero-based turn index.
    pub turn: usize,
    /// Whether the trainer requested a reset with this handoff.
    pub reset_requested: bool,
    /// Side-channel content the trainer left for the peer.
    pub side_channel: Vec<u8>,
}

/// Background thread playing the peer through a fixed script.
///
/// For each turn: wait until the trainer hands control over, record the
/// reset flag and side channel, run the turn, then hand control back
/// unless the turn deactivated the peer. Gives up if the trainer does not
/// hand control over within `patience`.
pub struct Responder {
    reports: Receiver<TurnReport>,
    thread: Option<JoinHandle<()>>,
}

impl Responder {
    /// Spawn the responder thread.
    pub fn spawn(peer: PeerHandle, turns: Vec<Turn>, patience: Duration) -> Self {
        let (tx, rx) = unbounded();
        let thread = thread::spawn(move || {
            for (turn, action) in turns.into_iter().enumerate() {
                if !peer.wait_for_control(patience) {
                    return;
                }
                let report = TurnReport {
                    turn,
                    reset_requested: peer.take_reset(),
                    side_channel: peer.read_side_channel().unwrap_or_default(),
                };
                action(&peer);
                let still_active = peer
                    .store
                    .with_control(peer.identity.as_str(), |c| c.active)
                    .unwrap_or(false);
                if still_active {
                    peer.hand_back();
                }
                if tx.send(report).is_err() || !still_active {
                    return;
                }
            }
        });
        Self {
            reports: rx,
            thread: Some(thread),
        }
    }

    /// `turns` turns that do nothing but hand control back.
    pub fn echo(peer: PeerHandle, turns: usize, patience: Duration) -> Self {
        let script: Vec<Turn> = (0..turns)
            .map(|_| Box::new(|_: &PeerHandle| {}) as Turn)
            .collect();
        Self::spawn(peer, script, patience)
    }

    /// Next report, waiting at most `timeout`.
    pub fn next_report(&self, timeout: Duration) -> Option<TurnReport> {
        self.reports.recv_timeout(timeout).ok()
    }

    /// Wait for the script to finish and collect the remaining reports.
    pub fn join(mut self) -> Vec<TurnReport> {
        if let Some(thread) = self.thread.take() {
            // A panicking turn already failed the test that scripted it.
            let _ = thread.join();
        }
        self.reports.try_iter().collect()
    }
}
