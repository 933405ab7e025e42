//! In-process stand-in for the shared-memory namespace.
//!
//! A [`SegmentStore`] maps region names to segment contents behind a
//! mutex. Handles created from the same store (trainer-side regions,
//! [`PeerHandle`](crate::PeerHandle)s) see each other's writes, which is
//! all the channel protocol needs from real shared memory. Control blocks
//! and payload regions live in separate namespaces, like the control file
//! and the data files of a real session.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use indexmap::IndexMap;
use tether_core::{
    ActionBatch, BehaviorSpec, DecisionSteps, Generation, PayloadLayout, RegionError,
    TerminalSteps, SIDE_CHANNEL_PREFIX_BYTES,
};

/// `(major, minor)` protocol version stamped into new control blocks.
pub const PROTOCOL_VERSION: (u32, u32) = (1, 0);

/// Contents of a control block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControlSegment {
    /// Peer is initialized and has not shut down.
    pub active: bool,
    /// Trainer is waiting for the peer.
    pub trainer_blocked: bool,
    /// Peer is waiting for the trainer.
    pub peer_blocked: bool,
    /// One-shot reset request.
    pub reset_requested: bool,
    /// Published side-channel capacity.
    pub side_channel_capacity: usize,
    /// Published RL-data capacity.
    pub rl_data_capacity: usize,
    /// Current payload generation.
    pub generation: Generation,
    /// Protocol version stamped by the peer.
    pub version: (u32, u32),
}

impl ControlSegment {
    /// A fresh control block: peer active and blocked, trainer free.
    pub fn new(layout: PayloadLayout) -> Self {
        Self {
            active: true,
            trainer_blocked: false,
            peer_blocked: true,
            reset_requested: false,
            side_channel_capacity: layout.side_channel_capacity,
            rl_data_capacity: layout.rl_data_capacity,
            generation: Generation(0),
            version: PROTOCOL_VERSION,
        }
    }
}

/// RL data of one behavior inside a payload segment.
#[derive(Clone, Debug, PartialEq)]
pub struct BehaviorData {
    /// Shape contract.
    pub spec: BehaviorSpec,
    /// Agents waiting for a decision.
    pub decisions: DecisionSteps,
    /// Agents whose episode ended.
    pub terminals: TerminalSteps,
    /// Last actions written by the trainer.
    pub actions: Option<ActionBatch>,
}

impl BehaviorData {
    /// No agents yet, shaped for `spec`.
    pub fn new(spec: BehaviorSpec) -> Self {
        Self {
            decisions: DecisionSteps::empty(&spec),
            terminals: TerminalSteps::empty(&spec),
            actions: None,
            spec,
        }
    }
}

/// Contents of a payload region.
#[derive(Clone, Debug, PartialEq)]
pub struct PayloadSegment {
    side_channel: Vec<u8>,
    rl_data_capacity: usize,
    /// Registered behaviors, in registration order.
    pub behaviors: IndexMap<String, BehaviorData>,
}

impl PayloadSegment {
    /// A zeroed segment sized by `layout`.
    pub fn new(layout: PayloadLayout) -> Self {
        Self {
            side_channel: vec![0; layout.side_channel_capacity],
            rl_data_capacity: layout.rl_data_capacity,
            behaviors: IndexMap::new(),
        }
    }

    /// Capacities this segment was created with.
    pub fn layout(&self) -> PayloadLayout {
        PayloadLayout {
            side_channel_capacity: self.side_channel.len(),
            rl_data_capacity: self.rl_data_capacity,
        }
    }

    /// Decode the length-prefixed side-channel content.
    pub fn read_side_channel(&self) -> Result<Vec<u8>, RegionError> {
        let capacity = self.side_channel.len();
        if capacity < SIDE_CHANNEL_PREFIX_BYTES {
            return Ok(Vec::new());
        }
        let mut prefix = [0u8; SIDE_CHANNEL_PREFIX_BYTES];
        prefix.copy_from_slice(&self.side_channel[..SIDE_CHANNEL_PREFIX_BYTES]);
        let declared = u32::from_le_bytes(prefix) as usize;
        if declared + SIDE_CHANNEL_PREFIX_BYTES > capacity {
            return Err(RegionError::CorruptLength { declared, capacity });
        }
        let start = SIDE_CHANNEL_PREFIX_BYTES;
        Ok(self.side_channel[start..start + declared].to_vec())
    }

    /// Encode `data` behind its length prefix.
    pub fn write_side_channel(&mut self, data: &[u8]) -> Result<(), RegionError> {
        let capacity = self.side_channel.len();
        if data.len() + SIDE_CHANNEL_PREFIX_BYTES > capacity {
            return Err(RegionError::CapacityExceeded {
                len: data.len(),
                capacity,
            });
        }
        let len = u32::try_from(data.len()).map_err(|_| RegionError::CapacityExceeded {
            len: data.len(),
            capacity,
        })?;
        self.side_channel[..SIDE_CHANNEL_PREFIX_BYTES].copy_from_slice(&len.to_le_bytes());
        let start = SIDE_CHANNEL_PREFIX_BYTES;
        self.side_channel[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Overwrite the raw length prefix, bypassing validation.
    pub fn corrupt_length_prefix(&mut self, declared: u32) {
        if self.side_channel.len() >= SIDE_CHANNEL_PREFIX_BYTES {
            self.side_channel[..SIDE_CHANNEL_PREFIX_BYTES].copy_from_slice(&declared.to_le_bytes());
        }
    }
}

#[derive(Default)]
struct Segments {
    controls: HashMap<String, ControlSegment>,
    payloads: HashMap<String, PayloadSegment>,
    fail_next_payload_open: bool,
    fail_control_writes: bool,
    control_writes_before_failure: Option<u32>,
}

/// Shared namespace of named segments.
///
/// Cloning is cheap and yields another view of the same namespace.
#[derive(Clone, Default)]
pub struct SegmentStore {
    inner: Arc<Mutex<Segments>>,
}

impl SegmentStore {
    /// An empty namespace.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Segments> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ── Introspection ────────────────────────────────────────────

    /// Whether a control block named `name` exists.
    pub fn contains_control(&self, name: &str) -> bool {
        self.lock().controls.contains_key(name)
    }

    /// Whether a payload region named `name` exists.
    pub fn contains_payload(&self, name: &str) -> bool {
        self.lock().payloads.contains_key(name)
    }

    /// Whether any segment, control or payload, is named `name`.
    pub fn contains(&self, name: &str) -> bool {
        let segments = self.lock();
        segments.controls.contains_key(name) || segments.payloads.contains_key(name)
    }

    /// Names of all live payload regions, sorted.
    pub fn payload_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().payloads.keys().cloned().collect();
        names.sort();
        names
    }

    /// Total number of live segments.
    pub fn segment_count(&self) -> usize {
        let segments = self.lock();
        segments.controls.len() + segments.payloads.len()
    }

    // ── Failure injection ────────────────────────────────────────

    /// Make the next payload create or attach fail.
    pub fn fail_next_payload_open(&self) {
        self.lock().fail_next_payload_open = true;
    }

    /// Make every control block write fail until cleared.
    pub fn fail_control_writes(&self, fail: bool) {
        self.lock().fail_control_writes = fail;
    }

    pub(crate) fn take_payload_failure(&self) -> bool {
        std::mem::take(&mut self.lock().fail_next_payload_open)
    }

    /// Let `writes` more control block writes succeed, then fail the rest.
    pub fn fail_control_writes_after(&self, writes: u32) {
        self.lock().control_writes_before_failure = Some(writes);
    }

    pub(crate) fn control_writes_fail(&self) -> bool {
        let mut segments = self.lock();
        if segments.fail_control_writes {
            return true;
        }
        match segments.control_writes_before_failure.as_mut() {
            Some(0) => true,
            Some(remaining) => {
                *remaining -= 1;
                false
            }
            None => false,
        }
    }

    // ── Segment access ───────────────────────────────────────────

    /// Insert a control block. Fails if the name is taken.
    pub fn insert_control(&self, name: &str, segment: ControlSegment) -> Result<(), RegionError> {
        let mut segments = self.lock();
        if segments.controls.contains_key(name) {
            return Err(RegionError::NameCollision { name: name.into() });
        }
        segments.controls.insert(name.into(), segment);
        Ok(())
    }

    /// Insert a payload region. Fails if the name is taken.
    pub fn insert_payload(&self, name: &str, segment: PayloadSegment) -> Result<(), RegionError> {
        let mut segments = self.lock();
        if segments.payloads.contains_key(name) {
            return Err(RegionError::NameCollision { name: name.into() });
        }
        segments.payloads.insert(name.into(), segment);
        Ok(())
    }

    /// Remove a control block. Returns whether it existed.
    pub fn remove_control(&self, name: &str) -> bool {
        self.lock().controls.remove(name).is_some()
    }

    /// Remove a payload region. Returns whether it existed.
    pub fn remove_payload(&self, name: &str) -> bool {
        self.lock().payloads.remove(name).is_some()
    }

    /// Run `f` against the control block `name`, if it exists.
    pub fn with_control<T>(&self, name: &str, f: impl FnOnce(&mut ControlSegment) -> T) -> Option<T> {
        self.lock().controls.get_mut(name).map(f)
    }

    /// Run `f` against the payload region `name`, if it exists.
    pub fn with_payload<T>(&self, name: &str, f: impl FnOnce(&mut PayloadSegment) -> T) -> Option<T> {
        self.lock().payloads.get_mut(name).map(f)
    }

    /// A copy of the control block `name`.
    pub fn control_snapshot(&self, name: &str) -> Option<ControlSegment> {
        self.lock().controls.get(name).cloned()
    }
}
