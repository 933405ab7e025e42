//! Traits modelling the two shared regions and their allocator.
//!
//! A session consists of one [`ControlBlock`], alive for the whole
//! session, and one current [`PayloadRegion`], replaced every time its
//! generation changes. Both are produced by a [`RegionProvider`], which
//! owns naming and allocation. None of these traits assume anything about
//! the remote process beyond the flag contract documented on each method.
//!
//! Reads of shared flags are infallible: a mapped region can always be
//! read. Writes and lifecycle operations report [`RegionError`].

use crate::behavior::{ActionBatch, BehaviorSpecs};
use crate::error::{RegionError, VersionMismatch};
use crate::id::{Generation, SessionId};
use crate::steps::{DecisionSteps, TerminalSteps};

/// Bytes reserved at the front of the side-channel buffer for the length prefix.
pub const SIDE_CHANNEL_PREFIX_BYTES: usize = 4;

/// Buffer capacities of a payload region.
///
/// Published through the control block so that both sides size the
/// region identically when attaching to a new generation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PayloadLayout {
    /// Side-channel capacity in bytes, length prefix included.
    pub side_channel_capacity: usize,
    /// RL step-data capacity in bytes.
    pub rl_data_capacity: usize,
}

/// How a payload region handle is obtained.
#[derive(Debug)]
pub enum OpenMode<'a, P> {
    /// Allocate a fresh region, optionally carrying the RL-data buffer
    /// forward from `migrate_from`.
    Create {
        /// Region whose RL-data buffer is copied into the new one.
        migrate_from: Option<&'a P>,
    },
    /// Map a region the remote side already created.
    Attach,
}

/// Fixed-size session metadata shared with the remote side.
///
/// "Blocked" always refers to this side: the flag is raised by
/// [`mark_blocked`](ControlBlock::mark_blocked) before handing control
/// over, and cleared by the remote side when it hands control back.
pub trait ControlBlock {
    /// Whether the remote side is initialized and has not shut down.
    fn is_active(&self) -> bool;

    /// Whether this side is currently blocked waiting for the remote side.
    fn is_blocked(&self) -> bool;

    /// Raise this side's blocked flag.
    fn mark_blocked(&mut self) -> Result<(), RegionError>;

    /// Ask the remote side to reset its episodes on its next activation.
    fn request_reset(&mut self) -> Result<(), RegionError>;

    /// Clear the remote side's blocked flag, handing it the payload.
    fn unblock_peer(&mut self) -> Result<(), RegionError>;

    /// Published side-channel capacity, length prefix included.
    fn side_channel_capacity(&self) -> usize;

    /// Publish a new side-channel capacity.
    fn set_side_channel_capacity(&mut self, capacity: usize) -> Result<(), RegionError>;

    /// Published RL step-data capacity.
    fn rl_data_capacity(&self) -> usize;

    /// Generation of the current payload region.
    fn generation(&self) -> Generation;

    /// Publish a new payload generation.
    fn set_generation(&mut self, generation: Generation) -> Result<(), RegionError>;

    /// Compare the remote side's protocol stamp with this side's.
    fn check_protocol_version(&self) -> Result<(), VersionMismatch>;

    /// Release the local mapping. The region itself survives.
    fn close(&mut self);

    /// Release the local mapping and remove the region.
    ///
    /// Destroying an already destroyed handle is a no-op.
    fn destroy(&mut self) -> Result<(), RegionError>;

    /// Capacities currently published for the payload region.
    fn layout(&self) -> PayloadLayout {
        PayloadLayout {
            side_channel_capacity: self.side_channel_capacity(),
            rl_data_capacity: self.rl_data_capacity(),
        }
    }
}

/// Variable-size payload shared with the remote side.
///
/// Holds a length-prefixed side-channel buffer and the RL step data.
/// Callers must only touch it while they own the payload.
pub trait PayloadRegion {
    /// Current side-channel content.
    fn read_side_channel(&self) -> Result<Vec<u8>, RegionError>;

    /// Replace the side-channel content.
    ///
    /// Fails with [`RegionError::CapacityExceeded`] if `data` and its
    /// length prefix do not fit.
    fn write_side_channel(&mut self, data: &[u8]) -> Result<(), RegionError>;

    /// Agents of `key` waiting for a decision.
    fn decision_steps(&self, key: &str) -> Result<DecisionSteps, RegionError>;

    /// Agents of `key` whose episode ended.
    fn terminal_steps(&self, key: &str) -> Result<TerminalSteps, RegionError>;

    /// Number of decisions the remote side is waiting on for `key`.
    fn pending_decision_count(&self, key: &str) -> Result<usize, RegionError>;

    /// Publish the actions for `key`.
    fn set_actions(&mut self, key: &str, actions: &ActionBatch) -> Result<(), RegionError>;

    /// Number of registered behaviors.
    fn behavior_count(&self) -> usize;

    /// Registered behaviors and their specs.
    fn behavior_specs(&self) -> Result<BehaviorSpecs, RegionError>;

    /// Release the local mapping. The region itself survives.
    fn close(&mut self);

    /// Release the local mapping and remove the region.
    ///
    /// Destroying an already destroyed handle is a no-op.
    fn destroy(&mut self) -> Result<(), RegionError>;
}

/// Answers whether a candidate identity is already in use.
pub trait CollisionCheck {
    /// `true` if a region named `identity` already exists.
    fn is_taken(&self, identity: &SessionId) -> bool;
}

impl<F> CollisionCheck for F
where
    F: Fn(&SessionId) -> bool,
{
    fn is_taken(&self, identity: &SessionId) -> bool {
        self(identity)
    }
}

/// Allocates and attaches the shared regions of a session.
pub trait RegionProvider: CollisionCheck {
    /// Control block handle type.
    type Control: ControlBlock;
    /// Payload region handle type.
    type Payload: PayloadRegion;

    /// Create the control block for `identity`, at generation 0, with
    /// `layout` published as the initial capacities.
    fn create_control(
        &mut self,
        identity: &SessionId,
        layout: PayloadLayout,
    ) -> Result<Self::Control, RegionError>;

    /// Create or attach the payload region of `identity` at `generation`.
    fn open_payload(
        &mut self,
        identity: &SessionId,
        generation: Generation,
        mode: OpenMode<'_, Self::Payload>,
        layout: PayloadLayout,
    ) -> Result<Self::Payload, RegionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_collision_checks() {
        let taken = |id: &SessionId| id.as_str() == "busy";
        assert!(taken.is_taken(&SessionId::new("busy")));
        assert!(!taken.is_taken(&SessionId::new("free")));
    }

    #[test]
    fn default_layout_is_empty() {
        let layout = PayloadLayout::default();
        assert_eq!(layout.side_channel_capacity, 0);
        assert_eq!(layout.rl_data_capacity, 0);
    }
}
