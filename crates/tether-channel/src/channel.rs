//! The trainer side of a shared-memory session.
//!
//! [`Channel`] owns the session's control block and its current payload
//! region, and mediates every access to them through [`HandshakeState`].
//! A typical step of a training loop:
//!
//! ```ignore
//! channel.write_side_channel(&outgoing)?;
//! channel.write_actions("walker", &actions)?;
//! channel.give_control(false)?;
//! channel.wait_for_peer()?;
//! let incoming = channel.read_and_clear_side_channel()?;
//! let (decisions, terminals) = channel.read_steps("walker")?;
//! ```
//!
//! # Generations
//!
//! The payload region is recreated whenever the side channel must grow,
//! by either side. The control block's generation counter names the
//! current region. This side bumps it *before* creating the replacement
//! when it grows the region itself, and replays every missed generation,
//! one at a time, after each wait before touching the payload again.
//!
//! # Teardown
//!
//! A timeout, a peer that clears its active flag, or a region failure in
//! the middle of a protocol step all end the session: both regions are
//! released and the channel moves to [`HandshakeState::Terminated`] before
//! the error is returned. Dropping a live channel closes it.

use std::fmt;
use std::time::Duration;

use tether_core::{
    ActionBatch, BehaviorSpecs, Clock, ControlBlock, DecisionSteps, Generation, OpenMode,
    PayloadLayout, PayloadRegion, RegionError, RegionProvider, SessionId, SystemClock,
    TerminalSteps,
};
use tracing::{debug, info, warn};

use crate::config::{grown_capacity, needs_growth, ChannelConfig};
use crate::error::ChannelError;
use crate::identity::allocate_identity;
use crate::metrics::ChannelMetrics;
use crate::state::HandshakeState;

/// Trainer-side endpoint of a two-party shared-memory session.
///
/// Generic over the region backend `R` and the clock `K` used for the
/// wait deadline.
pub struct Channel<R, K = SystemClock>
where
    R: RegionProvider,
    K: Clock,
{
    provider: R,
    clock: K,
    config: ChannelConfig,
    identity: SessionId,
    control: R::Control,
    payload: R::Payload,
    generation: Generation,
    state: HandshakeState,
    metrics: ChannelMetrics,
}

impl<R: RegionProvider> Channel<R, SystemClock> {
    /// Open a new session on `provider`.
    ///
    /// Picks the identity, creates the control block at generation 0 and
    /// the first payload region. The channel starts in
    /// [`HandshakeState::Idle`].
    pub fn open(provider: R, config: ChannelConfig) -> Result<Self, ChannelError> {
        Self::open_with_clock(provider, config, SystemClock::new())
    }
}

impl<R, K> Channel<R, K>
where
    R: RegionProvider,
    K: Clock,
{
    /// [`open`](Channel::open) with an explicit clock.
    pub fn open_with_clock(
        mut provider: R,
        config: ChannelConfig,
        clock: K,
    ) -> Result<Self, ChannelError> {
        config.validate()?;
        let identity = allocate_identity(
            config.fixed_identity,
            &provider,
            config.max_identity_attempts,
        )?;
        let mut control = provider.create_control(&identity, config.initial_layout())?;
        let generation = control.generation();
        let payload = match provider.open_payload(
            &identity,
            generation,
            OpenMode::Create { migrate_from: None },
            control.layout(),
        ) {
            Ok(payload) => payload,
            Err(e) => {
                if let Err(cleanup) = control.destroy() {
                    warn!(identity = %identity, error = %cleanup, "failed to remove control block");
                }
                return Err(e.into());
            }
        };
        info!(identity = %identity, generation = generation.0, "channel opened");
        Ok(Self {
            provider,
            clock,
            config,
            identity,
            control,
            payload,
            generation,
            state: HandshakeState::Idle,
            metrics: ChannelMetrics::default(),
        })
    }

    // ── Accessors ────────────────────────────────────────────────

    /// The session identity the peer must be pointed at.
    pub fn identity(&self) -> &SessionId {
        &self.identity
    }

    /// Whether the session is live and the peer reports itself active.
    pub fn is_active(&self) -> bool {
        self.state != HandshakeState::Terminated && self.control.is_active()
    }

    /// Current handshake state.
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Generation of the payload handle this side currently holds.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Side-channel capacity published in the control block.
    pub fn side_channel_capacity(&self) -> usize {
        self.control.side_channel_capacity()
    }

    /// Handshake counters.
    pub fn metrics(&self) -> &ChannelMetrics {
        &self.metrics
    }

    /// The configuration the channel was opened with.
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Release the session's regions.
    ///
    /// Closes the control block handle and removes the payload region.
    /// Idempotent.
    pub fn close(&mut self) {
        if self.state == HandshakeState::Terminated {
            return;
        }
        self.state = HandshakeState::Terminated;
        self.control.close();
        if let Err(e) = self.payload.destroy() {
            warn!(identity = %self.identity, error = %e, "failed to remove payload region");
        }
        info!(identity = %self.identity, "channel closed");
    }

    // ── Handshake ────────────────────────────────────────────────

    /// Hand the payload to the peer.
    ///
    /// Raises this side's blocked flag, optionally requests an episode
    /// reset, then clears the peer's blocked flag. These are three separate
    /// writes in the order the peer expects; a peer that polls between
    /// them sees a partial update.
    pub fn give_control(&mut self, reset: bool) -> Result<(), ChannelError> {
        self.require_idle("give_control")?;
        if let Err(e) = self.control.mark_blocked() {
            return Err(self.fatal(e));
        }
        if reset {
            if let Err(e) = self.control.request_reset() {
                return Err(self.fatal(e));
            }
        }
        if let Err(e) = self.control.unblock_peer() {
            return Err(self.fatal(e));
        }
        self.state = HandshakeState::PeerOwns;
        self.metrics.handoffs += 1;
        if reset {
            self.metrics.resets_requested += 1;
        }
        debug!(identity = %self.identity, reset, "control handed to peer");
        Ok(())
    }

    /// Block until the peer hands the payload back.
    ///
    /// Spins on the control block's blocked flag. The deadline is only
    /// checked once every `timeout_check_interval` polls, so a timeout is
    /// detected up to that many polls late.
    ///
    /// On success, replaces a stale payload handle before returning.
    ///
    /// # Errors
    ///
    /// - [`ChannelError::Timeout`]: the deadline passed; the session is torn down.
    /// - [`ChannelError::PeerTerminated`]: the peer went inactive; the session
    ///   is torn down. A protocol mismatch found while diagnosing it is
    ///   attached but never replaces the error.
    /// - [`ChannelError::InvalidState`]: control was not handed over first.
    pub fn wait_for_peer(&mut self) -> Result<(), ChannelError> {
        if self.state != HandshakeState::PeerOwns {
            return Err(ChannelError::InvalidState {
                operation: "wait_for_peer",
                state: self.state,
            });
        }
        let interval = u64::from(self.config.timeout_check_interval.max(1));
        let started = self.clock.now();
        let mut iterations: u64 = 0;
        while self.control.is_blocked() && self.control.is_active() {
            if iterations % interval == 0 {
                let elapsed = self.clock.now().saturating_sub(started);
                if elapsed > self.config.timeout {
                    self.metrics.record_wait(iterations, elapsed);
                    return Err(self.abandon_after_timeout(elapsed, iterations));
                }
            }
            iterations += 1;
            self.config.poll.relax();
        }
        let elapsed = self.clock.now().saturating_sub(started);
        self.metrics.record_wait(iterations, elapsed);

        if !self.control.is_active() {
            return Err(self.abandon_after_termination());
        }
        self.recover_stale_payload()?;
        self.state = HandshakeState::Idle;
        self.metrics.waits_completed += 1;
        debug!(identity = %self.identity, iterations, "control returned by peer");
        Ok(())
    }

    // ── Side channel ─────────────────────────────────────────────

    /// Replace the side-channel content with `data`.
    ///
    /// If `data` and its length prefix do not fit the published capacity,
    /// the payload region is first recreated with room for
    /// [`grown_capacity`] bytes under the next generation.
    pub fn write_side_channel(&mut self, data: &[u8]) -> Result<(), ChannelError> {
        self.require_idle("write_side_channel")?;
        if needs_growth(data.len(), self.control.side_channel_capacity()) {
            self.grow_side_channel(grown_capacity(data.len()))?;
        }
        self.payload.write_side_channel(data)?;
        Ok(())
    }

    /// Take the current side-channel content, leaving it empty.
    pub fn read_and_clear_side_channel(&mut self) -> Result<Vec<u8>, ChannelError> {
        self.require_idle("read_and_clear_side_channel")?;
        let data = self.payload.read_side_channel()?;
        self.payload.write_side_channel(&[])?;
        Ok(data)
    }

    // ── Step data ────────────────────────────────────────────────

    /// Decision and terminal steps published for behavior `key`.
    pub fn read_steps(&self, key: &str) -> Result<(DecisionSteps, TerminalSteps), ChannelError> {
        self.require_idle("read_steps")?;
        Ok((
            self.payload.decision_steps(key)?,
            self.payload.terminal_steps(key)?,
        ))
    }

    /// Number of decisions the peer is waiting on for behavior `key`.
    pub fn read_pending_decision_count(&self, key: &str) -> Result<usize, ChannelError> {
        self.require_idle("read_pending_decision_count")?;
        Ok(self.payload.pending_decision_count(key)?)
    }

    /// Publish the actions for behavior `key`.
    pub fn write_actions(&mut self, key: &str, actions: &ActionBatch) -> Result<(), ChannelError> {
        self.require_idle("write_actions")?;
        self.payload.set_actions(key, actions)?;
        Ok(())
    }

    /// Number of behaviors the peer has registered.
    pub fn behavior_count(&self) -> Result<usize, ChannelError> {
        self.require_idle("behavior_count")?;
        Ok(self.payload.behavior_count())
    }

    /// Registered behaviors and their shape contracts.
    pub fn read_behavior_specs(&self) -> Result<BehaviorSpecs, ChannelError> {
        self.require_idle("read_behavior_specs")?;
        Ok(self.payload.behavior_specs()?)
    }

    // ── Internals ────────────────────────────────────────────────

    fn require_idle(&self, operation: &'static str) -> Result<(), ChannelError> {
        if self.state.owns_payload() {
            Ok(())
        } else {
            Err(ChannelError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    /// Recreate the payload region under the next generation.
    fn grow_side_channel(&mut self, capacity: usize) -> Result<(), ChannelError> {
        let next = self.generation.next();
        // Published first so a polling peer cannot miss the new region.
        if let Err(e) = self.control.set_generation(next) {
            return Err(self.fatal(e));
        }
        self.generation = next;
        let layout = PayloadLayout {
            side_channel_capacity: capacity,
            rl_data_capacity: self.control.rl_data_capacity(),
        };
        let created = self.provider.open_payload(
            &self.identity,
            next,
            OpenMode::Create {
                migrate_from: Some(&self.payload),
            },
            layout,
        );
        let fresh = match created {
            Ok(fresh) => fresh,
            Err(e) => return Err(self.fatal(e)),
        };
        // The peer removes the old region once it notices the new generation.
        let mut stale = std::mem::replace(&mut self.payload, fresh);
        stale.close();
        if let Err(e) = self.control.set_side_channel_capacity(capacity) {
            // The session ends here, so the peer never learns of the new
            // generation and will not remove the old region itself.
            if let Err(cleanup) = stale.destroy() {
                warn!(
                    identity = %self.identity,
                    error = %cleanup,
                    "failed to remove replaced payload region"
                );
            }
            return Err(self.fatal(e));
        }
        self.metrics.side_channel_grows += 1;
        debug!(
            identity = %self.identity,
            generation = next.0,
            capacity,
            "side channel grown"
        );
        Ok(())
    }

    /// Catch up with regions the peer recreated while it owned the payload.
    fn recover_stale_payload(&mut self) -> Result<(), ChannelError> {
        let published = self.control.generation();
        if self.generation > published {
            warn!(
                identity = %self.identity,
                cached = self.generation.0,
                published = published.0,
                "control block reports an older payload generation than this side holds"
            );
        }
        while self.generation < self.control.generation() {
            if let Err(e) = self.payload.destroy() {
                warn!(
                    identity = %self.identity,
                    generation = self.generation.0,
                    error = %e,
                    "failed to remove stale payload region"
                );
            }
            self.generation = self.generation.next();
            let attached = self.provider.open_payload(
                &self.identity,
                self.generation,
                OpenMode::Attach,
                self.control.layout(),
            );
            match attached {
                Ok(payload) => self.payload = payload,
                Err(e) => return Err(self.fatal(e)),
            }
            self.metrics.regenerations += 1;
            debug!(
                identity = %self.identity,
                generation = self.generation.0,
                "attached to regenerated payload region"
            );
        }
        Ok(())
    }

    fn abandon_after_timeout(&mut self, elapsed: Duration, iterations: u64) -> ChannelError {
        warn!(
            identity = %self.identity,
            ?elapsed,
            iterations,
            "peer did not respond, tearing session down"
        );
        self.close();
        if let Err(e) = self.control.destroy() {
            warn!(identity = %self.identity, error = %e, "failed to remove control block");
        }
        ChannelError::Timeout {
            elapsed,
            iterations,
        }
    }

    fn abandon_after_termination(&mut self) -> ChannelError {
        let version_mismatch = self.control.check_protocol_version().err();
        if let Some(mismatch) = &version_mismatch {
            warn!(identity = %self.identity, %mismatch, "peer speaks a different protocol");
        }
        self.state = HandshakeState::Terminated;
        if let Err(e) = self.control.destroy() {
            warn!(identity = %self.identity, error = %e, "failed to remove control block");
        }
        if let Err(e) = self.payload.destroy() {
            warn!(identity = %self.identity, error = %e, "failed to remove payload region");
        }
        warn!(identity = %self.identity, "peer terminated the session");
        ChannelError::PeerTerminated { version_mismatch }
    }

    fn fatal(&mut self, error: RegionError) -> ChannelError {
        warn!(identity = %self.identity, %error, "region failure, closing channel");
        self.close();
        ChannelError::Region(error)
    }
}

impl<R, K> Drop for Channel<R, K>
where
    R: RegionProvider,
    K: Clock,
{
    fn drop(&mut self) {
        self.close();
    }
}

impl<R, K> fmt::Debug for Channel<R, K>
where
    R: RegionProvider,
    K: Clock,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("identity", &self.identity)
            .field("state", &self.state)
            .field("generation", &self.generation)
            .finish()
    }
}
