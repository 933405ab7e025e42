//! Error types shared by the channel and the region backends.
//!
//! [`RegionError`] covers infrastructure failures of the two shared
//! regions (creation, attachment, reads of malformed content).
//! [`VersionMismatch`] is the protocol-version diagnostic a control
//! block reports when the remote side speaks a different protocol.
//! Both are fatal: nothing in the channel retries them.

use thiserror::Error;

/// Failures of a control block or payload region backend.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RegionError {
    /// A region could not be created.
    #[error("failed to create region '{name}': {reason}")]
    CreateFailed {
        /// Name of the region.
        name: String,
        /// Backend-specific description.
        reason: String,
    },
    /// An existing region could not be attached to.
    #[error("failed to attach to region '{name}': {reason}")]
    AttachFailed {
        /// Name of the region.
        name: String,
        /// Backend-specific description.
        reason: String,
    },
    /// A region with this name already exists.
    #[error("region '{name}' already exists")]
    NameCollision {
        /// Name of the region.
        name: String,
    },
    /// The handle was closed or destroyed and can no longer be used.
    #[error("region '{name}' is detached")]
    Detached {
        /// Name of the region.
        name: String,
    },
    /// A side-channel write does not fit the buffer.
    #[error("payload of {len} bytes does not fit side channel of capacity {capacity}")]
    CapacityExceeded {
        /// Length of the rejected payload.
        len: usize,
        /// Side-channel capacity, including the length prefix.
        capacity: usize,
    },
    /// The side-channel length prefix points past the end of the buffer.
    #[error("side channel declares {declared} bytes but capacity is {capacity}")]
    CorruptLength {
        /// Length read from the prefix.
        declared: usize,
        /// Side-channel capacity, including the length prefix.
        capacity: usize,
    },
    /// No behavior with this name is registered in the payload region.
    #[error("unknown behavior '{key}'")]
    UnknownBehavior {
        /// The requested behavior name.
        key: String,
    },
    /// An action batch does not match the behavior's action spec.
    #[error("action batch for '{key}' rejected: {reason}")]
    ActionShape {
        /// The behavior name.
        key: String,
        /// Which dimension disagreed.
        reason: String,
    },
}

/// The remote side stamped a protocol version this side does not speak.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("protocol version mismatch: expected {expected:?}, found {found:?}")]
pub struct VersionMismatch {
    /// `(major, minor)` version this side implements.
    pub expected: (u32, u32),
    /// `(major, minor)` version found in the control block.
    pub found: (u32, u32),
}
