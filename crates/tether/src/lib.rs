//! Tether: a shared-memory channel between an RL trainer and a simulation.
//!
//! This is the top-level facade crate that re-exports the public API from
//! the Tether sub-crates. For most users, adding `tether` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use std::time::Duration;
//!
//! use tether::prelude::*;
//! use tether_test_utils::{InProcessProvider, PeerHandle, Responder, SegmentStore};
//!
//! // An in-process namespace stands in for the OS shared-memory backend.
//! let store = SegmentStore::new();
//! let provider = InProcessProvider::new(store.clone());
//! let mut channel = Channel::open(provider, ChannelConfig::default()).unwrap();
//!
//! // Play the simulation side on a background thread.
//! let peer = PeerHandle::new(store, channel.identity().clone());
//! let responder = Responder::echo(peer, 1, Duration::from_secs(5));
//!
//! channel.write_side_channel(b"hello").unwrap();
//! channel.give_control(true).unwrap();
//! channel.wait_for_peer().unwrap();
//! assert_eq!(channel.state(), HandshakeState::Idle);
//!
//! let reports = responder.join();
//! assert!(reports[0].reset_requested);
//! assert_eq!(reports[0].side_channel, b"hello".to_vec());
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `tether-core` | Identities, generations, RL step types, region traits |
//! | [`channel`] | `tether-channel` | The handshake channel, its config, errors, and metrics |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types and region traits (`tether-core`).
///
/// Contains [`types::SessionId`], [`types::Generation`], the behavior and
/// step types, and the backend seam: [`types::RegionProvider`],
/// [`types::ControlBlock`], and [`types::PayloadRegion`].
pub use tether_core as types;

/// The trainer-side handshake channel (`tether-channel`).
///
/// [`channel::Channel`] drives the session; [`channel::ChannelConfig`]
/// configures it.
pub use tether_channel as channel;

/// Common imports for typical Tether usage.
///
/// ```rust
/// use tether::prelude::*;
/// ```
pub mod prelude {
    // Channel
    pub use tether_channel::{Channel, ChannelConfig, HandshakeState, PollStrategy};

    // Errors
    pub use tether_channel::{ChannelError, ConfigError};
    pub use tether_core::{RegionError, VersionMismatch};

    // RL data
    pub use tether_core::{
        ActionBatch, ActionSpec, BehaviorSpec, BehaviorSpecs, DecisionSteps, TerminalSteps,
    };

    // Backend seam
    pub use tether_core::{
        ControlBlock, Generation, PayloadRegion, RegionProvider, SessionId,
    };
}
