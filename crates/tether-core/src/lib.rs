//! Core types and traits for the Tether trainer/simulation channel.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the vocabulary shared by the channel and by every region backend:
//! session identities, payload generations, the error taxonomy, the
//! step/behavior payload types, and the traits that model the two
//! shared regions ([`ControlBlock`] and [`PayloadRegion`]).

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod behavior;
pub mod clock;
pub mod error;
pub mod id;
pub mod region;
pub mod steps;

pub use behavior::{ActionBatch, ActionSpec, BehaviorSpec, BehaviorSpecs, ObsShape};
pub use clock::{Clock, SystemClock};
pub use error::{RegionError, VersionMismatch};
pub use id::{Generation, SessionId, DEFAULT_IDENTITY};
pub use region::{
    CollisionCheck, ControlBlock, OpenMode, PayloadLayout, PayloadRegion, RegionProvider,
    SIDE_CHANNEL_PREFIX_BYTES,
};
pub use steps::{DecisionSteps, ObsBuffer, TerminalSteps};
