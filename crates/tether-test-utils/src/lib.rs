//! Test utilities for Tether development.
//!
//! Provides an in-process [`RegionProvider`](tether_core::RegionProvider)
//! over a [`SegmentStore`], a [`PeerHandle`] playing the simulation side of
//! the flag contract, a [`Responder`] thread for end-to-end handshakes, a
//! [`FakeClock`], and behavior/step fixtures.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod clock;
pub mod fixtures;
pub mod peer;
pub mod region;
pub mod store;

pub use clock::FakeClock;
pub use peer::{PeerHandle, Responder, Turn, TurnReport};
pub use region::{InProcessControl, InProcessPayload, InProcessProvider};
pub use store::{BehaviorData, ControlSegment, PayloadSegment, SegmentStore, PROTOCOL_VERSION};
