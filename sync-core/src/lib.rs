//! # sync-core
//!
//! Pure logic for roomsync (no I/O, instant tests).
//!
//! This crate implements the state machines and algorithms for room sync
//! without any network access, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input (events,
//! timestamps) and produce output (actions) without side effects. Time is
//! always passed in by the caller.
//!
//! The actual I/O is performed by `roomsync-client`, which interprets the
//! actions produced by these state machines.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod apply;
pub mod bootstrap;
pub mod buffer;
pub mod dedup;
pub mod engine;
pub mod membership;
pub mod state;

pub use apply::{ApplyOutcome, RemoteApplier};
pub use bootstrap::{
    Bootstrap, BootstrapAction, BootstrapEvent, BootstrapPhase, DEFAULT_MAX_OFFER_JITTER,
};
pub use buffer::{PlacementBatcher, DEFAULT_FLUSH_INTERVAL, DEFAULT_MAX_BATCH};
pub use dedup::{DuplicateFilter, DEFAULT_DEDUP_WINDOW};
pub use engine::MutationEngine;
pub use membership::{MembershipAction, PresenceChange, RoomMembership};
pub use state::{Action, ConnectionState, Event};
