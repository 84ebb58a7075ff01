//! # sync-types
//!
//! Wire format types for roomsync host-less room synchronization.
//!
//! This crate provides the foundational types used across all roomsync crates:
//! - [`PeerId`], [`Peer`], [`PresenceRecord`] - Identity and presence types
//! - [`Action`], [`ActionMessage`], [`Placement`] - Mutation intents
//! - [`WireEvent`] - Room channel events (`action`, `state-request`, `state-sync`)
//! - [`StateBlob`] - Versioned, compressed engine snapshots
//! - [`SyncError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod blob;
mod envelope;
mod error;
mod ids;
mod messages;

pub use blob::{StateBlob, SCHEMA_VERSION};
pub use envelope::{WireEvent, EVENT_ACTION, EVENT_STATE_REQUEST, EVENT_STATE_SYNC};
pub use error::SyncError;
pub use ids::{now_millis, Peer, PeerId, PresenceRecord, Tool};
pub use messages::{Action, ActionMessage, Placement, StateRequest, StateSync};
