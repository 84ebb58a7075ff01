//! Transport abstraction for roomsync.
//!
//! This module provides the room channel a provider talks through. A
//! channel is a broadcast bus scoped to one room, plus a presence primitive
//! that tells every member who else is subscribed.
//!
//! # Design
//!
//! The channel trait is async and subscription-oriented:
//! - `connect()` subscribes and hands back the inbound event stream
//! - `send()` broadcasts a named event, fire-and-forget
//! - `track()` publishes this peer's presence record
//! - `unsubscribe()` releases the subscription (idempotent)
//!
//! Broadcasts are not delivered back to the sender. Anything sent or
//! tracked after `unsubscribe()` is silently dropped.
//!
//! # Example
//!
//! ```ignore
//! let hub = MemoryHub::new();
//! let channel = hub.channel("room-1");
//! let mut inbound = channel.connect().await?;
//! channel.send(EVENT_ACTION, payload).await;
//! while let Some(event) = inbound.recv().await { /* ... */ }
//! ```

mod memory;
mod mock;

pub use memory::{MemoryChannel, MemoryHub};
pub use mock::MockChannel;

use async_trait::async_trait;
use roomsync_core::PresenceChange;
use roomsync_types::PresenceRecord;
use thiserror::Error;
use tokio::sync::mpsc;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Subscription failed.
    #[error("subscription failed: {0}")]
    ConnectionFailed(String),

    /// Subscription timed out.
    #[error("subscription timed out")]
    Timeout,

    /// The channel was already torn down.
    #[error("channel closed")]
    Closed,
}

/// Subscription status reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionStatus {
    /// The channel is live.
    Subscribed,
    /// The transport reported an error.
    ChannelError(String),
    /// The subscription timed out.
    TimedOut,
    /// The transport closed the channel.
    Closed,
}

/// An inbound event from the room channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// A named broadcast from another member.
    Broadcast {
        /// Event name (`action`, `state-request`, `state-sync`).
        event: String,
        /// JSON payload bytes.
        payload: Vec<u8>,
    },
    /// Presence sync, join or leave.
    Presence(PresenceChange),
    /// Subscription status change.
    Status(SubscriptionStatus),
}

/// Receiving end of a channel subscription.
pub type ChannelEvents = mpsc::UnboundedReceiver<ChannelEvent>;

/// Room channel used by a provider.
///
/// Implementations handle the underlying pub/sub mechanism (hosted
/// realtime service, in-process hub, mock).
#[async_trait]
pub trait Channel: Send + Sync {
    /// Subscribe to the room.
    ///
    /// Returns the inbound event stream. The transport reports
    /// `Status(Subscribed)` on that stream once the channel is live.
    async fn connect(&self) -> Result<ChannelEvents, TransportError>;

    /// Broadcast a named event to every other member. Never fails.
    async fn send(&self, event: &str, payload: Vec<u8>);

    /// Publish this peer's presence record.
    async fn track(&self, presence: PresenceRecord);

    /// Release the subscription. Safe to call more than once.
    async fn unsubscribe(&self);

    /// Check if currently subscribed.
    fn is_subscribed(&self) -> bool;
}
