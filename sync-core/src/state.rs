//! Connection state machine for roomsync.
//!
//! This module provides a pure, side-effect-free state machine for the
//! room channel lifecycle. The state machine takes events as input and
//! produces a new state plus a list of actions to execute.
//!
//! The actual I/O (subscribing, tracking presence, unsubscribing) is
//! performed by roomsync-client, not by this module.
//!
//! There is no automatic reconnect: a failed channel stays `Failed` until
//! the application asks to connect again. `Destroyed` is terminal.

use std::fmt;

/// Channel lifecycle - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected to the room.
    Disconnected,
    /// Subscription in progress.
    Connecting,
    /// Subscribed to the room channel.
    Connected,
    /// Subscription failed or the channel went away.
    Failed {
        /// Error message describing the failure.
        error: String,
    },
    /// Provider torn down. Terminal.
    Destroyed,
}

impl ConnectionState {
    /// Create a new state machine in the Disconnected state.
    pub fn new() -> Self {
        Self::Disconnected
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// Pure function. The provider executes the returned actions.
    pub fn on_event(self, event: Event) -> (Self, Vec<Action>) {
        match (self, event) {
            // Nothing leaves Destroyed
            (Self::Destroyed, _) => (Self::Destroyed, vec![]),

            (_, Event::DestroyRequested) => (
                Self::Destroyed,
                vec![
                    Action::CancelTimers,
                    Action::Unsubscribe,
                    Action::EmitStatus(Self::Destroyed),
                ],
            ),

            // Manual (re)connect
            (Self::Disconnected | Self::Failed { .. }, Event::ConnectRequested) => (
                Self::Connecting,
                vec![Action::EmitStatus(Self::Connecting), Action::Subscribe],
            ),

            (Self::Connecting, Event::Subscribed) => (
                Self::Connected,
                vec![
                    Action::TrackPresence,
                    Action::EmitStatus(Self::Connected),
                ],
            ),

            (Self::Connecting, Event::ConnectFailed { error })
            | (Self::Connecting | Self::Connected, Event::ChannelLost { reason: error }) => {
                let failed = Self::Failed { error };
                (failed.clone(), vec![Action::EmitStatus(failed)])
            }

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Check if subscribed to the room.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check if torn down.
    pub fn is_destroyed(&self) -> bool {
        matches!(self, Self::Destroyed)
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Failed { error } => write!(f, "failed: {}", error),
            Self::Destroyed => write!(f, "destroyed"),
        }
    }
}

/// Events that can occur in the channel lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Application asked to connect.
    ConnectRequested,
    /// The transport reported a successful subscription.
    Subscribed,
    /// The subscription attempt failed.
    ConnectFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// The transport reported an error, timeout or close.
    ChannelLost {
        /// Reason reported by the transport.
        reason: String,
    },
    /// Application asked to tear the provider down.
    DestroyRequested,
}

/// Actions to be executed by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Subscribe to the room channel.
    Subscribe,
    /// Publish the local presence record.
    TrackPresence,
    /// Cancel flush, offer and reconciliation timers and drop buffered work.
    CancelTimers,
    /// Release the channel.
    Unsubscribe,
    /// Notify connection-status observers.
    EmitStatus(ConnectionState),
}
