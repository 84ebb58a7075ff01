//! Room channel events - the named wrappers around every payload.
//!
//! The transport carries `(event name, payload bytes)` pairs. This module
//! maps those pairs to and from typed [`WireEvent`]s.

use crate::{ActionMessage, StateRequest, StateSync, SyncError};

/// Event name for mutation intents, broadcast to all but the sender.
pub const EVENT_ACTION: &str = "action";
/// Event name for a state request from a peer without state.
pub const EVENT_STATE_REQUEST: &str = "state-request";
/// Event name for a directed state offer.
pub const EVENT_STATE_SYNC: &str = "state-sync";

/// A decoded room channel event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireEvent {
    /// A stamped mutation intent
    Action(ActionMessage),
    /// A peer asks for state
    StateRequest(StateRequest),
    /// A peer offers state to one requester
    StateSync(StateSync),
}

impl WireEvent {
    /// Event name this payload travels under.
    pub fn event_name(&self) -> &'static str {
        match self {
            WireEvent::Action(_) => EVENT_ACTION,
            WireEvent::StateRequest(_) => EVENT_STATE_REQUEST,
            WireEvent::StateSync(_) => EVENT_STATE_SYNC,
        }
    }

    /// Encode the payload as JSON bytes.
    pub fn to_payload(&self) -> Result<Vec<u8>, SyncError> {
        let encoded = match self {
            WireEvent::Action(msg) => serde_json::to_vec(msg),
            WireEvent::StateRequest(req) => serde_json::to_vec(req),
            WireEvent::StateSync(sync) => serde_json::to_vec(sync),
        };
        encoded.map_err(SyncError::Encode)
    }

    /// Decode a payload received under `event`.
    pub fn from_payload(event: &str, payload: &[u8]) -> Result<Self, SyncError> {
        match event {
            EVENT_ACTION => serde_json::from_slice(payload)
                .map(WireEvent::Action)
                .map_err(SyncError::Decode),
            EVENT_STATE_REQUEST => serde_json::from_slice(payload)
                .map(WireEvent::StateRequest)
                .map_err(SyncError::Decode),
            EVENT_STATE_SYNC => serde_json::from_slice(payload)
                .map(WireEvent::StateSync)
                .map_err(SyncError::Decode),
            other => Err(SyncError::UnknownEvent(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Action, PeerId};

    #[test]
    fn event_names_match_variants() {
        let req = WireEvent::StateRequest(StateRequest {
            from: PeerId::new("a"),
        });
        assert_eq!(req.event_name(), "state-request");

        let sync = WireEvent::StateSync(StateSync {
            compressed: String::new(),
            to: PeerId::new("a"),
            from: PeerId::new("b"),
        });
        assert_eq!(sync.event_name(), "state-sync");
    }

    #[test]
    fn action_payload_decodes_under_its_name() {
        let event = WireEvent::Action(ActionMessage::stamp(
            Action::Bulldoze { x: 5, y: 6 },
            PeerId::new("origin"),
        ));

        let payload = event.to_payload().unwrap();
        let decoded = WireEvent::from_payload(event.event_name(), &payload).unwrap();

        assert_eq!(decoded, event);
    }

    #[test]
    fn unknown_event_is_rejected() {
        let result = WireEvent::from_payload("cursor-move", b"{}");
        assert!(matches!(result, Err(SyncError::UnknownEvent(name)) if name == "cursor-move"));
    }

    #[test]
    fn malformed_payload_is_decode_error() {
        let result = WireEvent::from_payload(EVENT_STATE_REQUEST, b"not json");
        assert!(matches!(result, Err(SyncError::Decode(_))));
    }

    #[test]
    fn payload_under_wrong_event_fails() {
        let req = WireEvent::StateRequest(StateRequest {
            from: PeerId::new("a"),
        });
        let payload = req.to_payload().unwrap();

        assert!(WireEvent::from_payload(EVENT_STATE_SYNC, &payload).is_err());
    }
}
