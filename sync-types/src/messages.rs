//! Mutation intents and bootstrap payloads for roomsync.
//!
//! These are the payloads carried by the room channel's named events
//! (see [`crate::WireEvent`]). They encode as JSON objects with camelCase
//! field names.

use serde::{Deserialize, Serialize};

use crate::{PeerId, SyncError, Tool};

/// One tile placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    /// Grid column
    pub x: u32,
    /// Grid row
    pub y: u32,
    /// Tool used for the placement
    pub tool: Tool,
}

impl Placement {
    /// Create a placement.
    pub fn new(x: u32, y: u32, tool: impl Into<Tool>) -> Self {
        Self {
            x,
            y,
            tool: tool.into(),
        }
    }
}

/// All mutation intents that travel on the `action` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Action {
    /// Place a single tile
    Place(Placement),
    /// Ordered group of placements; order within the batch is significant
    PlaceBatch {
        /// Placements, applied first to last
        placements: Vec<Placement>,
    },
    /// Clear a tile
    Bulldoze {
        /// Grid column
        x: u32,
        /// Grid row
        y: u32,
    },
    /// Change the city tax rate (percent)
    SetTaxRate {
        /// New rate
        rate: u8,
    },
    /// Change funding of one budget line (percent)
    SetBudget {
        /// Budget line key (e.g. `"police"`)
        key: String,
        /// Funding level
        amount: u8,
    },
    /// Change simulation speed
    SetSpeed {
        /// Speed level (0 = paused)
        level: u8,
    },
    /// Toggle disasters
    SetDisasters {
        /// Whether disasters are enabled
        enabled: bool,
    },
    /// Full engine snapshot, used for reconciliation
    FullState {
        /// Encoded [`crate::StateBlob`]
        compressed: String,
    },
    /// Simulation heartbeat
    Tick {
        /// Tick counter of the sender
        tick: u64,
    },
}

impl Action {
    /// Short tag of this variant, as it appears in the `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Place(_) => "place",
            Action::PlaceBatch { .. } => "placeBatch",
            Action::Bulldoze { .. } => "bulldoze",
            Action::SetTaxRate { .. } => "setTaxRate",
            Action::SetBudget { .. } => "setBudget",
            Action::SetSpeed { .. } => "setSpeed",
            Action::SetDisasters { .. } => "setDisasters",
            Action::FullState { .. } => "fullState",
            Action::Tick { .. } => "tick",
        }
    }

    /// Whether the action can be buffered and merged into a batch.
    pub fn is_batchable(&self) -> bool {
        matches!(self, Action::Place(_) | Action::PlaceBatch { .. })
    }

    /// Serialized form used to recognise an identical repeat.
    pub fn dedup_key(&self) -> Result<String, SyncError> {
        serde_json::to_string(self).map_err(SyncError::Encode)
    }
}

/// An action as sent on the wire, stamped by the sender.
///
/// `timestamp` is the sender's wall clock and is never used for ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionMessage {
    /// The mutation intent
    #[serde(flatten)]
    pub action: Action,
    /// Sender wall clock, Unix milliseconds
    pub timestamp: u64,
    /// Peer that originated the action
    pub origin_peer_id: PeerId,
}

impl ActionMessage {
    /// Stamp an action with its origin and the current time.
    pub fn stamp(action: Action, origin_peer_id: PeerId) -> Self {
        Self {
            action,
            timestamp: crate::now_millis(),
            origin_peer_id,
        }
    }
}

/// Broadcast by a peer that has no state yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRequest {
    /// The requesting peer
    pub from: PeerId,
}

/// Directed state offer. All peers receive it; only `to` acts on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSync {
    /// Encoded [`crate::StateBlob`]
    pub compressed: String,
    /// Intended recipient
    pub to: PeerId,
    /// Responding peer
    pub from: PeerId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn place_encodes_flat_with_stamp() {
        let msg = ActionMessage {
            action: Action::Place(Placement::new(3, 4, "road")),
            timestamp: 1_700_000_000_000,
            origin_peer_id: PeerId::new("peer-a"),
        };

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "place",
                "x": 3,
                "y": 4,
                "tool": "road",
                "timestamp": 1_700_000_000_000u64,
                "originPeerId": "peer-a",
            })
        );
    }

    #[test]
    fn batch_keeps_entry_order() {
        let json = r#"{
            "type": "placeBatch",
            "placements": [
                {"x": 1, "y": 1, "tool": "road"},
                {"x": 2, "y": 1, "tool": "power_line"},
                {"x": 3, "y": 1, "tool": "road"}
            ],
            "timestamp": 5,
            "originPeerId": "peer-b"
        }"#;

        let msg: ActionMessage = serde_json::from_str(json).unwrap();
        match msg.action {
            Action::PlaceBatch { placements } => {
                let xs: Vec<u32> = placements.iter().map(|p| p.x).collect();
                assert_eq!(xs, vec![1, 2, 3]);
                assert_eq!(placements[1].tool, Tool::new("power_line"));
            }
            other => panic!("Expected PlaceBatch, got {:?}", other),
        }
        assert_eq!(msg.origin_peer_id, PeerId::new("peer-b"));
    }

    #[test]
    fn policy_actions_use_camel_case_tags() {
        let cases = [
            (Action::SetTaxRate { rate: 9 }, "setTaxRate"),
            (
                Action::SetBudget {
                    key: "police".into(),
                    amount: 80,
                },
                "setBudget",
            ),
            (Action::SetSpeed { level: 2 }, "setSpeed"),
            (Action::SetDisasters { enabled: false }, "setDisasters"),
            (Action::Tick { tick: 7 }, "tick"),
        ];

        for (action, tag) in cases {
            let value = serde_json::to_value(&action).unwrap();
            assert_eq!(value["type"], tag);
            assert_eq!(action.kind(), tag);
        }
    }

    #[test]
    fn only_placements_are_batchable() {
        assert!(Action::Place(Placement::new(0, 0, "road")).is_batchable());
        assert!(Action::PlaceBatch { placements: vec![] }.is_batchable());
        assert!(!Action::Bulldoze { x: 0, y: 0 }.is_batchable());
        assert!(!Action::SetSpeed { level: 1 }.is_batchable());
    }

    #[test]
    fn dedup_key_distinguishes_coordinates() {
        let a = Action::Place(Placement::new(1, 2, "road")).dedup_key().unwrap();
        let b = Action::Place(Placement::new(2, 1, "road")).dedup_key().unwrap();
        let a2 = Action::Place(Placement::new(1, 2, "road")).dedup_key().unwrap();

        assert_ne!(a, b);
        assert_eq!(a, a2);
    }

    #[test]
    fn state_sync_shape() {
        let sync = StateSync {
            compressed: "AAAA".into(),
            to: PeerId::new("joiner"),
            from: PeerId::new("holder"),
        };
        let value = serde_json::to_value(&sync).unwrap();
        assert_eq!(
            value,
            json!({"compressed": "AAAA", "to": "joiner", "from": "holder"})
        );
    }
}
