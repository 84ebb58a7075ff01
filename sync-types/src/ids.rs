//! Identity and presence types for roomsync.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Palette used for peer color tags when the caller supplies none.
const COLOR_PALETTE: [&str; 8] = [
    "#e6194b", "#3cb44b", "#4363d8", "#f58231", "#911eb4", "#42d4f4", "#f032e6", "#bfef45",
];

/// Opaque identifier of a peer in a room.
///
/// Generated locally on join (UUID v4 text). Never authenticated.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Create a new random PeerId.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Wrap an existing identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Pick a stable color tag for this peer from the palette.
    pub fn color_tag(&self) -> &'static str {
        let hash = self
            .0
            .bytes()
            .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
        COLOR_PALETTE[hash as usize % COLOR_PALETTE.len()]
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short: String = self.0.chars().take(8).collect();
        write!(f, "PeerId({})", short)
    }
}

/// Name of an engine tool (e.g. `"road"`, `"zone_residential"`).
///
/// Opaque to roomsync; only the engine interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tool(String);

impl Tool {
    /// Create a tool from its name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the tool name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Tool {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// A connected session participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Peer {
    /// Locally generated identity
    pub id: PeerId,
    /// Human-readable name shown to other players
    pub display_name: String,
    /// Color used to render this peer's cursor and readouts
    pub color_tag: String,
    /// Unix milliseconds when the peer joined
    pub joined_at: u64,
}

impl Peer {
    /// Create a peer with a fresh random id, joined now.
    pub fn new(display_name: &str) -> Self {
        Self::with_id(PeerId::random(), display_name)
    }

    /// Create a peer with a known id, joined now.
    pub fn with_id(id: PeerId, display_name: &str) -> Self {
        let color_tag = id.color_tag().to_string();
        Self {
            id,
            display_name: display_name.to_string(),
            color_tag,
            joined_at: now_millis(),
        }
    }

    /// Override the color tag.
    pub fn with_color(mut self, color_tag: &str) -> Self {
        self.color_tag = color_tag.to_string();
        self
    }
}

/// Presence record published through the transport's presence primitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceRecord {
    /// The peer this record describes
    pub player: Peer,
}

impl PresenceRecord {
    /// Wrap a peer in a presence record.
    pub fn new(player: Peer) -> Self {
        Self { player }
    }
}

/// Current wall-clock time in Unix milliseconds.
///
/// Only used for display and debug stamps, never for ordering.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
