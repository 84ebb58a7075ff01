//! Versioned engine snapshots.
//!
//! The engine's serialized state is opaque to roomsync. Before it goes on
//! the wire it is wrapped with a schema version, MessagePack-encoded,
//! LZ4-compressed, and base64-encoded into the `compressed` text field.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

use crate::SyncError;

/// Snapshot schema version produced by this build.
pub const SCHEMA_VERSION: u16 = 1;

/// Upper bound on a decompressed snapshot (64 MiB).
const MAX_SNAPSHOT_SIZE: usize = 64 * 1024 * 1024;

/// An engine snapshot tagged with the schema that produced it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateBlob {
    /// Schema version of the envelope
    pub schema_version: u16,
    /// Engine bytes from `serialize_state()`
    pub payload: Vec<u8>,
}

impl StateBlob {
    /// Wrap engine bytes with the current schema version.
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            payload,
        }
    }

    /// Encode into the text form carried by `state-sync` and `fullState`.
    pub fn encode(&self) -> Result<String, SyncError> {
        let packed = rmp_serde::to_vec(self).map_err(SyncError::SnapshotEncode)?;
        let compressed = lz4_flex::compress_prepend_size(&packed);
        Ok(STANDARD.encode(compressed))
    }

    /// Decode the text form, rejecting unknown schema versions.
    pub fn decode(text: &str) -> Result<Self, SyncError> {
        let compressed = STANDARD.decode(text)?;

        if compressed.len() >= 4 {
            let declared = u32::from_le_bytes([
                compressed[0],
                compressed[1],
                compressed[2],
                compressed[3],
            ]) as usize;
            if declared > MAX_SNAPSHOT_SIZE {
                return Err(SyncError::SnapshotTooLarge(declared));
            }
        }

        let packed = lz4_flex::decompress_size_prepended(&compressed)?;
        let blob: StateBlob = rmp_serde::from_slice(&packed).map_err(SyncError::SnapshotDecode)?;

        if blob.schema_version != SCHEMA_VERSION {
            return Err(SyncError::UnsupportedSchema(blob.schema_version));
        }
        Ok(blob)
    }

    /// Consume the blob, returning the engine bytes.
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}

impl std::fmt::Debug for StateBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateBlob")
            .field("schema_version", &self.schema_version)
            .field("payload", &format!("[{} bytes]", self.payload.len()))
            .finish()
    }
}
