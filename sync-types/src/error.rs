//! Error types for roomsync.

use thiserror::Error;

/// Errors that can occur while encoding or decoding roomsync wire data.
#[derive(Debug, Error)]
pub enum SyncError {
    /// JSON payload encoding failed
    #[error("payload encoding failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// JSON payload decoding failed
    #[error("payload decoding failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// MessagePack snapshot serialization failed
    #[error("snapshot serialization failed: {0}")]
    SnapshotEncode(#[source] rmp_serde::encode::Error),

    /// MessagePack snapshot deserialization failed
    #[error("snapshot deserialization failed: {0}")]
    SnapshotDecode(#[source] rmp_serde::decode::Error),

    /// Compressed snapshot text is not valid base64
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    /// LZ4 decompression failed
    #[error("decompression failed: {0}")]
    Decompress(#[from] lz4_flex::block::DecompressError),

    /// Declared decompressed size exceeds the snapshot limit
    #[error("snapshot too large: {0} bytes")]
    SnapshotTooLarge(usize),

    /// Snapshot was produced by an incompatible schema
    #[error("unsupported snapshot schema version: {0}")]
    UnsupportedSchema(u16),

    /// Event name not known on the room channel
    #[error("unknown event: {0}")]
    UnknownEvent(String),
}
