//! Provider configuration.
//!
//! A [`ProviderConfig`] can be built in code or loaded from a TOML file:
//!
//! ```toml
//! [room]
//! id = "city-42"
//! display_name = "Alice"
//! endpoint = "wss://realtime.example.com"
//!
//! [tuning]
//! flush_interval_ms = 100
//! max_batch = 100
//! ```
//!
//! Durations in files are milliseconds. Missing keys take the defaults.

use roomsync_core::{
    DEFAULT_DEDUP_WINDOW, DEFAULT_FLUSH_INTERVAL, DEFAULT_MAX_BATCH, DEFAULT_MAX_OFFER_JITTER,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default period of the full-state re-broadcast.
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(2);

/// Configuration for a room provider.
#[derive(Clone)]
pub struct ProviderConfig {
    /// Room (channel) identifier.
    pub room_id: String,
    /// Name shown to other peers.
    pub display_name: String,
    /// Color tag; derived from the peer id when `None`.
    pub color_tag: Option<String>,
    /// Realtime service endpoint, for transports that need one.
    pub endpoint: Option<String>,
    /// Realtime service credential. Opaque to roomsync.
    pub api_key: Option<String>,
    /// Engine snapshot to start from. Its presence makes this peer a state holder.
    pub initial_state: Option<Vec<u8>>,
    /// Placement batch flush period.
    pub flush_interval: Duration,
    /// Placement count that forces a flush.
    pub max_batch: usize,
    /// Window in which an identical action is dropped.
    pub dedup_window: Duration,
    /// Upper bound of the random delay before answering a state request.
    pub max_offer_jitter: Duration,
    /// Period of the full-state re-broadcast.
    pub reconcile_interval: Duration,
}

impl ProviderConfig {
    /// Create a configuration for `room_id` with default tuning.
    pub fn new(room_id: &str) -> Self {
        Self {
            room_id: room_id.to_string(),
            display_name: "Player".to_string(),
            color_tag: None,
            endpoint: None,
            api_key: None,
            initial_state: None,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            max_batch: DEFAULT_MAX_BATCH,
            dedup_window: DEFAULT_DEDUP_WINDOW,
            max_offer_jitter: DEFAULT_MAX_OFFER_JITTER,
            reconcile_interval: DEFAULT_RECONCILE_INTERVAL,
        }
    }

    /// Set the display name.
    pub fn with_display_name(mut self, name: &str) -> Self {
        self.display_name = name.to_string();
        self
    }

    /// Set the color tag.
    pub fn with_color_tag(mut self, color: &str) -> Self {
        self.color_tag = Some(color.to_string());
        self
    }

    /// Set the realtime service endpoint and credential.
    pub fn with_endpoint(mut self, endpoint: &str, api_key: Option<&str>) -> Self {
        self.endpoint = Some(endpoint.to_string());
        self.api_key = api_key.map(str::to_string);
        self
    }

    /// Start from an existing engine snapshot.
    pub fn with_initial_state(mut self, state: Vec<u8>) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Set the placement flush period.
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Set the placement count that forces a flush.
    pub fn with_max_batch(mut self, max_batch: usize) -> Self {
        self.max_batch = max_batch;
        self
    }

    /// Set the duplicate suppression window.
    pub fn with_dedup_window(mut self, window: Duration) -> Self {
        self.dedup_window = window;
        self
    }

    /// Set the responder jitter bound.
    pub fn with_max_offer_jitter(mut self, jitter: Duration) -> Self {
        self.max_offer_jitter = jitter;
        self
    }

    /// Set the full-state re-broadcast period.
    pub fn with_reconcile_interval(mut self, interval: Duration) -> Self {
        self.reconcile_interval = interval;
        self
    }

    /// Check the values a provider cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.room_id.trim().is_empty() {
            return Err(ConfigError::Invalid("room id must not be empty".into()));
        }
        if self.max_batch == 0 {
            return Err(ConfigError::Invalid("max_batch must be at least 1".into()));
        }
        if self.flush_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "flush_interval_ms must be at least 1".into(),
            ));
        }
        if self.reconcile_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "reconcile_interval_ms must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: None,
            source: e,
        })?;
        let config = file.into_config();
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::ParseError { source, .. } => ConfigError::ParseError {
                path: Some(path.to_path_buf()),
                source,
            },
            other => other,
        })
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("room_id", &self.room_id)
            .field("display_name", &self.display_name)
            .field("color_tag", &self.color_tag)
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field(
                "initial_state",
                &self
                    .initial_state
                    .as_ref()
                    .map(|s| format!("[{} bytes]", s.len())),
            )
            .field("flush_interval", &self.flush_interval)
            .field("max_batch", &self.max_batch)
            .field("dedup_window", &self.dedup_window)
            .field("max_offer_jitter", &self.max_offer_jitter)
            .field("reconcile_interval", &self.reconcile_interval)
            .finish()
    }
}

/// On-disk configuration layout.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    room: RoomSection,
    #[serde(default)]
    tuning: TuningSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RoomSection {
    id: String,
    #[serde(default = "default_display_name")]
    display_name: String,
    color_tag: Option<String>,
    endpoint: Option<String>,
    api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct TuningSection {
    #[serde(default = "default_flush_interval_ms")]
    flush_interval_ms: u64,
    #[serde(default = "default_max_batch")]
    max_batch: usize,
    #[serde(default = "default_dedup_window_ms")]
    dedup_window_ms: u64,
    #[serde(default = "default_max_offer_jitter_ms")]
    max_offer_jitter_ms: u64,
    #[serde(default = "default_reconcile_interval_ms")]
    reconcile_interval_ms: u64,
}

impl Default for TuningSection {
    fn default() -> Self {
        Self {
            flush_interval_ms: default_flush_interval_ms(),
            max_batch: default_max_batch(),
            dedup_window_ms: default_dedup_window_ms(),
            max_offer_jitter_ms: default_max_offer_jitter_ms(),
            reconcile_interval_ms: default_reconcile_interval_ms(),
        }
    }
}

impl ConfigFile {
    fn into_config(self) -> ProviderConfig {
        ProviderConfig {
            room_id: self.room.id,
            display_name: self.room.display_name,
            color_tag: self.room.color_tag,
            endpoint: self.room.endpoint,
            api_key: self.room.api_key,
            initial_state: None,
            flush_interval: Duration::from_millis(self.tuning.flush_interval_ms),
            max_batch: self.tuning.max_batch,
            dedup_window: Duration::from_millis(self.tuning.dedup_window_ms),
            max_offer_jitter: Duration::from_millis(self.tuning.max_offer_jitter_ms),
            reconcile_interval: Duration::from_millis(self.tuning.reconcile_interval_ms),
        }
    }
}

// Default value functions
fn default_display_name() -> String {
    "Player".to_string()
}

fn default_flush_interval_ms() -> u64 {
    DEFAULT_FLUSH_INTERVAL.as_millis() as u64
}

fn default_max_batch() -> usize {
    DEFAULT_MAX_BATCH
}

fn default_dedup_window_ms() -> u64 {
    DEFAULT_DEDUP_WINDOW.as_millis() as u64
}

fn default_max_offer_jitter_ms() -> u64 {
    DEFAULT_MAX_OFFER_JITTER.as_millis() as u64
}

fn default_reconcile_interval_ms() -> u64 {
    DEFAULT_RECONCILE_INTERVAL.as_millis() as u64
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration.
    #[error("failed to parse config {}: {source}", describe(.path))]
    ParseError {
        /// Path to the configuration file, if loaded from one.
        path: Option<PathBuf>,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

fn describe(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!("file {}", path.display()),
        None => "string".to_string(),
    }
}
