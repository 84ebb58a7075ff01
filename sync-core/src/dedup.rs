//! Suppression of rapid identical re-emissions.
//!
//! Input handlers can fire the same intent several times in a burst. The
//! filter remembers the key of the last accepted action and rejects an
//! identical key inside a short window. Repeats after the window pass.

use std::time::{Duration, Instant};

/// Default suppression window.
pub const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_millis(100);

/// Last-action duplicate filter.
#[derive(Debug, Clone)]
pub struct DuplicateFilter {
    window: Duration,
    last: Option<(String, Instant)>,
}

impl DuplicateFilter {
    /// Create a filter with the given window.
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// Check `key` at `now`.
    ///
    /// Returns `true` if the action should be sent (and records it), or
    /// `false` if it repeats the last accepted key within the window.
    pub fn admit(&mut self, key: String, now: Instant) -> bool {
        if let Some((last_key, at)) = &self.last {
            if *last_key == key && now.saturating_duration_since(*at) < self.window {
                return false;
            }
        }
        self.last = Some((key, now));
        true
    }

    /// Forget the last accepted key.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

impl Default for DuplicateFilter {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_WINDOW)
    }
}
