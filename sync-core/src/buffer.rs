//! Placement batching for roomsync.
//!
//! This module provides the outgoing placement buffer with:
//! - FIFO ordering (entries leave in the order they were pushed)
//! - A size cap that forces a flush when reached
//! - A flush deadline measured from the first buffered entry
//!
//! The buffer is used by the provider to turn rapid placements (a drag
//! across the grid) into one `placeBatch` message. Time is passed in by
//! the caller so the logic stays deterministic.

use roomsync_types::{Action, Placement};
use std::time::{Duration, Instant};

/// Default flush period.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(100);

/// Default number of entries that forces a flush.
pub const DEFAULT_MAX_BATCH: usize = 100;

/// Buffer of pending placements.
///
/// Entries flow through the buffer in this order:
/// 1. `push()` / `extend()` - append, possibly forcing a flush at capacity
/// 2. `deadline()` - the caller arms a timer for this instant
/// 3. `take()` - drain into a single `place` or `placeBatch` action
#[derive(Debug)]
pub struct PlacementBatcher {
    /// Entry count that forces a flush.
    max_entries: usize,
    /// Buffered placements, oldest first.
    entries: Vec<Placement>,
    /// When the first currently buffered entry arrived.
    opened_at: Option<Instant>,
}

impl PlacementBatcher {
    /// Create a batcher that flushes at `max_entries` (minimum 1).
    pub fn new(max_entries: usize) -> Self {
        let max_entries = max_entries.max(1);
        Self {
            max_entries,
            entries: Vec::with_capacity(max_entries),
            opened_at: None,
        }
    }

    /// Append a placement.
    ///
    /// Returns the flushed action when this entry fills the buffer.
    pub fn push(&mut self, placement: Placement, now: Instant) -> Option<Action> {
        if self.entries.is_empty() {
            self.opened_at = Some(now);
        }
        self.entries.push(placement);

        if self.entries.len() >= self.max_entries {
            self.take()
        } else {
            None
        }
    }

    /// Append several placements in order.
    ///
    /// Returns every action flushed along the way (one per filled buffer).
    pub fn extend<I>(&mut self, placements: I, now: Instant) -> Vec<Action>
    where
        I: IntoIterator<Item = Placement>,
    {
        placements
            .into_iter()
            .filter_map(|p| self.push(p, now))
            .collect()
    }

    /// Drain the buffer.
    ///
    /// A single entry comes back as a plain `place`; more come back as one
    /// `placeBatch` in insertion order. Returns `None` when empty.
    pub fn take(&mut self) -> Option<Action> {
        self.opened_at = None;
        let mut entries = std::mem::take(&mut self.entries);
        match entries.len() {
            0 => None,
            1 => entries.pop().map(Action::Place),
            _ => Some(Action::PlaceBatch {
                placements: entries,
            }),
        }
    }

    /// Instant at which the buffer must be flushed, if anything is buffered.
    pub fn deadline(&self, interval: Duration) -> Option<Instant> {
        self.opened_at.map(|opened| opened + interval)
    }

    /// Whether the flush deadline has passed at `now`.
    pub fn is_due(&self, now: Instant, interval: Duration) -> bool {
        self.deadline(interval).is_some_and(|at| now >= at)
    }

    /// Number of buffered placements.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry count that forces a flush.
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Drop everything buffered without producing an action.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.opened_at = None;
    }
}

impl Default for PlacementBatcher {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BATCH)
    }
}
