//! Mock channel for testing.
//!
//! Captures sent events and tracked presence, and lets tests inject
//! inbound events as if they came from the room.

use super::{Channel, ChannelEvent, ChannelEvents, SubscriptionStatus, TransportError};
use async_trait::async_trait;
use roomsync_core::PresenceChange;
use roomsync_types::{PresenceRecord, WireEvent};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

/// Mock channel for testing.
///
/// Clones share state, so a test can keep one clone while the provider
/// owns the other.
#[derive(Debug, Clone, Default)]
pub struct MockChannel {
    inner: Arc<Mutex<MockChannelInner>>,
}

#[derive(Debug, Default)]
struct MockChannelInner {
    tx: Option<mpsc::UnboundedSender<ChannelEvent>>,
    sent: Vec<(String, Vec<u8>)>,
    tracked: Vec<PresenceRecord>,
    connects: usize,
    unsubscribes: usize,
    fail_next_connect: Option<String>,
    hold_subscription: bool,
}

impl MockChannel {
    /// Create a new mock channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an inbound event to the subscriber.
    ///
    /// Returns `false` if nobody is subscribed.
    pub fn inject(&self, event: ChannelEvent) -> bool {
        let inner = self.lock();
        match &inner.tx {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Deliver a wire event as a broadcast from another member.
    pub fn inject_wire(&self, event: &WireEvent) -> bool {
        match event.to_payload() {
            Ok(payload) => self.inject(ChannelEvent::Broadcast {
                event: event.event_name().to_string(),
                payload,
            }),
            Err(_) => false,
        }
    }

    /// Deliver a presence change.
    pub fn inject_presence(&self, change: PresenceChange) -> bool {
        self.inject(ChannelEvent::Presence(change))
    }

    /// Get all raw `(event, payload)` pairs that were sent.
    pub fn sent(&self) -> Vec<(String, Vec<u8>)> {
        self.lock().sent.clone()
    }

    /// Get all sent events that decode as wire events, in send order.
    pub fn sent_wire(&self) -> Vec<WireEvent> {
        self.lock()
            .sent
            .iter()
            .filter_map(|(event, payload)| WireEvent::from_payload(event, payload).ok())
            .collect()
    }

    /// Forget everything sent so far.
    pub fn clear_sent(&self) {
        self.lock().sent.clear();
    }

    /// Get every presence record that was tracked.
    pub fn tracked(&self) -> Vec<PresenceRecord> {
        self.lock().tracked.clone()
    }

    /// Number of connect() calls that succeeded.
    pub fn connect_count(&self) -> usize {
        self.lock().connects
    }

    /// Number of unsubscribe() calls that released a subscription.
    pub fn unsubscribe_count(&self) -> usize {
        self.lock().unsubscribes
    }

    /// Cause the next connect() to fail with the given error.
    pub fn fail_next_connect(&self, error: &str) {
        self.lock().fail_next_connect = Some(error.to_string());
    }

    /// Do not report `Subscribed` on connect; the test injects it.
    pub fn hold_subscription(&self) {
        self.lock().hold_subscription = true;
    }

    fn lock(&self) -> MutexGuard<'_, MockChannelInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Channel for MockChannel {
    async fn connect(&self) -> Result<ChannelEvents, TransportError> {
        let mut inner = self.lock();

        // Check for forced failure
        if let Some(error) = inner.fail_next_connect.take() {
            return Err(TransportError::ConnectionFailed(error));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        if !inner.hold_subscription {
            let _ = tx.send(ChannelEvent::Status(SubscriptionStatus::Subscribed));
        }
        inner.tx = Some(tx);
        inner.connects += 1;
        Ok(rx)
    }

    async fn send(&self, event: &str, payload: Vec<u8>) {
        let mut inner = self.lock();
        if inner.tx.is_some() {
            inner.sent.push((event.to_string(), payload));
        }
    }

    async fn track(&self, presence: PresenceRecord) {
        let mut inner = self.lock();
        if inner.tx.is_some() {
            inner.tracked.push(presence);
        }
    }

    async fn unsubscribe(&self) {
        let mut inner = self.lock();
        if inner.tx.take().is_some() {
            inner.unsubscribes += 1;
        }
    }

    fn is_subscribed(&self) -> bool {
        self.lock().tx.is_some()
    }
}
